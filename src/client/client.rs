use std::io::{self, Write};
use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::{json, Map, Value};
use tracing::{debug, debug_span, info, Level};

use crate::{
    config::ClientConfig,
    error::{ClientError, Result},
    params::Parameters,
    prompt::Prompt,
    types::{GenerateResponse, ModelInfo},
    PROMPT_LOG_TARGET,
};

use super::{builder::ClientBuilder, Instruct, InstructOptions};

pub const CHAT_PATH: &str = "/api/v1/chat";
pub const GENERATE_PATH: &str = "/api/v1/generate";
pub const MODEL_PATH: &str = "/api/v1/model";

const LOG_TARGET: &str = "textgen_client::client";

/// Blocking client for the text-generation web UI API
#[derive(Debug, Clone)]
pub struct ApiClient {
    config: ClientConfig,
    url: String,
    chat_url: String,
    generate_url: String,
    model_url: String,
    http: Client,
}

impl ApiClient {
    /// Client for `http://localhost:5000`
    pub fn new() -> Result<Self> {
        Self::from_config(ClientConfig::default())
    }

    /// Create a new client builder
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Client configured from `TEXTGEN_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(ClientConfig::from_env()?)
    }

    pub fn from_config(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let url = config.base_url();
        let http = Client::builder().build()?;

        Ok(Self {
            chat_url: format!("{}{}", url, CHAT_PATH),
            generate_url: format!("{}{}", url, GENERATE_PATH),
            model_url: format!("{}{}", url, MODEL_PATH),
            url,
            config,
            http,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Chat endpoint. Not used by any operation yet
    pub fn chat_url(&self) -> &str {
        &self.chat_url
    }

    pub fn generate_url(&self) -> &str {
        &self.generate_url
    }

    pub fn model_url(&self) -> &str {
        &self.model_url
    }

    pub fn api_key(&self) -> Option<&str> {
        self.config.api_key.as_deref()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Provide an instruction, get a response
    pub fn instruct(&self, prompt: &Prompt, parameters: &Parameters) -> Result<String> {
        let options = InstructOptions {
            timeout: None,
            print_prompt: self.config.print_prompt,
        };
        self.instruct_with(prompt, parameters, &options)
    }

    pub(crate) fn instruct_to<W: Write>(
        &self,
        prompt: &Prompt,
        parameters: &Parameters,
        options: &InstructOptions,
        out: &mut W,
    ) -> Result<String> {
        let rendered = prompt.full_prompt()?;
        if options.print_prompt {
            writeln!(out, "{}", rendered)?;
        }
        info!(target: PROMPT_LOG_TARGET, "{}", rendered);

        let mut payload = prompt.transport_fields(rendered);
        payload.extend(parameters.to_map());

        let timeout = options.timeout.unwrap_or(self.config.timeout);
        let data = self.post(&self.generate_url, &Value::Object(payload), timeout)?;

        let response: GenerateResponse = serde_json::from_value(data).map_err(|e| {
            ClientError::invalid_response(format!("expected results[0].text: {}", e))
        })?;
        response.into_text()
    }

    /// Query which model the backend has loaded
    pub fn model_info(&self) -> Result<ModelInfo> {
        let result = self.model_action(json!({ "action": "info" }))?;
        ModelInfo::from_result(result)
    }

    /// Ask the backend to load `model_name` with loader `args`
    pub fn load_model(&self, model_name: &str, args: Map<String, Value>) -> Result<ModelInfo> {
        self.load_model_with_settings(model_name, args, None)
    }

    /// Like [`load_model`](Self::load_model), also overriding backend settings
    pub fn load_model_with_settings(
        &self,
        model_name: &str,
        args: Map<String, Value>,
        settings: Option<Map<String, Value>>,
    ) -> Result<ModelInfo> {
        info!(target: LOG_TARGET, model_name, "loading model");

        let mut body = json!({
            "action": "load",
            "model_name": model_name,
            "args": args,
        });
        if let Some(settings) = settings {
            body["settings"] = Value::Object(settings);
        }

        let result = self.model_action(body)?;
        ModelInfo::from_result(result)
    }

    /// Names of the models the backend can load
    pub fn list_models(&self) -> Result<Vec<String>> {
        let result = self.model_action(json!({ "action": "list" }))?;
        serde_json::from_value(result).map_err(|e| {
            ClientError::invalid_response(format!("expected a list of model names: {}", e))
        })
    }

    fn model_action(&self, body: Value) -> Result<Value> {
        let mut data = self.post(&self.model_url, &body, self.config.timeout)?;
        data.get_mut("result")
            .map(Value::take)
            .ok_or_else(|| ClientError::invalid_response("model reply has no result"))
    }

    /// POST `body` as JSON and decode the JSON reply.
    pub(crate) fn post(&self, url: &str, body: &Value, timeout: Duration) -> Result<Value> {
        let _span = debug_span!(target: LOG_TARGET, "post", url).entered();
        debug!(target: LOG_TARGET, ?timeout, "sending request");

        let response = self.http.post(url).timeout(timeout).json(body).send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Http {
                status,
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
                url: response.url().to_string(),
            });
        }

        let data: Value = response.json()?;
        if tracing::enabled!(target: LOG_TARGET, Level::DEBUG) {
            debug!(target: LOG_TARGET, "{}", serde_json::to_string_pretty(&data)?);
        }

        if let Some(error) = data.get("error").filter(|e| !e.is_null()) {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(ClientError::Backend { message });
        }

        Ok(data)
    }
}

impl Instruct for ApiClient {
    fn instruct_with(
        &self,
        prompt: &Prompt,
        parameters: &Parameters,
        options: &InstructOptions,
    ) -> Result<String> {
        let mut stdout = io::stdout();
        self.instruct_to(prompt, parameters, options, &mut stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{build_subscriber, LogConfig};
    use httpmock::{Method::POST, MockServer};
    use pretty_assertions::assert_eq;

    fn client_for(server: &MockServer) -> ApiClient {
        ApiClient::builder()
            .with_url(server.base_url())
            .build()
            .unwrap()
    }

    #[test]
    fn test_default_init() {
        let client = ApiClient::new().unwrap();

        assert_eq!(client.url(), "http://localhost:5000");
        assert_eq!(client.chat_url(), "http://localhost:5000/api/v1/chat");
        assert_eq!(client.generate_url(), "http://localhost:5000/api/v1/generate");
        assert_eq!(client.model_url(), "http://localhost:5000/api/v1/model");
        assert!(client.api_key().is_none());
    }

    #[test]
    fn test_host_and_port() {
        let client = ApiClient::builder()
            .with_host("http://192.168.1.20")
            .with_port(5005)
            .build()
            .unwrap();
        assert_eq!(client.generate_url(), "http://192.168.1.20:5005/api/v1/generate");
    }

    #[test]
    fn test_api_key_is_rejected() {
        let result = ApiClient::builder().with_api_key("sk-123").build();
        assert!(matches!(
            result,
            Err(ClientError::UnsupportedConfiguration { .. })
        ));
    }

    #[test]
    fn test_returns_text_body() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/v1/generate")
                .json_body_partial(r#"{"prompt": "hello", "max_new_tokens": 128}"#);
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({"results": [{"text": "output text"}]}));
        });

        let text = client_for(&server)
            .instruct(&Prompt::new("hello"), &Parameters::default())
            .unwrap();

        mock.assert();
        assert_eq!(text, "output text");
    }

    #[test]
    fn test_payload_merges_prompt_and_parameters() {
        let prompt = Prompt::instruct("hello")
            .with_template("<DO> {prompt} </DO>")
            .with_negative_prompt("rude");
        let parameters = Parameters::builder()
            .temperature(0.2)
            .stopping_string("###")
            .seed(9)
            .build()
            .unwrap();

        let mut expected = parameters.to_map();
        expected.insert("prompt".to_string(), json!("<DO> hello </DO>"));
        expected.insert("negative_prompt".to_string(), json!("rude"));

        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/v1/generate")
                .json_body(Value::Object(expected));
            then.status(200)
                .json_body(json!({"results": [{"text": "ok"}]}));
        });

        let text = client_for(&server).instruct(&prompt, &parameters).unwrap();
        mock.assert();
        assert_eq!(text, "ok");
    }

    #[test]
    fn test_print_prompt() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/v1/generate");
            then.status(200)
                .json_body(json!({"results": [{"text": "output text"}]}));
        });
        let client = client_for(&server);
        let prompt = Prompt::instruct("hello").with_template("## {prompt}");

        let mut out = Vec::new();
        let options = InstructOptions { print_prompt: true, ..Default::default() };
        client.instruct_to(&prompt, &Parameters::default(), &options, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "## hello\n");

        let mut out = Vec::new();
        client
            .instruct_to(&prompt, &Parameters::default(), &InstructOptions::default(), &mut out)
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_raises_for_bad_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/v1/generate");
            then.status(400).body("bad request");
        });

        let err = client_for(&server)
            .instruct(&Prompt::new("hello"), &Parameters::default())
            .unwrap_err();

        match err {
            ClientError::Http { status, reason, url } => {
                assert_eq!(status.as_u16(), 400);
                assert_eq!(reason, "Bad Request");
                assert_eq!(url, server.url("/api/v1/generate"));
            }
            other => panic!("expected HTTP error, got {other}"),
        }
    }

    #[test]
    fn test_missing_results_is_invalid_response() {
        for body in [
            json!({"results": []}),
            json!({}),
            json!({"foo": 1}),
            json!({"results": "text"}),
            json!({"results": [{"txt": "x"}]}),
        ] {
            let server = MockServer::start();
            server.mock(|when, then| {
                when.method(POST).path("/api/v1/generate");
                then.status(200).json_body(body.clone());
            });

            let err = client_for(&server)
                .instruct(&Prompt::new("hello"), &Parameters::default())
                .unwrap_err();
            assert!(
                matches!(err, ClientError::InvalidResponse { .. }),
                "{body}: got {err:?}"
            );
        }
    }

    #[test]
    fn test_null_error_field_is_not_a_failure() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/v1/generate");
            then.status(200)
                .json_body(json!({"error": null, "results": [{"text": "fine"}]}));
        });

        let text = client_for(&server)
            .instruct(&Prompt::new("hello"), &Parameters::default())
            .unwrap();
        assert_eq!(text, "fine");
    }

    #[test]
    fn test_logs_prompt_and_response_body() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("client.log");
        let subscriber = build_subscriber(&LogConfig {
            level: Level::DEBUG,
            file_path: Some(log_path.clone()),
            ..Default::default()
        })
        .unwrap();

        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/v1/generate");
            then.status(200)
                .json_body(json!({"results": [{"text": "output text"}]}));
        });
        let client = client_for(&server);
        let prompt = Prompt::instruct("hello").with_template("## {prompt}");

        let mut out = Vec::new();
        tracing::subscriber::with_default(subscriber, || {
            client
                .instruct_to(&prompt, &Parameters::default(), &InstructOptions::default(), &mut out)
                .unwrap();
        });
        assert!(out.is_empty());

        let contents = std::fs::read_to_string(&log_path).unwrap();
        let prompt_line = contents
            .lines()
            .find(|line| line.contains(PROMPT_LOG_TARGET))
            .unwrap_or_else(|| panic!("no prompt event in:\n{contents}"));
        assert!(prompt_line.contains("INFO"));
        assert!(prompt_line.contains("## hello"));

        assert!(contents.contains(LOG_TARGET));
        assert!(contents.contains(r#""text": "output text""#));
    }

    #[test]
    fn test_chat_prompt_is_not_sent() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/api/v1/generate");
            then.status(200).json_body(json!({"results": [{"text": "x"}]}));
        });

        let prompt = Prompt::chat("hi", vec![crate::ChatMessage::new("user", "hi")]).unwrap();
        let err = client_for(&server)
            .instruct(&prompt, &Parameters::default())
            .unwrap_err();

        assert!(matches!(err, ClientError::Unsupported { .. }));
        assert_eq!(mock.hits(), 0);
    }

    #[test]
    fn test_connection_failure_is_transport_error() {
        let client = ApiClient::builder()
            .with_url("http://127.0.0.1:1")
            .build()
            .unwrap();
        let err = client
            .instruct(&Prompt::new("hello"), &Parameters::default())
            .unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
    }

    #[test]
    fn test_model_info_not_loaded() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/v1/model")
                .json_body(json!({"action": "info"}));
            then.status(200).json_body(json!({
                "result": {
                    "model_name": "None",
                    "lora_names": [],
                    "shared.settings": {"max_new_tokens": 200},
                    "shared.args": {"api": true}
                }
            }));
        });

        let info = client_for(&server).model_info().unwrap();
        mock.assert();

        assert!(!info.is_loaded());
        assert_eq!(info.model_name(), None);
        assert_eq!(info.shared().settings["max_new_tokens"], json!(200));
        assert_eq!(info.shared().args["api"], json!(true));
    }

    #[test]
    fn test_model_info_loaded() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/v1/model");
            then.status(200).json_body(json!({
                "result": {
                    "model_name": "TheBloke_Llama-2-7B-GPTQ",
                    "lora_names": ["tloen_alpaca-lora-7b"],
                    "shared.settings": {},
                    "shared.args": {"loader": "ExLlama"}
                }
            }));
        });

        let info = client_for(&server).model_info().unwrap();
        assert_eq!(info.model_name(), Some("TheBloke_Llama-2-7B-GPTQ"));
        assert_eq!(info.lora_names(), ["tloen_alpaca-lora-7b".to_string()]);
    }

    #[test]
    fn test_load_model() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/api/v1/model").json_body(json!({
                "action": "load",
                "model_name": "mistral-7b-instruct",
                "args": {"loader": "llama.cpp", "n_gpu_layers": 35}
            }));
            then.status(200).json_body(json!({
                "result": {
                    "model_name": "mistral-7b-instruct",
                    "lora_names": [],
                    "shared.settings": {},
                    "shared.args": {"loader": "llama.cpp", "n_gpu_layers": 35}
                }
            }));
        });

        let args = json!({"loader": "llama.cpp", "n_gpu_layers": 35})
            .as_object()
            .cloned()
            .unwrap();
        let info = client_for(&server).load_model("mistral-7b-instruct", args).unwrap();

        mock.assert();
        assert_eq!(info.model_name(), Some("mistral-7b-instruct"));
        assert_eq!(info.shared().args["n_gpu_layers"], json!(35));
    }

    #[test]
    fn test_load_model_backend_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/v1/model");
            then.status(200)
                .json_body(json!({"error": {"message": "FileNotFoundError('missing')"}}));
        });

        let err = client_for(&server)
            .load_model_with_settings("missing", Map::new(), Some(Map::new()))
            .unwrap_err();
        match err {
            ClientError::Backend { message } => assert_eq!(message, "FileNotFoundError('missing')"),
            other => panic!("expected backend error, got {other}"),
        }
    }

    #[test]
    fn test_list_models() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/v1/model")
                .json_body(json!({"action": "list"}));
            then.status(200)
                .json_body(json!({"result": ["None", "llama-2-7b", "mistral-7b"]}));
        });

        let models = client_for(&server).list_models().unwrap();
        mock.assert();
        assert_eq!(models, vec!["None", "llama-2-7b", "mistral-7b"]);
    }
}
