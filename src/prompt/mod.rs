//! Prompt variants and their rendering.
//!
//! A [`Prompt`] pairs the user's text with an optional negative prompt and a
//! [`PromptFormat`] that decides how [`Prompt::full_prompt`] renders the text
//! actually sent to the backend. The negative prompt never appears in the
//! rendered text. It travels as its own payload field.

mod template;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ClientError, Result};

/// Identity template used by instruction prompts.
pub const DEFAULT_INSTRUCT_TEMPLATE: &str = "{prompt}";

/// Instruction format used by Llama, Llama 2, Code Llama and derivatives.
pub const LLAMA_INSTRUCT_TEMPLATE: &str =
    "[INST] <<SYS>> {system_prompt} <</SYS>> {user_prompt} [/INST]";

/// One turn of a chat transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Non-empty list of chat messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ChatMessage>", into = "Vec<ChatMessage>")]
pub struct ChatMessages(Vec<ChatMessage>);

impl ChatMessages {
    pub fn new(messages: Vec<ChatMessage>) -> Result<Self> {
        if messages.is_empty() {
            return Err(ClientError::validation(
                "messages",
                "must contain at least one message",
            ));
        }
        Ok(Self(messages))
    }

    pub fn as_slice(&self) -> &[ChatMessage] {
        &self.0
    }
}

impl TryFrom<Vec<ChatMessage>> for ChatMessages {
    type Error = ClientError;

    fn try_from(messages: Vec<ChatMessage>) -> Result<Self> {
        Self::new(messages)
    }
}

impl From<ChatMessages> for Vec<ChatMessage> {
    fn from(messages: ChatMessages) -> Self {
        messages.0
    }
}

/// How a prompt's text is rendered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum PromptFormat {
    /// Text is sent verbatim.
    Raw,
    /// Text is substituted into `{prompt}`.
    Instruct { template: String },
    /// Text and system prompt are substituted into `{user_prompt}` and
    /// `{system_prompt}`.
    LlamaInstruct {
        system_prompt: String,
        template: String,
    },
    /// Placeholder for chat transcripts. Rendering is not supported.
    Chat { messages: ChatMessages },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: Option<String>,
    #[serde(flatten)]
    pub format: PromptFormat,
}

impl Prompt {
    /// Prompt rendered verbatim.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            negative_prompt: None,
            format: PromptFormat::Raw,
        }
    }

    /// Instruction prompt using the identity template.
    pub fn instruct(prompt: impl Into<String>) -> Self {
        Self {
            format: PromptFormat::Instruct {
                template: DEFAULT_INSTRUCT_TEMPLATE.to_string(),
            },
            ..Self::new(prompt)
        }
    }

    /// Llama-style instruction prompt with an empty system prompt.
    pub fn llama_instruct(prompt: impl Into<String>) -> Self {
        Self {
            format: PromptFormat::LlamaInstruct {
                system_prompt: String::new(),
                template: LLAMA_INSTRUCT_TEMPLATE.to_string(),
            },
            ..Self::new(prompt)
        }
    }

    /// Chat prompt. Fails if `messages` is empty.
    pub fn chat(prompt: impl Into<String>, messages: Vec<ChatMessage>) -> Result<Self> {
        Ok(Self {
            format: PromptFormat::Chat {
                messages: ChatMessages::new(messages)?,
            },
            ..Self::new(prompt)
        })
    }

    pub fn with_negative_prompt(mut self, negative_prompt: impl Into<String>) -> Self {
        self.negative_prompt = Some(negative_prompt.into());
        self
    }

    /// Replace the template. A raw prompt becomes an instruction prompt.
    /// Chat prompts have no template and are left unchanged.
    pub fn with_template(mut self, new_template: impl Into<String>) -> Self {
        if let PromptFormat::Instruct { template } | PromptFormat::LlamaInstruct { template, .. } =
            &mut self.format
        {
            *template = new_template.into();
        } else if self.format == PromptFormat::Raw {
            self.format = PromptFormat::Instruct {
                template: new_template.into(),
            };
        }
        self
    }

    /// Set the system prompt of a Llama instruction prompt. Other formats
    /// carry no system prompt and are left unchanged.
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.set_system_prompt(system_prompt);
        self
    }

    /// Replace the system prompt in place. Returns false for formats
    /// without one.
    pub fn set_system_prompt(&mut self, new_system_prompt: impl Into<String>) -> bool {
        match &mut self.format {
            PromptFormat::LlamaInstruct { system_prompt, .. } => {
                *system_prompt = new_system_prompt.into();
                true
            }
            _ => false,
        }
    }

    /// Replace the user text in place.
    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.prompt = prompt.into();
    }

    /// Copy of this prompt carrying different user text.
    pub fn with_prompt(&self, prompt: impl Into<String>) -> Self {
        let mut copy = self.clone();
        copy.set_prompt(prompt);
        copy
    }

    /// Render the text sent to the backend.
    pub fn full_prompt(&self) -> Result<String> {
        match &self.format {
            PromptFormat::Raw => Ok(self.prompt.clone()),
            PromptFormat::Instruct { template } => {
                template::render(template, &[("prompt", self.prompt.as_str())])
            }
            PromptFormat::LlamaInstruct {
                system_prompt,
                template,
            } => template::render(
                template,
                &[
                    ("system_prompt", system_prompt.as_str()),
                    ("user_prompt", self.prompt.as_str()),
                ],
            ),
            PromptFormat::Chat { .. } => Err(ClientError::Unsupported {
                operation: "chat prompt rendering".to_string(),
            }),
        }
    }

    /// Prompt half of the generate payload.
    pub(crate) fn transport_fields(&self, rendered: String) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("prompt".to_string(), Value::String(rendered));
        if let Some(negative) = &self.negative_prompt {
            fields.insert("negative_prompt".to_string(), Value::String(negative.clone()));
        }
        fields
    }
}

impl From<&str> for Prompt {
    fn from(prompt: &str) -> Self {
        Self::new(prompt)
    }
}

impl From<String> for Prompt {
    fn from(prompt: String) -> Self {
        Self::new(prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_full_prompt_excludes_negative_prompt() {
        let prompt = Prompt::new("prompt").with_negative_prompt("negative_prompt");
        assert_eq!(prompt.full_prompt().unwrap(), "prompt");
    }

    #[test]
    fn test_instruct_default_template_is_identity() {
        let prompt = Prompt::instruct("say hi");
        assert_eq!(prompt.full_prompt().unwrap(), "say hi");
    }

    #[test]
    fn test_full_prompt_uses_instruct_template() {
        let prompt = Prompt::instruct("prompt")
            .with_negative_prompt("negative_prompt")
            .with_template("<DO> {prompt} </DO>");
        assert_eq!(prompt.full_prompt().unwrap(), "<DO> prompt </DO>");
    }

    #[test]
    fn test_generates_expected_llama_instruct_template() {
        let mut prompt =
            Prompt::llama_instruct("Generate a library for ooba booga. Don't laugh at the name.");
        assert!(prompt.set_system_prompt("You are a talented, experienced software engineer."));

        assert_eq!(
            prompt.full_prompt().unwrap(),
            "[INST] <<SYS>> You are a talented, experienced software engineer. <</SYS>> \
             Generate a library for ooba booga. Don't laugh at the name. [/INST]"
        );
    }

    #[test]
    fn test_set_system_prompt_ignored_without_one() {
        let mut prompt = Prompt::instruct("hi");
        assert!(!prompt.set_system_prompt("sys"));
        assert_eq!(prompt, Prompt::instruct("hi"));
    }

    #[test]
    fn test_llama_with_empty_system_prompt() {
        let prompt = Prompt::llama_instruct("hi");
        assert_eq!(prompt.full_prompt().unwrap(), "[INST] <<SYS>>  <</SYS>> hi [/INST]");
    }

    #[test]
    fn test_chat_requires_at_least_one_message() {
        let err = Prompt::chat("prompt", vec![]).unwrap_err();
        assert!(matches!(err, ClientError::Validation { ref field, .. } if field == "messages"));

        let prompt = Prompt::chat("prompt", vec![ChatMessage::new("user", "hello")]).unwrap();
        assert!(matches!(
            prompt.full_prompt(),
            Err(ClientError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_with_prompt_copies() {
        let base = Prompt::llama_instruct("base").with_system_prompt("sys");
        let copy = base.with_prompt("other");

        assert_eq!(base.prompt, "base");
        assert_eq!(copy.prompt, "other");
        assert_eq!(copy.format, base.format);
    }

    #[test]
    fn test_transport_fields() {
        let prompt = Prompt::new("p").with_negative_prompt("n");
        let fields = prompt.transport_fields(prompt.full_prompt().unwrap());
        assert_eq!(Value::Object(fields), json!({"prompt": "p", "negative_prompt": "n"}));

        let fields = Prompt::new("p").transport_fields("p".to_string());
        assert!(!fields.contains_key("negative_prompt"));
    }

    #[test]
    fn test_deserialize_validates_chat_messages() {
        let parsed: std::result::Result<Prompt, _> =
            serde_json::from_value(json!({"prompt": "x", "format": "chat", "messages": []}));
        assert!(parsed.is_err());

        let parsed: Prompt = serde_json::from_value(json!({
            "prompt": "x",
            "format": "instruct",
            "template": "### {prompt}"
        }))
        .unwrap();
        assert_eq!(parsed.full_prompt().unwrap(), "### x");
    }
}
