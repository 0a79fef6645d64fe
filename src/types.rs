//! Common type definitions shared by the client operations

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ClientError, Result};

/// Model name the backend reports when nothing is loaded.
const NO_MODEL_SENTINEL: &str = "None";

/// Backend-wide configuration echoed by the model endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Command line arguments the backend was started with
    #[serde(rename = "shared.args", default)]
    pub args: Map<String, Value>,
    /// UI and generation settings
    #[serde(rename = "shared.settings", default)]
    pub settings: Map<String, Value>,
}

/// Snapshot of the backend's model state
#[derive(Debug, Clone, PartialEq)]
pub enum ModelInfo {
    Loaded {
        model_name: String,
        lora_names: Vec<String>,
        shared: SharedConfig,
    },
    NotLoaded {
        shared: SharedConfig,
    },
}

#[derive(Debug, Deserialize)]
struct RawModelInfo {
    #[serde(default)]
    model_name: Option<String>,
    #[serde(default)]
    lora_names: Option<Vec<String>>,
    #[serde(flatten)]
    shared: SharedConfig,
}

impl ModelInfo {
    /// Parse the `result` object of a model endpoint reply.
    pub(crate) fn from_result(result: Value) -> Result<Self> {
        if !result.is_object() {
            return Err(ClientError::invalid_response(format!(
                "expected model info object, got {}",
                result
            )));
        }

        let raw: RawModelInfo = serde_json::from_value(result)?;
        let model_name = raw
            .model_name
            .filter(|name| !name.is_empty() && name != NO_MODEL_SENTINEL);

        Ok(match model_name {
            Some(model_name) => ModelInfo::Loaded {
                model_name,
                lora_names: raw.lora_names.unwrap_or_default(),
                shared: raw.shared,
            },
            None => ModelInfo::NotLoaded { shared: raw.shared },
        })
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, ModelInfo::Loaded { .. })
    }

    pub fn model_name(&self) -> Option<&str> {
        match self {
            ModelInfo::Loaded { model_name, .. } => Some(model_name.as_str()),
            ModelInfo::NotLoaded { .. } => None,
        }
    }

    /// Names of the adapters applied on top of the model
    pub fn lora_names(&self) -> &[String] {
        match self {
            ModelInfo::Loaded { lora_names, .. } => lora_names.as_slice(),
            ModelInfo::NotLoaded { .. } => &[],
        }
    }

    pub fn shared(&self) -> &SharedConfig {
        match self {
            ModelInfo::Loaded { shared, .. } | ModelInfo::NotLoaded { shared } => shared,
        }
    }
}

/// Body of a generate reply
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GenerateResponse {
    pub results: Vec<GenerateResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GenerateResult {
    pub text: String,
}

impl GenerateResponse {
    /// Text of the first result.
    pub fn into_text(self) -> Result<String> {
        self.results
            .into_iter()
            .next()
            .map(|result| result.text)
            .ok_or_else(|| ClientError::invalid_response("response contained no results"))
    }
}
