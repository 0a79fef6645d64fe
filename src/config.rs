// Location: src/config.rs

use std::time::Duration;
use serde::{Serialize, Deserialize};

use crate::error::{ClientError, Result};

/// Host used when neither `url` nor `host` is given.
pub const DEFAULT_HOST: &str = "http://localhost";

/// Port the backend API extension listens on by default.
pub const DEFAULT_PORT: u16 = 5000;

/// Default request timeout for generation calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(500);

/// Environment variable overriding the full base URL.
pub const ENV_URL: &str = "TEXTGEN_URL";
/// Environment variable overriding the host.
pub const ENV_HOST: &str = "TEXTGEN_HOST";
/// Environment variable overriding the port.
pub const ENV_PORT: &str = "TEXTGEN_PORT";
/// Environment variable overriding the request timeout, in seconds.
pub const ENV_TIMEOUT_SECS: &str = "TEXTGEN_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Full base URL. Takes precedence over `host` and `port`
    pub url: Option<String>,

    /// Scheme and host of the backend
    pub host: String,

    /// Port of the backend
    pub port: u16,

    /// API key (not supported by the backend yet)
    pub api_key: Option<String>,

    /// Timeout applied to requests unless overridden per call
    pub timeout: Duration,

    /// Echo rendered prompts to stdout
    pub print_prompt: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
            print_prompt: false,
        }
    }
}

impl ClientConfig {
    /// Resolve the base URL the endpoints hang off.
    pub fn base_url(&self) -> String {
        let url = match self.url.as_deref().filter(|u| !u.is_empty()) {
            Some(url) => url.to_string(),
            None => format!("{}:{}", self.host, self.port),
        };
        url.trim_end_matches('/').to_string()
    }

    /// Build a configuration from `TEXTGEN_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_URL) {
            config.url = Some(url);
        }
        if let Some(host) = lookup(ENV_HOST) {
            config.host = host;
        }
        if let Some(port) = lookup(ENV_PORT) {
            config.port = port.trim().parse().map_err(|e| ClientError::Configuration {
                message: format!("invalid port {:?}: {}", port, e),
                parameter: ENV_PORT.to_string(),
            })?;
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            let secs: u64 = secs.trim().parse().map_err(|e| ClientError::Configuration {
                message: format!("invalid timeout {:?}: {}", secs, e),
                parameter: ENV_TIMEOUT_SECS.to_string(),
            })?;
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_key.is_some() {
            return Err(ClientError::UnsupportedConfiguration {
                message: "API keys are not yet supported".to_string(),
                parameter: "api_key".to_string(),
            });
        }

        if self.timeout.is_zero() {
            return Err(ClientError::Configuration {
                message: "Timeout must be greater than zero".to_string(),
                parameter: "timeout".to_string(),
            });
        }

        if self.url.is_none() && self.host.is_empty() {
            return Err(ClientError::Configuration {
                message: "Host cannot be empty when no url is given".to_string(),
                parameter: "host".to_string(),
            });
        }

        Ok(())
    }
}
