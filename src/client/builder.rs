use std::time::Duration;

use crate::{
    config::ClientConfig,
    error::Result,
};

use super::client::ApiClient;

/// Builder for constructing an ApiClient instance
#[derive(Debug, Clone, Default)]
pub struct ClientBuilder {
    config: ClientConfig,
}

impl ClientBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    /// Set the whole client configuration
    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Use an explicit base URL instead of host and port
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.config.url = Some(url.into());
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// API keys are not supported yet. Building fails if one is set
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.config.api_key = Some(api_key.into());
        self
    }

    /// Default timeout for every request
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Echo rendered prompts to stdout on [`ApiClient::instruct`]
    pub fn with_print_prompt(mut self, print_prompt: bool) -> Self {
        self.config.print_prompt = print_prompt;
        self
    }

    /// Build the client instance
    pub fn build(self) -> Result<ApiClient> {
        ApiClient::from_config(self.config)
    }
}
