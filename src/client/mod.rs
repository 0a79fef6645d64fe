//! Client module providing the main interface to the backend

mod builder;
mod client;
mod single_flight;

pub use builder::ClientBuilder;
pub use client::{ApiClient, CHAT_PATH, GENERATE_PATH, MODEL_PATH};
pub use single_flight::SingleFlightLlm;

use std::time::Duration;

use crate::{
    error::Result,
    params::Parameters,
    prompt::Prompt,
};

/// Per-call knobs for a generate request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstructOptions {
    /// Request timeout. `None` uses the client's configured timeout
    pub timeout: Option<Duration>,
    /// Echo the rendered prompt to stdout
    pub print_prompt: bool,
}

/// Anything that can turn a prompt and parameters into generated text
pub trait Instruct: Send + Sync {
    /// Render `prompt`, send it with `parameters` and return the generated text
    fn instruct_with(
        &self,
        prompt: &Prompt,
        parameters: &Parameters,
        options: &InstructOptions,
    ) -> Result<String>;
}

/// Pluggable text-in, text-out language model
pub trait LanguageModel: Send + Sync {
    /// Short identifier of the model family
    fn llm_type(&self) -> &str;

    /// Generate a completion for `prompt`, stopping early on any of `stop`
    fn call(&self, prompt: &str, stop: Option<&[String]>) -> Result<String>;
}
