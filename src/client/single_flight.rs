use std::borrow::Cow;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::{
    error::Result,
    params::Parameters,
    prompt::Prompt,
};

use super::{client::ApiClient, Instruct, InstructOptions, LanguageModel};

/// Language model that lets only one request reach the backend at a time.
///
/// Every call copies the base prompt, swaps in the caller's text and then
/// blocks on a shared guard for the whole round trip. Concurrent callers
/// queue on the guard and are served one at a time. Clones share the guard,
/// as do wrappers joined through [`with_guard`](Self::with_guard).
pub struct SingleFlightLlm<B = ApiClient> {
    base_prompt: Prompt,
    parameters: Parameters,
    backend: Arc<B>,
    print_prompt: bool,
    guard: Arc<Mutex<()>>,
}

impl<B: Instruct> SingleFlightLlm<B> {
    pub fn new(backend: B, base_prompt: Prompt) -> Self {
        Self::with_shared_backend(Arc::new(backend), base_prompt)
    }

    pub fn with_shared_backend(backend: Arc<B>, base_prompt: Prompt) -> Self {
        Self {
            base_prompt,
            parameters: Parameters::default(),
            backend,
            print_prompt: false,
            guard: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_print_prompt(mut self, print_prompt: bool) -> Self {
        self.print_prompt = print_prompt;
        self
    }

    /// Serialize this wrapper with every other holder of `guard`.
    pub fn with_guard(mut self, guard: Arc<Mutex<()>>) -> Self {
        self.guard = guard;
        self
    }

    pub fn guard(&self) -> Arc<Mutex<()>> {
        Arc::clone(&self.guard)
    }

    pub fn base_prompt(&self) -> &Prompt {
        &self.base_prompt
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }
}

impl<B> Clone for SingleFlightLlm<B> {
    fn clone(&self) -> Self {
        Self {
            base_prompt: self.base_prompt.clone(),
            parameters: self.parameters.clone(),
            backend: Arc::clone(&self.backend),
            print_prompt: self.print_prompt,
            guard: Arc::clone(&self.guard),
        }
    }
}

impl<B: Instruct> LanguageModel for SingleFlightLlm<B> {
    fn llm_type(&self) -> &str {
        "ooba"
    }

    fn call(&self, prompt: &str, stop: Option<&[String]>) -> Result<String> {
        let actual_prompt = self.base_prompt.with_prompt(prompt);
        let parameters = match stop {
            Some(stop) if !stop.is_empty() => {
                Cow::Owned(self.parameters.with_stopping_strings(stop.iter().cloned()))
            }
            _ => Cow::Borrowed(&self.parameters),
        };
        let options = InstructOptions {
            timeout: None,
            print_prompt: self.print_prompt,
        };

        let _guard = self.guard.lock();
        trace!("single-flight guard acquired");
        self.backend.instruct_with(&actual_prompt, &parameters, &options)
    }
}
