//! textgen-client - Blocking client for the text-generation web UI API
//!
//! This crate builds generate requests from a [`Prompt`] and a validated set
//! of [`Parameters`], posts them to the backend and unwraps the generated
//! text. It can also inspect and switch the backend's loaded model, and wrap
//! a client as a [`LanguageModel`] that keeps at most one request in flight.
//!
//! ```no_run
//! use textgen_client::{ApiClient, Parameters, Prompt};
//!
//! # fn main() -> textgen_client::Result<()> {
//! let client = ApiClient::new()?;
//! let prompt = Prompt::llama_instruct("Write a haiku about borrow checking.")
//!     .with_system_prompt("You are a terse poet.");
//! let text = client.instruct(&prompt, &Parameters::default())?;
//! println!("{text}");
//! # Ok(())
//! # }
//! ```

// Public modules
pub mod client;
pub mod config;
pub mod error;
pub mod params;
pub mod prompt;
pub mod types;
pub mod utils;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// `tracing` target every rendered prompt is logged to at info level.
pub const PROMPT_LOG_TARGET: &str = "textgen_client::prompt";

// Re-exports for public API
pub use client::{ApiClient, ClientBuilder, Instruct, InstructOptions, LanguageModel, SingleFlightLlm};
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use params::{Parameters, ParametersBuilder};
pub use prompt::{ChatMessage, ChatMessages, Prompt, PromptFormat};
pub use types::{ModelInfo, SharedConfig};
pub use utils::{setup_logging, LogConfig};
