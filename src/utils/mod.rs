//! Utility functions for logging setup

mod logging;

#[cfg(test)]
pub(crate) use logging::build_subscriber;
pub use logging::{setup_logging, LogConfig};
