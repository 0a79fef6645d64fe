use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// A field failed its declared constraint at construction time.
    #[error("Validation error for {field}: {message}")]
    Validation {
        field: String,
        message: String,
    },

    /// A prompt template could not be rendered.
    #[error("Template error in {template:?}: {message}")]
    Template {
        template: String,
        message: String,
    },

    /// The caller asked for something the client cannot do yet.
    #[error("Unsupported configuration for {parameter}: {message}")]
    UnsupportedConfiguration {
        parameter: String,
        message: String,
    },

    #[error("Configuration error for {parameter}: {message}")]
    Configuration {
        parameter: String,
        message: String,
    },

    #[error("Operation '{operation}' is not supported")]
    Unsupported {
        operation: String,
    },

    /// The backend answered with a non-success status.
    #[error("HTTP {} {reason} for url ({url})", .status.as_u16())]
    Http {
        status: StatusCode,
        reason: String,
        url: String,
    },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid response: {message}")]
    InvalidResponse {
        message: String,
    },

    /// The backend reported a failure inside a 2xx body.
    #[error("Backend error: {message}")]
    Backend {
        message: String,
    },
}

impl ClientError {
    pub(crate) fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ClientError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub(crate) fn invalid_response(message: impl Into<String>) -> Self {
        ClientError::InvalidResponse {
            message: message.into(),
        }
    }

    /// HTTP status carried by the error, if the backend produced one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Http { status, .. } => Some(*status),
            ClientError::Transport(e) => e.status(),
            _ => None,
        }
    }

    /// Whether the error was raised while constructing a value object.
    pub fn is_validation(&self) -> bool {
        matches!(self, ClientError::Validation { .. } | ClientError::Template { .. })
    }

    /// Whether the request timed out before the backend answered.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Transport(e) if e.is_timeout())
    }
}
