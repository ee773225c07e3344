//! Error types for trickshelf
//!
//! The progress engine itself never fails; everything around it (config,
//! storage, the REST client and the form controllers) reports through
//! [`ShelfError`].

use thiserror::Error;

/// A single failed validation rule on a form field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Main error type for the trickshelf client
#[derive(Error, Debug)]
pub enum ShelfError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Markup that could not be parsed into a fragment
    #[error("Markup parse error: {0}")]
    MarkupError(String),

    /// Form validation failures, one entry per failing field
    #[error("Validation failed: {}", summarize(.0))]
    ValidationError(Vec<FieldError>),

    /// Non-success response from the REST API
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Storage file problems other than raw I/O
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Progress indicators need a tokio runtime for their timers
    #[error("No tokio runtime available: {0}")]
    NoRuntime(String),

    /// Generic errors with context
    #[error("trickshelf error: {0}")]
    Generic(String),
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias for trickshelf operations
pub type Result<T> = std::result::Result<T, ShelfError>;

/// Convert anyhow errors to ShelfError
impl From<anyhow::Error> for ShelfError {
    fn from(err: anyhow::Error) -> Self {
        ShelfError::Generic(err.to_string())
    }
}

impl ShelfError {
    /// Field errors carried by a validation failure, empty otherwise
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            ShelfError::ValidationError(errors) => errors,
            _ => &[],
        }
    }
}
