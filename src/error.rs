//! Error types for Mission Deck.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    /// Field-level validation failure. `message` is the primary error, `details`
    /// lists every violation found (the primary one included).
    #[error("{message}")]
    InvalidInput { message: String, details: Vec<String> },

    #[error("{0}")]
    Conflict(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Telegram error: {0}")]
    Telegram(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Single-field validation error.
    pub fn invalid(message: impl Into<String>) -> Self {
        let message = message.into();
        Error::InvalidInput {
            details: vec![message.clone()],
            message,
        }
    }

    /// Validation error built from a non-empty list of violations.
    pub fn invalid_all(details: Vec<String>) -> Self {
        let message = details
            .first()
            .cloned()
            .unwrap_or_else(|| "Invalid input".to_string());
        Error::InvalidInput { message, details }
    }

    pub fn invalid_column(column: &str) -> Self {
        Error::invalid(format!(
            "Invalid column '{}'. Expected one of: inbox, assigned, progress, review",
            column.trim()
        ))
    }

    pub fn task_not_found(id: &str) -> Self {
        Error::NotFound(format!("Task not found: {}", id))
    }
}
