//! Error types for the course site backend glue.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Message carried by every failure of the degraded client.
pub const NOT_CONFIGURED_MESSAGE: &str = "Supabase not configured";

/// Errors that can occur when talking to the backend or handling requests.
#[derive(Error, Debug)]
pub enum Error {
    /// Backend endpoint or public key missing
    #[error("Supabase not configured")]
    NotConfigured,

    /// Operation requires a signed-in user
    #[error("User not authenticated")]
    NotAuthenticated,

    /// Authentication error (OAuth callback, token handling)
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Failure reported by the remote backend, message passed through unchanged
    #[error("{message}")]
    Remote { status: u16, message: String },

    /// Transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of an [`Error`], for exhaustive matching by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotConfigured,
    NotAuthenticated,
    Auth,
    Remote,
    Transport,
    Validation,
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotConfigured => ErrorKind::NotConfigured,
            Error::NotAuthenticated => ErrorKind::NotAuthenticated,
            Error::Auth(_) => ErrorKind::Auth,
            Error::Remote { .. } => ErrorKind::Remote,
            Error::Http(_) => ErrorKind::Transport,
            Error::Validation(_) => ErrorKind::Validation,
            Error::Serialization(_) | Error::Config(_) | Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            Error::NotAuthenticated | Error::Auth(_) => 401,
            Error::Remote { status, .. } if (400..500).contains(status) => *status,
            Error::NotConfigured => 503,
            Error::Http(_) | Error::Remote { .. } => 502,
            _ => 500,
        }
    }
}
