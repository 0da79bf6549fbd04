//! Policy engine error types

use thiserror::Error;

/// Errors raised while loading, validating or serialising policy.
///
/// Evaluation itself never fails: a malformed rule simply does not match.
#[derive(Error, Debug)]
pub enum PolicyError {
    /// Permission tag was not one of allow/ask/deny
    #[error("Invalid permission level: {0}")]
    InvalidLevel(String),

    /// Pattern segment used a prefix other than tool/arg/category
    #[error("Unknown pattern component '{segment}' in pattern '{pattern}'")]
    UnknownComponent { pattern: String, segment: String },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Subscriber could not be installed
    #[error("Logging error: {0}")]
    Logging(String),
}

impl PolicyError {
    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        PolicyError::InvalidConfig(msg.into())
    }
}

/// Result type alias for policy operations
pub type PolicyResult<T> = Result<T, PolicyError>;
