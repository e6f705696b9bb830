//! Error types for the study_core library.

use std::io;

use crate::step_gate::TransitionError;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for study_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Key-value storage failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Content source failure (unreachable, malformed or empty catalog)
    #[error("Content error: {0}")]
    Content(String),

    /// Requested unit does not exist
    #[error("Study unit not found: {0}")]
    NotFound(String),

    /// A step completion was rejected by the gate
    #[error("Invalid transition: {0}")]
    Transition(#[from] TransitionError),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
