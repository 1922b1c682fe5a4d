use core::result::Result as CoreResult;
use std::io::Error as IoError;

use serde_json::Error as SerdeJsonError;
use thiserror::Error as ThisError;
use toml::de::Error as TomlError;

/// Result type for core operations.
pub type Result<T> = CoreResult<T, Error>;

/// Errors that can occur in the plan-execution core.
#[derive(Debug, ThisError)]
pub enum Error {
    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization or deserialization failed.
    #[error("JSON serialization error: {0}")]
    Json(#[from] SerdeJsonError),

    /// TOML deserialization failed.
    #[error("TOML deserialization error: {0}")]
    Toml(#[from] TomlError),

    /// Configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The plan failed validation and cannot be executed.
    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    /// The decision oracle transport failed.
    #[error("Oracle error: {0}")]
    Oracle(String),

    /// The decision oracle kept violating its response schema until the
    /// corrective re-prompt budget ran out.
    #[error("Oracle exhausted corrective re-prompts: {0}")]
    OracleExhausted(String),

    /// The execution log rejected an operation.
    #[error("Execution log error: {0}")]
    Log(String),

    /// Another run already holds the lease for this conversation key.
    #[error("Run lease unavailable for key: {0}")]
    LeaseHeld(String),

    /// The run was cancelled cooperatively before completion.
    #[error("Run cancelled")]
    Cancelled,

    /// A spawned execution task failed to join.
    #[error("Execution task failed: {0}")]
    TaskJoin(String),

    /// A general error not covered by other variants.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Determines whether this error may succeed if retried.
    ///
    /// Returns `true` for transient faults like oracle transport errors;
    /// schema exhaustion, invalid plans, and cancellation are final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Oracle(_) | Self::Log(_))
    }
}
