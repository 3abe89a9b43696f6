//! Error types for the harness layer.

use conclave_core::ContentError;
use conclave_env::EnvError;
use thiserror::Error;

/// Errors raised while loading, running or replaying a session.
///
/// Illegal actions are not errors; they come back as an `ActionResult`
/// with `success == false`.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Authored content violates a domain rule
    #[error("Content error: {0}")]
    Content(#[from] ContentError),

    /// A recorded RNG state could not be restored
    #[error("RNG error: {0}")]
    Env(#[from] EnvError),

    /// The scenario definition is invalid
    #[error("Invalid scenario: {0}")]
    Scenario(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarnessError {
    /// Creates an invalid-scenario error.
    pub fn scenario(msg: impl Into<String>) -> Self {
        Self::Scenario(msg.into())
    }
}
