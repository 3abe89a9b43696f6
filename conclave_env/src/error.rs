//! Error types for the randomness abstraction.

use thiserror::Error;

/// Errors that can occur in the randomness layer.
#[derive(Debug, Error)]
pub enum EnvError {
    /// A state of the wrong kind was handed to a restore function
    #[error("Cannot restore {expected} source from {found} state")]
    StateMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// The recorded log does not match the recorded draw count
    #[error("Corrupt RNG state: {0}")]
    CorruptState(String),
}

impl EnvError {
    /// Creates a state-mismatch error.
    pub fn mismatch(expected: &'static str, found: &'static str) -> Self {
        Self::StateMismatch { expected, found }
    }

    /// Creates a corrupt-state error.
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::CorruptState(msg.into())
    }
}
