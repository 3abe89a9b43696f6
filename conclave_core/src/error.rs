//! Error types for the domain layer.

use crate::part::PartId;
use thiserror::Error;

/// Content-authoring violations.
///
/// These indicate invalid scenario data and are never expected at runtime
/// for valid content. Ordinary bad requests (unknown action, unmet
/// precondition) are reported through `ActionResult` instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContentError {
    #[error("Grievance from {source_id} has no dialogue lines")]
    EmptyGrievanceDialogue { source_id: PartId },

    #[error("Grievance from {source_id} has no targets")]
    EmptyGrievanceTargets { source_id: PartId },

    #[error("Unburdened part {part} has no unburdened_job dialogue")]
    MissingUnburdenedJobDialogue { part: PartId },
}

/// Errors decoding a canonical outcome string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("Malformed outcome: {0}")]
    Malformed(String),

    #[error("Unknown outcome kind: {0}")]
    UnknownKind(String),
}

impl CodecError {
    pub fn malformed(code: impl Into<String>) -> Self {
        Self::Malformed(code.into())
    }
}
