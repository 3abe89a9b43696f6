//! Conclave Core - parts, relationships and the rules that move them
//!
//! The domain layer of the Conclave simulation:
//! 1. **State**: parts with bounded trust, need-attention and a revealable
//!    biography, held by [`PartStateManager`]
//! 2. **Relationships**: protection, grievance and proxy edges in
//!    [`CloudRelationshipManager`]
//! 3. **Rules**: [`ActionController`] enumerates and executes legal actions;
//!    [`SimulatorModel::advance_time`] moves the clock analytically
//!
//! State changes are reported as canonical [`Outcome`] strings
//! (`actor:kind[:target]`) so coverage and assertions can key on them.

pub mod part;
pub mod state;
pub mod relationships;
pub mod model;
pub mod outcome;
pub mod action;
pub mod controller;
pub mod tuning;
pub mod error;
mod clock;

// Re-export key types for convenience
pub use part::{
    Biography, BiographyField, DialogueSituation, Dialogues, Part, PartId, ATTACKED_TRUST_CAP,
    SELF_ID, TRUST_CAP,
};
pub use state::PartStateManager;
pub use relationships::{CloudRelationshipManager, GrievanceEdge, ProtectionEdge, ProxyEdge};
pub use model::{BlendReason, BlendState, Message, PendingBlend, SelfRay, SimulatorModel};
pub use outcome::{
    classify, decode, encode, expected_outcomes, strip_field_suffix, time_outcomes, Outcome,
    OutcomeKind, OutcomeMatch,
};
pub use action::{Action, ActionKind, ActionOptions, ActionResult, SideEffect, UiFeedback, WAIT_ACTION};
pub use controller::ActionController;
pub use tuning::Tuning;
pub use error::{CodecError, ContentError};
