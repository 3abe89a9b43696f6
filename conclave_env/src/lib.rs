//! Conclave Randomness Abstraction Layer
//!
//! This crate provides the labelled draw interface that lets the Conclave
//! simulation run **reproducibly** (seeded ChaCha) or **freely** (OS
//! entropy) behind the same trait.
//!
//! # Core Concept: Two Channels
//!
//! Every draw the simulation makes goes through a [`RandomSource`] and
//! carries a caller-supplied label:
//! - **Model channel**: drives every domain decision (trust checks,
//!   dialogue selection, deflection odds). It is logged and compared
//!   during replay.
//! - **Harness channel**: drives exploration policy only (which legal
//!   action to try next). It never touches domain state.
//!
//! Changing the exploration policy therefore never changes what the
//! simulated world "actually did" for a given model seed.
//!
//! # Example
//!
//! ```
//! use conclave_env::{DualRng, RandomSource, RandomSourceExt};
//!
//! let mut rng = DualRng::model_only(42);
//! let roll = rng.model_mut().random("trust_check:guardian");
//! assert!((0.0..1.0).contains(&roll));
//!
//! let options = ["wait", "notice"];
//! let choice = rng.harness_mut().pick_random(&options, "policy:uniform");
//! assert!(choice.is_some());
//! assert_eq!(rng.model().draw_count(), 1);
//! ```

mod random;
mod seeded;
mod entropy;
mod dual;
mod types;
mod error;

pub use random::{RandomSource, RandomSourceExt};
pub use seeded::SeededRng;
pub use entropy::EntropyRng;
pub use dual::{DualRng, DualRngState};
pub use types::{Channel, RngState, SessionId};
pub use error::EnvError;

/// Multiplier used to derive the harness-channel seed from a model seed.
pub const HARNESS_SEED_SALT: u64 = 0x517cc1b727220a95;

/// Golden-ratio multiplier used to spread per-iteration seeds.
pub const ITERATION_SEED_SALT: u64 = 0x9e3779b97f4a7c15;
