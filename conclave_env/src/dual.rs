//! Dual-channel composite: model randomness vs harness randomness.

use crate::entropy::EntropyRng;
use crate::error::EnvError;
use crate::random::RandomSource;
use crate::seeded::SeededRng;
use crate::types::{Channel, RngState};
use serde::{Deserialize, Serialize};

/// Serializable state of both channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DualRngState {
    pub model: RngState,
    pub harness: RngState,
}

/// Two independent randomness sources behind one handle.
///
/// - The **model** channel is handed to the action controller and to time
///   advancement. Its draw count and log are what replay compares.
/// - The **harness** channel is only ever handed to exploration policies.
///
/// The channels never share a stream, so a policy that makes more or fewer
/// draws cannot shift the model sequence.
pub struct DualRng {
    model: Box<dyn RandomSource + Send>,
    harness: Box<dyn RandomSource + Send>,
}

impl DualRng {
    /// Creates a dual source with explicit seeds for both channels.
    pub fn seeded(model_seed: u64, harness_seed: u64) -> Self {
        Self {
            model: Box::new(SeededRng::new(model_seed)),
            harness: Box::new(SeededRng::new(harness_seed)),
        }
    }

    /// Creates a dual source whose harness seed is derived from the model seed.
    pub fn model_only(model_seed: u64) -> Self {
        Self::seeded(model_seed, model_seed.wrapping_mul(crate::HARNESS_SEED_SALT))
    }

    /// Seeded model channel, entropy harness channel.
    pub fn with_entropy_harness(model_seed: u64) -> Self {
        Self {
            model: Box::new(SeededRng::new(model_seed)),
            harness: Box::new(EntropyRng::new()),
        }
    }

    /// Both channels from entropy (no replay possible).
    pub fn entropy() -> Self {
        Self {
            model: Box::new(EntropyRng::new()),
            harness: Box::new(EntropyRng::new()),
        }
    }

    /// Builds a dual source from arbitrary channel implementations.
    pub fn from_sources(
        model: Box<dyn RandomSource + Send>,
        harness: Box<dyn RandomSource + Send>,
    ) -> Self {
        Self { model, harness }
    }

    /// Restores both channels from a recorded state.
    pub fn restore(state: &DualRngState) -> Result<Self, EnvError> {
        Ok(Self {
            model: restore_channel(&state.model)?,
            harness: restore_channel(&state.harness)?,
        })
    }

    /// Returns the state of both channels.
    pub fn state(&self) -> DualRngState {
        DualRngState {
            model: self.model.state(),
            harness: self.harness.state(),
        }
    }

    /// Model channel (read-only).
    pub fn model(&self) -> &dyn RandomSource {
        self.model.as_ref()
    }

    /// Model channel (for domain decisions).
    pub fn model_mut(&mut self) -> &mut (dyn RandomSource + Send) {
        self.model.as_mut()
    }

    /// Harness channel (read-only).
    pub fn harness(&self) -> &dyn RandomSource {
        self.harness.as_ref()
    }

    /// Harness channel (for exploration policy only).
    pub fn harness_mut(&mut self) -> &mut (dyn RandomSource + Send) {
        self.harness.as_mut()
    }

    /// Draw count for one channel.
    pub fn draw_count(&self, channel: Channel) -> u64 {
        match channel {
            Channel::Model => self.model.draw_count(),
            Channel::Harness => self.harness.draw_count(),
        }
    }

    /// Model-channel labels recorded after draw number `from`.
    pub fn model_log_since(&self, from: u64) -> &[String] {
        let log = self.model.draw_log();
        let start = (from as usize).min(log.len());
        &log[start..]
    }
}

impl std::fmt::Debug for DualRng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DualRng")
            .field("model_draws", &self.model.draw_count())
            .field("harness_draws", &self.harness.draw_count())
            .finish()
    }
}

fn restore_channel(state: &RngState) -> Result<Box<dyn RandomSource + Send>, EnvError> {
    match state {
        RngState::Seeded { .. } => Ok(Box::new(SeededRng::restore(state)?)),
        RngState::Entropy { .. } => Ok(Box::new(EntropyRng::resume(state))),
    }
}
