//! Non-deterministic randomness source backed by OS entropy.

use crate::random::RandomSource;
use crate::types::RngState;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Free-running randomness seeded from OS entropy.
///
/// This is the fallback used when no seed is supplied. It keeps the same
/// draw counter and label log as [`crate::SeededRng`] so diagnostics look
/// the same, but its sequence cannot be replayed.
#[derive(Debug, Clone)]
pub struct EntropyRng {
    rng: StdRng,
    draws: u64,
    log: Vec<String>,
}

impl EntropyRng {
    /// Creates a new entropy-backed source.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            draws: 0,
            log: Vec::new(),
        }
    }

    /// Creates a fresh source that keeps the counters from `state`.
    pub fn resume(state: &RngState) -> Self {
        let (draws, log) = match state {
            RngState::Seeded { draws, log, .. } | RngState::Entropy { draws, log } => {
                (*draws, log.clone())
            }
        };
        Self {
            rng: StdRng::from_entropy(),
            draws,
            log,
        }
    }
}

impl Default for EntropyRng {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for EntropyRng {
    fn random(&mut self, label: &str) -> f64 {
        let value: f64 = self.rng.gen();
        self.draws += 1;
        self.log.push(label.to_string());
        value
    }

    fn draw_count(&self) -> u64 {
        self.draws
    }

    fn draw_log(&self) -> &[String] {
        &self.log
    }

    fn state(&self) -> RngState {
        RngState::Entropy {
            draws: self.draws,
            log: self.log.clone(),
        }
    }

    fn seed(&self) -> Option<u64> {
        None
    }
}
