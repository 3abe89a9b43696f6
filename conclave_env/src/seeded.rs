//! Deterministic randomness source for simulation and replay.

use crate::error::EnvError;
use crate::random::RandomSource;
use crate::types::RngState;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Seeded randomness backed by ChaCha8.
///
/// Every draw consumes exactly one `u64` from the stream, so the position
/// in the stream is fully described by the draw count. That is what makes
/// [`SeededRng::restore`] exact.
#[derive(Debug, Clone)]
pub struct SeededRng {
    /// Master seed for this source
    seed: u64,

    /// Underlying stream
    rng: ChaCha8Rng,

    /// Number of draws made
    draws: u64,

    /// Label of every draw, in order
    log: Vec<String>,
}

impl SeededRng {
    /// Creates a new source with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
            draws: 0,
            log: Vec::new(),
        }
    }

    /// Rebuilds a source from a recorded state.
    ///
    /// The stream is re-seeded and fast-forwarded by `draws` words.
    pub fn restore(state: &RngState) -> Result<Self, EnvError> {
        match state {
            RngState::Seeded { seed, draws, log } => {
                if log.len() as u64 > *draws {
                    return Err(EnvError::corrupt(format!(
                        "log holds {} labels but only {} draws were recorded",
                        log.len(),
                        draws
                    )));
                }
                let mut rng = ChaCha8Rng::seed_from_u64(*seed);
                for _ in 0..*draws {
                    rng.next_u64();
                }
                Ok(Self {
                    seed: *seed,
                    rng,
                    draws: *draws,
                    log: log.clone(),
                })
            }
            RngState::Entropy { .. } => Err(EnvError::mismatch("seeded", "entropy")),
        }
    }

    /// Returns the labels recorded after draw number `from`.
    pub fn log_since(&self, from: u64) -> &[String] {
        let start = (from as usize).min(self.log.len());
        &self.log[start..]
    }
}

impl RandomSource for SeededRng {
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
        RngState::Seeded {
            seed: self.seed,
            draws: self.draws,
            log: self.log.clone(),
        }
    }

    fn seed(&self) -> Option<u64> {
        Some(self.seed)
    }
}
