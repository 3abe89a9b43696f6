//! Labelled draw interface shared by every randomness source.

use crate::types::RngState;

/// The central interface for randomness in the simulation.
///
/// Implementations must guarantee that, for a seeded source, an identical
/// seed and an identical call order yield an identical sequence of values.
///
/// # Implementations
///
/// - **Simulation**: `SeededRng` - ChaCha8 seeded from a `u64`
/// - **Free-running**: `EntropyRng` - seeded from OS entropy, not replayable
///
/// Every draw is tagged with a label so divergence reports can say *which*
/// decision consumed an unexpected value.
pub trait RandomSource {
    /// Returns a uniform value in `[0, 1)` and logs `label`.
    fn random(&mut self, label: &str) -> f64;

    /// Returns the number of draws made since creation (or since the state
    /// this source was restored from).
    fn draw_count(&self) -> u64;

    /// Returns the ordered labels of every draw made so far.
    fn draw_log(&self) -> &[String];

    /// Returns a restorable description of this source.
    fn state(&self) -> RngState;

    /// Returns the seed, if this source is seeded.
    fn seed(&self) -> Option<u64>;

    /// Picks an index in `0..len` with a single draw.
    ///
    /// Returns `None` (and makes no draw) when `len == 0`.
    fn pick_index(&mut self, len: usize, label: &str) -> Option<usize> {
        if len == 0 {
            return None;
        }
        let roll = self.random(label);
        let index = (roll * len as f64) as usize;
        Some(index.min(len - 1))
    }

    /// Bernoulli trial with probability `p` (one draw, clamped to `[0, 1]`).
    fn chance(&mut self, p: f64, label: &str) -> bool {
        self.random(label) < p.clamp(0.0, 1.0)
    }
}

/// Generic helpers available on every [`RandomSource`], including trait
/// objects.
pub trait RandomSourceExt: RandomSource {
    /// Picks one element of `items` with a single labelled draw.
    fn pick_random<'a, T>(&mut self, items: &'a [T], label: &str) -> Option<&'a T> {
        self.pick_index(items.len(), label).map(|i| &items[i])
    }
}

impl<R: RandomSource + ?Sized> RandomSourceExt for R {}

impl<R: RandomSource + ?Sized> RandomSource for Box<R> {
    fn random(&mut self, label: &str) -> f64 {
        (**self).random(label)
    }

    fn draw_count(&self) -> u64 {
        (**self).draw_count()
    }

    fn draw_log(&self) -> &[String] {
        (**self).draw_log()
    }

    fn state(&self) -> RngState {
        (**self).state()
    }

    fn seed(&self) -> Option<u64> {
        (**self).seed()
    }
}
