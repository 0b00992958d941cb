//! Random source for the probabilistic movies split.
//!
//! [`RandomSource`] is the seam the decision engine draws from; the
//! gateway owns one [`SharedRng`] and hands it to every request. Draws are
//! serialized through a mutex, so any number of request tasks may share it.

use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub trait RandomSource: Send + Sync {
    /// Uniform integer in `[0, 100)`.
    fn draw_percent(&self) -> u8;
}

#[derive(Debug)]
pub struct SharedRng {
    rng: Mutex<StdRng>,
}

impl SharedRng {
    #[must_use]
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic generator, for reproducible runs.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for SharedRng {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl RandomSource for SharedRng {
    fn draw_percent(&self) -> u8 {
        // A panic while holding the lock cannot leave StdRng half-updated
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.gen_range(0..100)
    }
}
