//! Seeded environment with a virtual clock.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use murmur_core::Environment;
use murmur_crypto::{ChaChaEntropy, CryptoError, EntropySource};

/// Simulation environment.
///
/// Clones share the random stream and the clock, so every participant and
/// the relay draw from one reproducible sequence.
#[derive(Debug, Clone)]
pub struct SimEnv {
    entropy: Arc<ChaChaEntropy>,
    epoch: Instant,
    elapsed_ms: Arc<AtomicU64>,
    seed: u64,
}

impl SimEnv {
    /// Environment whose random stream is determined by `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            entropy: Arc::new(ChaChaEntropy::seed_from_u64(seed)),
            epoch: Instant::now(),
            elapsed_ms: Arc::new(AtomicU64::new(0)),
            seed,
        }
    }

    /// The seed this environment was built from.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Move the virtual clock forward.
    pub fn advance(&self, by: Duration) {
        let ms = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
        self.elapsed_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

impl EntropySource for SimEnv {
    fn try_fill(&self, buffer: &mut [u8]) -> Result<(), CryptoError> {
        self.entropy.try_fill(buffer)
    }
}

impl Environment for SimEnv {
    fn now(&self) -> Instant {
        self.epoch + Duration::from_millis(self.elapsed_ms.load(Ordering::SeqCst))
    }
}
