//! Environment abstraction for deterministic testing.
//!
//! The `Environment` trait decouples session logic from system resources.
//! Production code runs on [`SystemEnv`]; the simulation harness supplies a
//! virtual clock and a seeded random stream so every run can be replayed.
//!
//! # Invariants
//!
//! - Monotonicity: `env.now()` must never go backwards
//! - Determinism: given the same seed, a simulated environment produces the
//!   same random sequence
//! - No silent fallback: randomness failures surface as errors, never as
//!   zero-filled buffers

use std::time::Instant;

use murmur_crypto::{CryptoError, EntropySource};

/// Abstract environment providing time and randomness.
///
/// Randomness comes from the [`EntropySource`] supertrait, so an environment
/// can be handed directly to key generation and sealing.
pub trait Environment: EntropySource + Clone + Send + Sync + 'static {
    /// Returns the current time.
    ///
    /// Must never return a value earlier than a previous call.
    fn now(&self) -> Instant;

    /// Generates a random `u64`.
    fn random_u64(&self) -> Result<u64, CryptoError> {
        self.random_array().map(u64::from_be_bytes)
    }

    /// Generates a random `u128`.
    ///
    /// Used for relay-issued peer ids.
    fn random_u128(&self) -> Result<u128, CryptoError> {
        self.random_array().map(u128::from_be_bytes)
    }
}

/// Production environment using system time and OS entropy.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl EntropySource for SystemEnv {
    fn try_fill(&self, buffer: &mut [u8]) -> Result<(), CryptoError> {
        getrandom::fill(buffer).map_err(|e| {
            tracing::error!(error = %e, "getrandom failed");
            CryptoError::RandomnessUnavailable
        })
    }
}

impl Environment for SystemEnv {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
