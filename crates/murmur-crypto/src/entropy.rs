//! Sources of secure randomness.
//!
//! Every private key and nonce in this crate is drawn through an
//! [`EntropySource`]. Failure is reported, never papered over: a source that
//! cannot produce bytes yields [`CryptoError::RandomnessUnavailable`] and the
//! caller must not proceed with a predictable key.

use crate::error::CryptoError;

/// Fills buffers with cryptographically secure random bytes.
///
/// # Invariants
///
/// - Unpredictability in production: implementations use OS entropy or a
///   CSPRNG seeded from it
/// - Determinism during simulations: a seeded implementation produces the
///   same sequence for the same seed
/// - No silent fallback: on failure the buffer contents are unspecified and an
///   error is returned
pub trait EntropySource {
    /// Fill `buffer` entirely with random bytes.
    fn try_fill(&self, buffer: &mut [u8]) -> Result<(), CryptoError>;

    /// Draw a fixed-size random array.
    fn random_array<const N: usize>(&self) -> Result<[u8; N], CryptoError>
    where
        Self: Sized,
    {
        let mut out = [0u8; N];
        self.try_fill(&mut out)?;
        Ok(out)
    }
}

impl<T: EntropySource + ?Sized> EntropySource for &T {
    fn try_fill(&self, buffer: &mut [u8]) -> Result<(), CryptoError> {
        (**self).try_fill(buffer)
    }
}

/// Operating system entropy via `getrandom`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn try_fill(&self, buffer: &mut [u8]) -> Result<(), CryptoError> {
        getrandom::fill(buffer).map_err(|_| CryptoError::RandomnessUnavailable)
    }
}

/// Seeded ChaCha20 entropy for deterministic tests and simulations.
///
/// Never use outside tests: the whole stream is determined by the seed.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug)]
pub struct ChaChaEntropy {
    rng: std::sync::Mutex<rand_chacha::ChaCha20Rng>,
}

#[cfg(any(test, feature = "test-utils"))]
impl ChaChaEntropy {
    /// Create a source whose output is fully determined by `seed`.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        use rand_chacha::rand_core::SeedableRng;

        Self { rng: std::sync::Mutex::new(rand_chacha::ChaCha20Rng::from_seed(seed)) }
    }

    /// Create a source from a `u64` seed.
    pub fn seed_from_u64(seed: u64) -> Self {
        use rand_chacha::rand_core::SeedableRng;

        Self { rng: std::sync::Mutex::new(rand_chacha::ChaCha20Rng::seed_from_u64(seed)) }
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl EntropySource for ChaChaEntropy {
    fn try_fill(&self, buffer: &mut [u8]) -> Result<(), CryptoError> {
        use rand_chacha::rand_core::RngCore;

        let mut rng = self.rng.lock().map_err(|_| CryptoError::RandomnessUnavailable)?;
        rng.try_fill_bytes(buffer).map_err(|_| CryptoError::RandomnessUnavailable)
    }
}
