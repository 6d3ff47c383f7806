//! Error types for Murmur cryptographic operations.

use thiserror::Error;

/// Errors from identity, key derivation and frame sealing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// The secure randomness source could not produce bytes.
    ///
    /// Fatal during start-up: no key or nonce is ever produced from a
    /// fallback source.
    #[error("secure randomness source unavailable")]
    RandomnessUnavailable,

    /// A public key is malformed or degenerate (low order, non-contributory).
    #[error("invalid public key: {reason}")]
    InvalidKey {
        /// Why the key was rejected.
        reason: &'static str,
    },

    /// Input bytes do not match a fixed primitive length.
    #[error("invalid {field} length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        /// Which input had the wrong length.
        field: &'static str,
        /// Required length.
        expected: usize,
        /// Length received.
        actual: usize,
    },

    /// Frame is too short to contain a nonce and an authentication tag.
    #[error("malformed frame: {len} bytes cannot hold nonce and tag")]
    MalformedFrame {
        /// Length of the rejected frame.
        len: usize,
    },

    /// The AEAD tag did not verify (wrong key or tampered bytes).
    #[error("frame authentication failed")]
    Authentication,

    /// The AEAD refused to encrypt the plaintext.
    #[error("frame encryption failed")]
    Encryption,

    /// HKDF expansion failed.
    #[error("session key derivation failed")]
    KeyDerivation,
}

impl CryptoError {
    /// Returns true if this error must abort the local session.
    ///
    /// Only a missing randomness source is fatal. Key and frame errors concern
    /// a single peer or message and are surfaced to the caller.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::RandomnessUnavailable)
    }
}
