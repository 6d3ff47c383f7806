//! Per-session identity key pairs.
//!
//! A participant generates exactly one [`IdentityKeyPair`] per local session.
//! The public half is announced to the room; the private half never leaves the
//! process, is never serialized, and is zeroized when the pair is dropped.

use std::fmt;

use x25519_dalek::{SharedSecret, StaticSecret};
use zeroize::Zeroizing;

use crate::{entropy::EntropySource, error::CryptoError};

/// X25519 public key size in bytes.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// X25519 private key size in bytes.
const SECRET_KEY_SIZE: usize = 32;

/// Curve25519 u-coordinates of small order, in canonical and non-canonical
/// encodings. Agreement with any of them yields a predictable secret.
const LOW_ORDER_POINTS: [[u8; PUBLIC_KEY_SIZE]; 7] = [
    [0x00; 32],
    [
        0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00,
    ],
    [
        0xe0, 0xeb, 0x7a, 0x7c, 0x3b, 0x41, 0xb8, 0xae, 0x16, 0x56, 0xe3, 0xfa, 0xf1, 0x9f, 0xc4,
        0x6a, 0xda, 0x09, 0x8d, 0xeb, 0x9c, 0x32, 0xb1, 0xfd, 0x86, 0x62, 0x05, 0x16, 0x5f, 0x49,
        0xb8, 0x00,
    ],
    [
        0x5f, 0x9c, 0x95, 0xbc, 0xa3, 0x50, 0x8c, 0x24, 0xb1, 0xd0, 0xb1, 0x55, 0x9c, 0x83, 0xef,
        0x5b, 0x04, 0x44, 0x5c, 0xc4, 0x58, 0x1c, 0x8e, 0x86, 0xd8, 0x22, 0x4e, 0xdd, 0xd0, 0x9f,
        0x11, 0x57,
    ],
    [
        0xec, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0x7f,
    ],
    [
        0xed, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0x7f,
    ],
    [
        0xee, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0x7f,
    ],
];

/// Public X25519 key as announced to the room.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKey([u8; PUBLIC_KEY_SIZE]);

impl PublicKey {
    /// Wrap raw key bytes without validation.
    ///
    /// Degenerate keys are rejected later by [`crate::derive_session_key`].
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Parse key bytes received from the wire.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidLength` unless `bytes` is exactly
    /// [`PUBLIC_KEY_SIZE`] long. Input is never truncated or padded.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let array: [u8; PUBLIC_KEY_SIZE] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidLength {
                field: "public key",
                expected: PUBLIC_KEY_SIZE,
                actual: bytes.len(),
            }
        })?;
        Ok(Self(array))
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.0
    }

    /// Hex encoding of the key.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Reject the identity and other small-order points.
    ///
    /// The top bit of the encoding is ignored by X25519, so it is masked
    /// before comparison.
    pub(crate) fn ensure_not_low_order(&self) -> Result<(), CryptoError> {
        let mut masked = self.0;
        masked[PUBLIC_KEY_SIZE - 1] &= 0x7f;

        if LOW_ORDER_POINTS.iter().any(|point| *point == masked) {
            return Err(CryptoError::InvalidKey { reason: "low order point" });
        }
        Ok(())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short fingerprint, enough for logs.
        write!(f, "{}", &self.to_hex()[..12])
    }
}

/// X25519 key pair owned exclusively by the local participant.
pub struct IdentityKeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl IdentityKeyPair {
    /// Generate a fresh, uniformly random key pair.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::RandomnessUnavailable` if `entropy` cannot
    /// produce bytes. No key is produced in that case.
    pub fn generate(entropy: &impl EntropySource) -> Result<Self, CryptoError> {
        let mut seed = Zeroizing::new([0u8; SECRET_KEY_SIZE]);
        entropy.try_fill(seed.as_mut_slice())?;

        let secret = StaticSecret::from(*seed);
        let public = PublicKey(x25519_dalek::PublicKey::from(&secret).to_bytes());

        Ok(Self { secret, public })
    }

    /// The public half, safe to announce.
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Raw X25519 agreement with a remote public key.
    pub(crate) fn diffie_hellman(&self, remote: &PublicKey) -> SharedSecret {
        self.secret.diffie_hellman(&x25519_dalek::PublicKey::from(remote.0))
    }
}

impl fmt::Debug for IdentityKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not reveal the private key when printing debug info.
        f.debug_struct("IdentityKeyPair")
            .field("public", &self.public)
            .field("secret", &"***")
            .finish()
    }
}
