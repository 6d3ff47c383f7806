//! Pairwise session key derivation.
//!
//! Derives the symmetric key shared by two participants from their identity
//! keys:
//!
//! ```text
//! shared      = X25519(local_secret, remote_public)
//! (lo, hi)    = sort(local_public, remote_public)
//! session_key = HKDF-SHA256(salt = SESSION_KEY_SALT, ikm = shared, info = lo || hi)
//! ```
//!
//! X25519 is symmetric, and sorting the public keys removes any notion of
//! initiator and responder, so `derive(A, B.pub) == derive(B, A.pub)` holds
//! without negotiation.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::{
    error::CryptoError,
    identity::{IdentityKeyPair, PUBLIC_KEY_SIZE, PublicKey},
    secret::Secret,
};

/// Session key size in bytes (XChaCha20-Poly1305 key).
pub const KEY_SIZE: usize = 32;

/// HKDF salt (domain separation).
const SESSION_KEY_SALT: &[u8] = b"murmur/session-key/v1";

/// Symmetric key shared by exactly one pair of participants.
///
/// Zeroized on drop, compared in constant time, redacted from `Debug`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionKey(Secret<KEY_SIZE>);

impl SessionKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(Secret::from_bytes(bytes))
    }

    /// Parse key bytes, rejecting any length other than [`KEY_SIZE`].
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let array: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| CryptoError::InvalidLength {
            field: "session key",
            expected: KEY_SIZE,
            actual: bytes.len(),
        })?;
        Ok(Self::from_bytes(array))
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        self.0.as_bytes()
    }
}

/// Derive the session key for the pair `(local, remote)`.
///
/// Pure function of `(local private key, local public key, remote public
/// key)`, and equal on both sides of the pair.
///
/// # Errors
///
/// - `CryptoError::InvalidKey` if `remote` is a low-order point or the
///   agreement is non-contributory
/// - `CryptoError::KeyDerivation` if HKDF expansion fails
pub fn derive_session_key(
    local: &IdentityKeyPair,
    remote: &PublicKey,
) -> Result<SessionKey, CryptoError> {
    remote.ensure_not_low_order()?;

    let shared = local.diffie_hellman(remote);
    if !shared.was_contributory() {
        return Err(CryptoError::InvalidKey { reason: "non-contributory key agreement" });
    }

    let info = transcript(local.public_key(), remote);
    let hk = Hkdf::<Sha256>::new(Some(SESSION_KEY_SALT), shared.as_bytes());

    let mut okm = Zeroizing::new([0u8; KEY_SIZE]);
    hk.expand(&info, okm.as_mut_slice()).map_err(|_| CryptoError::KeyDerivation)?;

    Ok(SessionKey::from_bytes(*okm))
}

/// Both public keys in canonical (lexicographic) order.
fn transcript(a: &PublicKey, b: &PublicKey) -> [u8; 2 * PUBLIC_KEY_SIZE] {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };

    let mut info = [0u8; 2 * PUBLIC_KEY_SIZE];
    info[..PUBLIC_KEY_SIZE].copy_from_slice(lo.as_bytes());
    info[PUBLIC_KEY_SIZE..].copy_from_slice(hi.as_bytes());
    info
}
