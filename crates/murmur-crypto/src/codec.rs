//! Frame sealing with XChaCha20-Poly1305.
//!
//! A [`SealedFrame`] is the only thing ever placed on the wire for message
//! content. Its transport encoding is `nonce || ciphertext`, where the
//! ciphertext carries the 16-byte Poly1305 tag.
//!
//! The 24-byte nonce is drawn from the entropy source inside [`seal`] for
//! every call; there is no API that accepts a caller-supplied nonce. With
//! 192 random bits the birthday bound is far beyond any realistic number of
//! messages per session key.

use chacha20poly1305::{
    Key, XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit},
};

use crate::{derive::SessionKey, entropy::EntropySource, error::CryptoError};

/// XChaCha20 nonce size in bytes.
pub const NONCE_SIZE: usize = 24;

/// Poly1305 authentication tag size in bytes.
pub const TAG_SIZE: usize = 16;

/// One encrypted message for one peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedFrame {
    nonce: [u8; NONCE_SIZE],
    ciphertext: Vec<u8>,
}

impl SealedFrame {
    /// Split a transport encoding into nonce and ciphertext.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::MalformedFrame` if `bytes` is shorter than a
    /// nonce plus a tag.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::MalformedFrame { len: bytes.len() });
        }

        let (nonce, ciphertext) = bytes.split_at(NONCE_SIZE);
        let nonce: [u8; NONCE_SIZE] = nonce
            .try_into()
            .map_err(|_| CryptoError::MalformedFrame { len: bytes.len() })?;

        Ok(Self { nonce, ciphertext: ciphertext.to_vec() })
    }

    /// Transport encoding: `nonce || ciphertext`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// The per-message nonce.
    pub fn nonce(&self) -> &[u8; NONCE_SIZE] {
        &self.nonce
    }

    /// Authenticated ciphertext including the tag.
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Length of the transport encoding.
    pub fn len(&self) -> usize {
        NONCE_SIZE + self.ciphertext.len()
    }

    /// Always false: a frame holds at least a nonce and a tag.
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Encrypt `plaintext` under `key` with a fresh random nonce.
///
/// # Errors
///
/// - `CryptoError::RandomnessUnavailable` if no nonce can be drawn
/// - `CryptoError::Encryption` if the AEAD refuses the input
pub fn seal(
    key: &SessionKey,
    plaintext: &[u8],
    entropy: &impl EntropySource,
) -> Result<SealedFrame, CryptoError> {
    let mut nonce = [0u8; NONCE_SIZE];
    entropy.try_fill(&mut nonce)?;

    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce), plaintext)
        .map_err(|_| CryptoError::Encryption)?;

    Ok(SealedFrame { nonce, ciphertext })
}

/// Decrypt and authenticate `frame` under `key`.
///
/// An empty plaintext is a successful `Ok(vec![])`; every failure is an
/// error and no partial plaintext is ever returned.
///
/// # Errors
///
/// Returns `CryptoError::Authentication` for a wrong key or tampered bytes.
pub fn open(key: &SessionKey, frame: &SealedFrame) -> Result<Vec<u8>, CryptoError> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    cipher
        .decrypt(XNonce::from_slice(&frame.nonce), frame.ciphertext.as_slice())
        .map_err(|_| CryptoError::Authentication)
}

/// Parse a transport encoding and open it.
///
/// # Errors
///
/// `CryptoError::MalformedFrame` for short input, otherwise as [`open`].
pub fn open_bytes(key: &SessionKey, bytes: &[u8]) -> Result<Vec<u8>, CryptoError> {
    open(key, &SealedFrame::from_bytes(bytes)?)
}
