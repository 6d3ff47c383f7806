//! Murmur Cryptographic Primitives
//!
//! Everything a participant needs to talk privately with each peer in a room
//! whose relay is untrusted:
//!
//! - [`IdentityKeyPair`]: one X25519 key pair per participant per session
//! - [`derive_session_key`]: one symmetric key per peer pair, identical on
//!   both sides regardless of who computes it
//! - [`seal`] / [`open`]: XChaCha20-Poly1305 frames carried as
//!   `nonce || ciphertext`
//!
//! # Design
//!
//! Functions are pure apart from the [`EntropySource`] they are handed.
//! Nonces and private keys are drawn inside this crate, never supplied by the
//! caller, so a caller cannot reuse a nonce under the same key. Production
//! code uses [`OsEntropy`]; simulations use a seeded source.
//!
//! # Security Properties
//!
//! - Role agnostic: the session key binds both public keys in canonical
//!   order, so two peers never disagree on "initiator" and "responder"
//! - Fail closed: tampered, truncated or foreign frames are rejected with a
//!   distinct error, never returned as partial plaintext
//! - Hygiene: private keys and session keys are zeroized on drop and
//!   redacted from `Debug`

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod codec;
pub mod derive;
pub mod entropy;
pub mod error;
pub mod identity;
mod secret;

pub use codec::{NONCE_SIZE, SealedFrame, TAG_SIZE, open, open_bytes, seal};
pub use derive::{KEY_SIZE, SessionKey, derive_session_key};
#[cfg(any(test, feature = "test-utils"))]
pub use entropy::ChaChaEntropy;
pub use entropy::{EntropySource, OsEntropy};
pub use error::CryptoError;
pub use identity::{IdentityKeyPair, PUBLIC_KEY_SIZE, PublicKey};
