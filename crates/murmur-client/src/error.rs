//! Client error types.

use murmur_crypto::CryptoError;
use murmur_proto::PeerId;
use thiserror::Error;

/// Errors from client operations.
///
/// Per-peer failures leave the session usable; see [`ClientError::is_fatal`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// No secure randomness; no key or nonce can be produced.
    #[error("secure randomness unavailable")]
    RandomnessUnavailable,

    /// A peer announced a key that cannot be used.
    #[error("invalid key from peer {peer_id}: {source}")]
    InvalidKey {
        /// Announcing peer.
        peer_id: PeerId,
        /// Why the key was rejected.
        source: CryptoError,
    },

    /// A frame from a known peer failed to open.
    #[error("cannot decrypt frame from {peer_id}: {source}")]
    Decrypt {
        /// Sending peer.
        peer_id: PeerId,
        /// Malformed frame or authentication failure.
        source: CryptoError,
    },

    /// Sealing a frame for a peer failed.
    #[error("cannot encrypt frame for {peer_id}: {source}")]
    Encrypt {
        /// Recipient.
        peer_id: PeerId,
        /// Underlying failure.
        source: CryptoError,
    },

    /// A frame arrived from a peer whose key is not known.
    #[error("frame from unknown sender {peer_id}")]
    UnknownSender {
        /// Sending peer.
        peer_id: PeerId,
    },

    /// A departed peer announced a key again; it stays removed.
    #[error("peer {peer_id} has left the session")]
    PeerRemoved {
        /// The departed peer.
        peer_id: PeerId,
    },

    /// A key or frame was not valid base64.
    #[error("invalid encoding from {peer_id}: {reason}")]
    InvalidEncoding {
        /// Sending peer.
        peer_id: PeerId,
        /// Decoder message.
        reason: String,
    },

    /// The plaintext would not fit in one packet once sealed.
    #[error("message of {len} bytes exceeds the {max} byte limit")]
    MessageTooLarge {
        /// Plaintext length.
        len: usize,
        /// Largest accepted plaintext.
        max: usize,
    },

    /// The operation needs a joined room.
    #[error("not joined to a room")]
    NotJoined,

    /// The session was closed.
    #[error("session closed")]
    Closed,
}

impl ClientError {
    /// Returns true if this error is fatal (unrecoverable).
    ///
    /// Fatal errors end the session. Everything else concerns one peer or one
    /// message and the session continues.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::RandomnessUnavailable | Self::Closed => true,

            Self::InvalidKey { .. }
            | Self::Decrypt { .. }
            | Self::Encrypt { .. }
            | Self::UnknownSender { .. }
            | Self::PeerRemoved { .. }
            | Self::InvalidEncoding { .. }
            | Self::MessageTooLarge { .. }
            | Self::NotJoined => false,
        }
    }

    /// Map a crypto failure that concerns `peer_id` while sealing.
    pub(crate) fn from_seal(peer_id: PeerId, source: CryptoError) -> Self {
        match source {
            CryptoError::RandomnessUnavailable => Self::RandomnessUnavailable,
            source => Self::Encrypt { peer_id, source },
        }
    }
}
