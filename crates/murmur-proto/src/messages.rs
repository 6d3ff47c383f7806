//! Relay protocol messages.
//!
//! [`ClientMessage`] flows from a participant to the relay, [`ServerMessage`]
//! from the relay to participants. Base64 fields are opaque to the relay.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque participant identifier issued by the relay.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Wrap a relay-issued identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// At most the first `n` characters, for display names and logs.
    pub fn short(&self, n: usize) -> &str {
        match self.0.char_indices().nth(n) {
            Some((end, _)) => &self.0[..end],
            None => &self.0,
        }
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self.0)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Participant to relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientMessage {
    /// Enter a room.
    ///
    /// The relay answers with [`ServerMessage::Welcome`] carrying the
    /// caller's peer id and tells the other members
    /// [`ServerMessage::PeerJoined`].
    Join {
        /// Room to join.
        room: String,
        /// Display name; the relay picks one when absent or empty.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },

    /// Announce the sender's public key to every other room member.
    AnnouncePublicKey {
        /// Room the sender is in.
        room: String,
        /// Base64 public key.
        public_key: String,
    },

    /// Deliver one sealed frame to one room member.
    SendFrame {
        /// Room the sender is in.
        room: String,
        /// Recipient.
        to: PeerId,
        /// Base64 `nonce || ciphertext`.
        frame: String,
    },

    /// Leave the room.
    Leave {
        /// Room to leave.
        room: String,
    },
}

/// Relay to participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerMessage {
    /// Join acknowledged.
    Welcome {
        /// Identifier assigned to the receiving participant.
        peer_id: PeerId,
        /// Room joined.
        room: String,
    },

    /// Another participant entered the room.
    PeerJoined {
        /// The newcomer.
        peer_id: PeerId,
        /// The newcomer's display name.
        name: String,
    },

    /// A room member announced its public key.
    PublicKeyReceived {
        /// Announcing member.
        from: PeerId,
        /// Base64 public key, unmodified.
        public_key: String,
    },

    /// A room member sent a sealed frame to the receiving participant.
    FrameReceived {
        /// Sending member.
        from: PeerId,
        /// Base64 frame, unmodified.
        frame: String,
    },

    /// A participant left the room or disconnected.
    PeerLeft {
        /// The departed participant.
        peer_id: PeerId,
    },

    /// The relay refused a request.
    Error {
        /// Human-readable reason.
        reason: String,
    },
}
