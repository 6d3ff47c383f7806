//! Client events and actions.

use murmur_proto::{ClientMessage, PeerId, ServerMessage};

/// Events fed into [`crate::Client::handle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// The transport reached the relay.
    Connected,

    /// The relay accepted our join.
    Welcome {
        /// Our relay-issued id.
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

    /// A peer announced its public key (base64).
    PublicKeyReceived {
        /// Announcing peer.
        from: PeerId,
        /// Base64 public key.
        public_key: String,
    },

    /// A peer sent us a sealed frame (base64).
    FrameReceived {
        /// Sending peer.
        from: PeerId,
        /// Base64 `nonce || ciphertext`.
        frame: String,
    },

    /// A peer left or disconnected.
    PeerLeft {
        /// The departed peer.
        peer_id: PeerId,
    },

    /// The application wants to send a message to every keyed peer.
    SendMessage {
        /// Message bytes.
        plaintext: Vec<u8>,
    },

    /// End the session.
    Close,
}

impl TryFrom<ServerMessage> for ClientEvent {
    /// The relay's refusal reason.
    type Error = String;

    fn try_from(message: ServerMessage) -> Result<Self, Self::Error> {
        match message {
            ServerMessage::Welcome { peer_id, room } => Ok(Self::Welcome { peer_id, room }),
            ServerMessage::PeerJoined { peer_id, name } => Ok(Self::PeerJoined { peer_id, name }),
            ServerMessage::PublicKeyReceived { from, public_key } => {
                Ok(Self::PublicKeyReceived { from, public_key })
            },
            ServerMessage::FrameReceived { from, frame } => Ok(Self::FrameReceived { from, frame }),
            ServerMessage::PeerLeft { peer_id } => Ok(Self::PeerLeft { peer_id }),
            ServerMessage::Error { reason } => Err(reason),
        }
    }
}

/// Actions produced by the client for the caller to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    /// Push this message to the relay.
    Send(ClientMessage),

    /// Show a decrypted message to the user.
    DeliverMessage {
        /// Sending peer.
        from: PeerId,
        /// Decrypted bytes.
        plaintext: Vec<u8>,
    },

    /// Another participant entered the room.
    PeerJoined {
        /// The newcomer.
        peer_id: PeerId,
        /// The newcomer's display name.
        name: String,
    },

    /// A session key with the peer is ready (new or replaced).
    PeerKeyed {
        /// The keyed peer.
        peer_id: PeerId,
    },

    /// The peer's keys were destroyed.
    PeerRemoved {
        /// The departed peer.
        peer_id: PeerId,
    },
}
