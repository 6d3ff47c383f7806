//! Relay error types.

use murmur_proto::{PeerId, ProtocolError};
use thiserror::Error;

/// Errors from room manager operations.
///
/// Everything except [`RoomError::UnknownConnection`] and
/// [`RoomError::RandomnessUnavailable`] is reported back to the requesting
/// participant as a `ServerMessage::Error`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    /// The connection is not registered.
    #[error("unknown connection: {0}")]
    UnknownConnection(PeerId),

    /// No randomness for a peer id.
    #[error("secure randomness unavailable")]
    RandomnessUnavailable,

    /// The relay is full.
    #[error("connection limit reached ({max})")]
    ConnectionLimit {
        /// Configured limit.
        max: usize,
    },

    /// Join requested with an empty room name.
    #[error("room name must not be empty")]
    EmptyRoomName,

    /// Join while already in a room.
    #[error("already joined room {room}")]
    AlreadyJoined {
        /// Current room.
        room: String,
    },

    /// Room message before joining.
    #[error("not joined to a room")]
    NotJoined,

    /// Message names a room other than the one joined.
    #[error("joined room {joined}, not {requested}")]
    RoomMismatch {
        /// Current room.
        joined: String,
        /// Room in the request.
        requested: String,
    },

    /// Frame addressed to someone not in the sender's room.
    #[error("no member {peer_id} in room")]
    UnknownRecipient {
        /// Requested recipient.
        peer_id: PeerId,
    },
}

impl RoomError {
    /// True if the error is reported to the participant instead of failing the
    /// connection.
    pub fn is_client_facing(&self) -> bool {
        !matches!(self, Self::UnknownConnection(_) | Self::RandomnessUnavailable)
    }
}

/// Errors that can occur in the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport/network error
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Protocol error
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Room manager error
    #[error("room error: {0}")]
    Room(#[from] RoomError),
}
