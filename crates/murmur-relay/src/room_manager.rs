//! Room Manager
//!
//! Tracks connections and room membership, and routes relay messages.
//!
//! ## Responsibilities
//!
//! - Connection Lifecycle: issue an opaque peer id per connection
//! - Room Membership: join, leave, disconnect
//! - Routing: key announcements to every other member, frames to their
//!   addressee only
//!
//! ## Design
//!
//! - Action-based: all methods return actions, no direct I/O
//! - Opaque payloads: keys and frames are forwarded as received, never decoded
//! - Refusals go back to the requester as `ServerMessage::Error`

use std::{
    collections::{BTreeSet, HashMap},
    time::Instant,
};

use murmur_core::Environment;
use murmur_proto::{ClientMessage, PeerId, ServerMessage};

use crate::error::RoomError;

/// Length of the id prefix used in default display names.
const DEFAULT_NAME_PREFIX: usize = 5;

/// Membership of one connection.
#[derive(Debug, Clone)]
pub struct Membership {
    /// Joined room.
    pub room: String,
    /// Display name announced to the room.
    pub name: String,
    /// When the join was processed.
    pub joined_at: Instant,
}

#[derive(Debug, Clone)]
struct Connection {
    membership: Option<Membership>,
}

/// Actions returned by `RoomManager` for the driver to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomAction {
    /// Send this message to one connection.
    Deliver {
        /// Recipient connection.
        to: PeerId,
        /// Message to send.
        message: ServerMessage,
    },
}

/// Routes messages between connections in the same room.
pub struct RoomManager<E: Environment> {
    connections: HashMap<PeerId, Connection>,
    /// Room name to members, ordered for deterministic fan-out.
    rooms: HashMap<String, BTreeSet<PeerId>>,
    max_connections: usize,
    env: E,
}

impl<E: Environment> RoomManager<E> {
    /// Create a manager accepting at most `max_connections` connections.
    pub fn new(env: E, max_connections: usize) -> Self {
        Self { connections: HashMap::new(), rooms: HashMap::new(), max_connections, env }
    }

    /// Number of open connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Number of non-empty rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Members of `room` in peer id order.
    pub fn members(&self, room: &str) -> Vec<PeerId> {
        self.rooms.get(room).map(|m| m.iter().cloned().collect()).unwrap_or_default()
    }

    /// Membership of `peer_id`, if joined.
    pub fn membership(&self, peer_id: &PeerId) -> Option<&Membership> {
        self.connections.get(peer_id).and_then(|c| c.membership.as_ref())
    }

    /// Register a new connection and issue its peer id.
    ///
    /// # Errors
    ///
    /// - `RoomError::ConnectionLimit` if the relay is full
    /// - `RoomError::RandomnessUnavailable` if no id can be drawn
    pub fn connect(&mut self) -> Result<PeerId, RoomError> {
        if self.connections.len() >= self.max_connections {
            return Err(RoomError::ConnectionLimit { max: self.max_connections });
        }

        let peer_id = loop {
            let raw = self.env.random_u128().map_err(|_| RoomError::RandomnessUnavailable)?;
            let candidate = PeerId::new(format!("{raw:032x}"));
            if !self.connections.contains_key(&candidate) {
                break candidate;
            }
        };

        self.connections.insert(peer_id.clone(), Connection { membership: None });
        tracing::debug!(peer_id = %peer_id, "connection registered");

        Ok(peer_id)
    }

    /// Process one message from `from`.
    ///
    /// Refusals become a `ServerMessage::Error` delivered to `from`.
    ///
    /// # Errors
    ///
    /// `RoomError::UnknownConnection` if `from` is not registered.
    pub fn handle(
        &mut self,
        from: &PeerId,
        message: ClientMessage,
    ) -> Result<Vec<RoomAction>, RoomError> {
        if !self.connections.contains_key(from) {
            return Err(RoomError::UnknownConnection(from.clone()));
        }

        let result = match message {
            ClientMessage::Join { room, name } => self.join(from, room, name),
            ClientMessage::AnnouncePublicKey { room, public_key } => {
                self.announce(from, &room, public_key)
            },
            ClientMessage::SendFrame { room, to, frame } => self.send_frame(from, &room, to, frame),
            ClientMessage::Leave { room } => self.leave(from, &room),
        };

        match result {
            Ok(actions) => Ok(actions),
            Err(e) if e.is_client_facing() => {
                tracing::debug!(peer_id = %from, error = %e, "request refused");
                Ok(vec![RoomAction::Deliver {
                    to: from.clone(),
                    message: ServerMessage::Error { reason: e.to_string() },
                }])
            },
            Err(e) => Err(e),
        }
    }

    /// Drop a connection, telling its room it left.
    pub fn disconnect(&mut self, peer_id: &PeerId) -> Vec<RoomAction> {
        let Some(connection) = self.connections.remove(peer_id) else {
            return vec![];
        };
        tracing::debug!(peer_id = %peer_id, "connection closed");

        match connection.membership {
            Some(membership) => self.depart(peer_id, &membership),
            None => vec![],
        }
    }

    fn join(
        &mut self,
        from: &PeerId,
        room: String,
        name: Option<String>,
    ) -> Result<Vec<RoomAction>, RoomError> {
        if room.is_empty() {
            return Err(RoomError::EmptyRoomName);
        }
        if let Some(current) = self.membership(from) {
            return Err(RoomError::AlreadyJoined { room: current.room.clone() });
        }

        let name = match name {
            Some(name) if !name.trim().is_empty() => name,
            _ => format!("user-{}", from.short(DEFAULT_NAME_PREFIX)),
        };

        let mut actions = vec![RoomAction::Deliver {
            to: from.clone(),
            message: ServerMessage::Welcome { peer_id: from.clone(), room: room.clone() },
        }];
        actions.extend(self.others(&room, from).map(|to| RoomAction::Deliver {
            to,
            message: ServerMessage::PeerJoined { peer_id: from.clone(), name: name.clone() },
        }));

        self.rooms.entry(room.clone()).or_default().insert(from.clone());
        let membership = Membership { room, name, joined_at: self.env.now() };
        tracing::info!(peer_id = %from, room = %membership.room, name = %membership.name, "joined");

        if let Some(connection) = self.connections.get_mut(from) {
            connection.membership = Some(membership);
        }

        Ok(actions)
    }

    fn announce(
        &self,
        from: &PeerId,
        room: &str,
        public_key: String,
    ) -> Result<Vec<RoomAction>, RoomError> {
        self.ensure_in_room(from, room)?;

        Ok(self
            .others(room, from)
            .map(|to| RoomAction::Deliver {
                to,
                message: ServerMessage::PublicKeyReceived {
                    from: from.clone(),
                    public_key: public_key.clone(),
                },
            })
            .collect())
    }

    fn send_frame(
        &self,
        from: &PeerId,
        room: &str,
        to: PeerId,
        frame: String,
    ) -> Result<Vec<RoomAction>, RoomError> {
        self.ensure_in_room(from, room)?;

        let is_member = self.rooms.get(room).is_some_and(|members| members.contains(&to));
        if !is_member || &to == from {
            return Err(RoomError::UnknownRecipient { peer_id: to });
        }

        tracing::trace!(from = %from, to = %to, len = frame.len(), "frame routed");
        Ok(vec![RoomAction::Deliver {
            to,
            message: ServerMessage::FrameReceived { from: from.clone(), frame },
        }])
    }

    fn leave(&mut self, from: &PeerId, room: &str) -> Result<Vec<RoomAction>, RoomError> {
        self.ensure_in_room(from, room)?;

        let membership = self
            .connections
            .get_mut(from)
            .and_then(|c| c.membership.take())
            .ok_or(RoomError::NotJoined)?;

        Ok(self.depart(from, &membership))
    }

    /// Remove `peer_id` from its room and notify the remaining members.
    fn depart(&mut self, peer_id: &PeerId, membership: &Membership) -> Vec<RoomAction> {
        if let Some(members) = self.rooms.get_mut(&membership.room) {
            members.remove(peer_id);
            if members.is_empty() {
                self.rooms.remove(&membership.room);
            }
        }

        let stayed = self.env.now().saturating_duration_since(membership.joined_at);
        tracing::info!(peer_id = %peer_id, room = %membership.room, ?stayed, "left");

        self.others(&membership.room, peer_id)
            .map(|to| RoomAction::Deliver {
                to,
                message: ServerMessage::PeerLeft { peer_id: peer_id.clone() },
            })
            .collect()
    }

    fn ensure_in_room(&self, from: &PeerId, room: &str) -> Result<(), RoomError> {
        let membership = self.membership(from).ok_or(RoomError::NotJoined)?;
        if membership.room != room {
            return Err(RoomError::RoomMismatch {
                joined: membership.room.clone(),
                requested: room.to_string(),
            });
        }
        Ok(())
    }

    /// Members of `room` other than `peer_id`.
    fn others<'a>(
        &'a self,
        room: &'a str,
        peer_id: &'a PeerId,
    ) -> impl Iterator<Item = PeerId> + 'a {
        self.rooms
            .get(room)
            .into_iter()
            .flat_map(|members| members.iter())
            .filter(move |member| *member != peer_id)
            .cloned()
    }
}
