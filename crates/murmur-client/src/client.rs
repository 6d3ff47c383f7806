//! Client state machine.
//!
//! The `Client` owns one participant's identity key pair and peer key table
//! for the lifetime of a relay session. It never performs I/O: relay messages
//! and application sends go in as [`ClientEvent`]s, packets and plaintext come
//! out as [`ClientAction`]s.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use murmur_core::{Environment, KeyStatus, PeerTable, PeerTableError};
use murmur_crypto::{IdentityKeyPair, NONCE_SIZE, PublicKey, SealedFrame, TAG_SIZE, open, seal};
use murmur_proto::{ClientMessage, MAX_PAYLOAD_SIZE, PeerId};

use crate::{
    error::ClientError,
    event::{ClientAction, ClientEvent},
};

/// Packet budget kept for the `SendFrame` envelope: CBOR keys, room name and
/// recipient id.
const ENVELOPE_RESERVE: usize = 16 * 1024;

/// Largest plaintext accepted by [`ClientEvent::SendMessage`].
///
/// The sealed frame (nonce, ciphertext, tag) is base64 encoded, which turns
/// every 3 bytes into 4, and must fit in one packet next to its envelope.
pub const MAX_PLAINTEXT_SIZE: usize =
    (MAX_PAYLOAD_SIZE - ENVELOPE_RESERVE) / 4 * 3 - NONCE_SIZE - TAG_SIZE;

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SessionState {
    /// Created, transport not yet connected.
    Idle,
    /// Join sent, waiting for the relay's welcome.
    Joining,
    /// In the room under a relay-issued id.
    Joined { peer_id: PeerId },
    /// Closed; keys destroyed.
    Closed,
}

/// Client state machine.
///
/// # Type Parameters
///
/// - `E`: Environment implementation for randomness
pub struct Client<E: Environment> {
    /// Key pair for this session only; taken on close.
    identity: Option<IdentityKeyPair>,

    /// Known peers and their session keys.
    peers: PeerTable,

    /// Room to join.
    room: String,

    /// Name sent with the join.
    display_name: Option<String>,

    state: SessionState,

    /// Environment for randomness.
    env: E,
}

impl<E: Environment> Client<E> {
    /// Create a client for `room` with a fresh identity key pair.
    ///
    /// # Errors
    ///
    /// `ClientError::RandomnessUnavailable` if no key pair can be generated.
    pub fn new(
        env: E,
        room: impl Into<String>,
        display_name: Option<String>,
    ) -> Result<Self, ClientError> {
        let identity =
            IdentityKeyPair::generate(&env).map_err(|_| ClientError::RandomnessUnavailable)?;

        Ok(Self {
            identity: Some(identity),
            peers: PeerTable::new(),
            room: room.into(),
            display_name,
            state: SessionState::Idle,
            env,
        })
    }

    /// Our public key; `None` once the session is closed.
    pub fn public_key(&self) -> Option<&PublicKey> {
        self.identity.as_ref().map(IdentityKeyPair::public_key)
    }

    /// Our relay-issued id, once joined.
    pub fn peer_id(&self) -> Option<&PeerId> {
        match &self.state {
            SessionState::Joined { peer_id } => Some(peer_id),
            _ => None,
        }
    }

    /// Room this client joins.
    pub fn room(&self) -> &str {
        &self.room
    }

    /// True once the relay welcomed us.
    pub fn is_joined(&self) -> bool {
        matches!(self.state, SessionState::Joined { .. })
    }

    /// True after [`ClientEvent::Close`].
    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    /// The peer key table.
    pub fn peers(&self) -> &PeerTable {
        &self.peers
    }

    /// Process an event and return resulting actions.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the event cannot be processed. Only errors for
    /// which [`ClientError::is_fatal`] holds end the session.
    pub fn handle(&mut self, event: ClientEvent) -> Result<Vec<ClientAction>, ClientError> {
        if self.is_closed() {
            return Err(ClientError::Closed);
        }

        match event {
            ClientEvent::Connected => Ok(self.handle_connected()),
            ClientEvent::Welcome { peer_id, room } => self.handle_welcome(peer_id, &room),
            ClientEvent::PeerJoined { peer_id, name } => self.handle_peer_joined(peer_id, name),
            ClientEvent::PublicKeyReceived { from, public_key } => {
                self.handle_public_key(from, &public_key)
            },
            ClientEvent::FrameReceived { from, frame } => self.handle_frame(from, &frame),
            ClientEvent::PeerLeft { peer_id } => self.handle_peer_left(peer_id),
            ClientEvent::SendMessage { plaintext } => self.handle_send_message(&plaintext),
            ClientEvent::Close => Ok(self.handle_close()),
        }
    }

    fn handle_connected(&mut self) -> Vec<ClientAction> {
        self.state = SessionState::Joining;

        vec![ClientAction::Send(ClientMessage::Join {
            room: self.room.clone(),
            name: self.display_name.clone(),
        })]
    }

    /// Joined: announce our key to everyone already in the room.
    ///
    /// Only the first welcome after our join counts. Our id filters our own
    /// announcements, so a later welcome must not replace it.
    fn handle_welcome(
        &mut self,
        peer_id: PeerId,
        room: &str,
    ) -> Result<Vec<ClientAction>, ClientError> {
        if self.state != SessionState::Joining {
            tracing::warn!(peer_id = %peer_id, state = ?self.state, "unexpected welcome ignored");
            return Ok(vec![]);
        }
        if room != self.room {
            tracing::warn!(expected = %self.room, actual = %room, "welcome for unexpected room");
        }

        tracing::info!(peer_id = %peer_id, room = %self.room, "joined room");
        self.state = SessionState::Joined { peer_id };

        Ok(vec![self.announce()?])
    }

    /// Re-announce so the newcomer can derive a key with us.
    fn handle_peer_joined(
        &mut self,
        peer_id: PeerId,
        name: String,
    ) -> Result<Vec<ClientAction>, ClientError> {
        self.ensure_joined()?;
        tracing::debug!(peer_id = %peer_id, name = %name, "peer joined");

        Ok(vec![self.announce()?, ClientAction::PeerJoined { peer_id, name }])
    }

    fn handle_public_key(
        &mut self,
        from: PeerId,
        public_key: &str,
    ) -> Result<Vec<ClientAction>, ClientError> {
        self.ensure_joined()?;
        if self.peer_id() == Some(&from) {
            return Ok(vec![]);
        }

        let bytes = decode_base64(&from, public_key)?;
        let public_key = match PublicKey::from_slice(&bytes) {
            Ok(key) => key,
            Err(source) => return Err(ClientError::InvalidKey { peer_id: from, source }),
        };

        let Some(identity) = self.identity.as_ref() else {
            return Err(ClientError::Closed);
        };

        match self.peers.on_announce(from.clone(), public_key, identity) {
            Ok(status) => {
                match status {
                    KeyStatus::New => {
                        tracing::debug!(peer_id = %from, key = %public_key, "peer keyed");
                    },
                    KeyStatus::Rotated => {
                        tracing::info!(peer_id = %from, key = %public_key, "peer key replaced");
                    },
                    KeyStatus::Unchanged => {},
                }
                Ok(vec![ClientAction::PeerKeyed { peer_id: from }])
            },
            Err(PeerTableError::InvalidKey(source)) => {
                tracing::warn!(peer_id = %from, error = %source, "rejected peer key");
                Err(ClientError::InvalidKey { peer_id: from, source })
            },
            Err(PeerTableError::Removed { peer_id }) => Err(ClientError::PeerRemoved { peer_id }),
        }
    }

    fn handle_frame(
        &mut self,
        from: PeerId,
        frame: &str,
    ) -> Result<Vec<ClientAction>, ClientError> {
        self.ensure_joined()?;

        // A departed peer is never re-keyed, so its frames are unknown too.
        let Some(entry) = self.peers.get(&from) else {
            let removed = self.peers.is_removed(&from);
            tracing::debug!(peer_id = %from, removed, "frame from unknown sender");
            return Err(ClientError::UnknownSender { peer_id: from });
        };

        let bytes = decode_base64(&from, frame)?;
        let plaintext = match SealedFrame::from_bytes(&bytes)
            .and_then(|sealed| open(entry.session_key(), &sealed))
        {
            Ok(plaintext) => plaintext,
            Err(source) => {
                tracing::warn!(
                    peer_id = %from,
                    len = bytes.len(),
                    error = %source,
                    "frame rejected"
                );
                return Err(ClientError::Decrypt { peer_id: from, source });
            },
        };

        Ok(vec![ClientAction::DeliverMessage { from, plaintext }])
    }

    fn handle_peer_left(&mut self, peer_id: PeerId) -> Result<Vec<ClientAction>, ClientError> {
        self.ensure_joined()?;

        let had_key = self.peers.on_leave(&peer_id);
        tracing::debug!(peer_id = %peer_id, had_key, "peer left");

        Ok(vec![ClientAction::PeerRemoved { peer_id }])
    }

    /// Seal once per keyed peer, each frame addressed to its peer.
    fn handle_send_message(
        &mut self,
        plaintext: &[u8],
    ) -> Result<Vec<ClientAction>, ClientError> {
        self.ensure_joined()?;
        if plaintext.len() > MAX_PLAINTEXT_SIZE {
            return Err(ClientError::MessageTooLarge {
                len: plaintext.len(),
                max: MAX_PLAINTEXT_SIZE,
            });
        }

        let mut actions = Vec::with_capacity(self.peers.len());
        for (peer_id, entry) in self.peers.iter() {
            let sealed = seal(entry.session_key(), plaintext, &self.env)
                .map_err(|e| ClientError::from_seal(peer_id.clone(), e))?;

            actions.push(ClientAction::Send(ClientMessage::SendFrame {
                room: self.room.clone(),
                to: peer_id.clone(),
                frame: BASE64.encode(sealed.to_bytes()),
            }));
        }

        tracing::debug!(recipients = actions.len(), len = plaintext.len(), "message sealed");
        Ok(actions)
    }

    fn handle_close(&mut self) -> Vec<ClientAction> {
        let was_joined = self.is_joined();
        self.peers.clear();
        // StaticSecret zeroizes on drop.
        drop(self.identity.take());
        self.state = SessionState::Closed;
        tracing::info!(room = %self.room, "session closed");

        if was_joined {
            vec![ClientAction::Send(ClientMessage::Leave { room: self.room.clone() })]
        } else {
            vec![]
        }
    }

    fn announce(&self) -> Result<ClientAction, ClientError> {
        let public_key = self.public_key().ok_or(ClientError::Closed)?;

        Ok(ClientAction::Send(ClientMessage::AnnouncePublicKey {
            room: self.room.clone(),
            public_key: BASE64.encode(public_key.as_bytes()),
        }))
    }

    fn ensure_joined(&self) -> Result<(), ClientError> {
        if self.is_joined() { Ok(()) } else { Err(ClientError::NotJoined) }
    }
}

fn decode_base64(peer_id: &PeerId, data: &str) -> Result<Vec<u8>, ClientError> {
    BASE64.decode(data).map_err(|e| ClientError::InvalidEncoding {
        peer_id: peer_id.clone(),
        reason: e.to_string(),
    })
}
