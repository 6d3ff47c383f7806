//! Simulated world - participants and relay in one process.
//!
//! Packets are queued, not delivered inline: the relay inbox drains first,
//! then each participant's inbox in index order. Per-connection FIFO order
//! matches a TCP relay.

use std::collections::VecDeque;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use murmur_client::{Client, ClientAction, ClientError, ClientEvent};
use murmur_proto::{
    ClientMessage, PeerId, ProtocolError, ServerMessage, decode_packet, encode_packet,
};
use murmur_relay::{RoomAction, RoomError, RoomManager};
use thiserror::Error;

use crate::sim_env::SimEnv;

/// Connection limit for the simulated relay.
const MAX_CONNECTIONS: usize = 1024;

/// Errors that abort a simulation step.
#[derive(Debug, Error)]
pub enum WorldError {
    /// A client call failed.
    #[error("client error: {0}")]
    Client(#[from] ClientError),

    /// The relay refused a connection.
    #[error("relay error: {0}")]
    Room(#[from] RoomError),

    /// A queued packet could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// No participant with this index.
    #[error("no participant {0}")]
    UnknownParticipant(usize),
}

/// A message a participant decrypted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Sending peer.
    pub from: PeerId,
    /// Decrypted bytes.
    pub plaintext: Vec<u8>,
}

/// One simulated participant.
pub struct Participant {
    name: String,
    client: Client<SimEnv>,
    /// Relay-issued id; also the relay-side connection id.
    peer_id: PeerId,
    connected: bool,
    inbox: VecDeque<Vec<u8>>,
    delivered: Vec<Delivery>,
    errors: Vec<ClientError>,
    rejections: Vec<String>,
}

impl Participant {
    /// Display name given at join.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The participant's state machine.
    pub fn client(&self) -> &Client<SimEnv> {
        &self.client
    }

    /// Relay-issued id, kept after the session closes.
    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    /// Messages decrypted so far, in arrival order.
    pub fn delivered(&self) -> &[Delivery] {
        &self.delivered
    }

    /// Client errors raised while processing relay messages.
    pub fn errors(&self) -> &[ClientError] {
        &self.errors
    }

    /// Relay refusals received.
    pub fn rejections(&self) -> &[String] {
        &self.rejections
    }

    /// True while connected to the relay.
    pub fn is_connected(&self) -> bool {
        self.connected
    }
}

/// Participants and relay wired through in-memory packet queues.
pub struct SimWorld {
    env: SimEnv,
    room: String,
    relay: RoomManager<SimEnv>,
    participants: Vec<Participant>,
    to_relay: VecDeque<(PeerId, Vec<u8>)>,
    tamper_frames: bool,
}

impl SimWorld {
    /// Empty world for `room`, seeded by `seed`.
    pub fn new(seed: u64, room: impl Into<String>) -> Self {
        let env = SimEnv::with_seed(seed);
        let relay = RoomManager::new(env.clone(), MAX_CONNECTIONS);

        Self {
            env,
            room: room.into(),
            relay,
            participants: Vec::new(),
            to_relay: VecDeque::new(),
            tamper_frames: false,
        }
    }

    /// The shared environment.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// The relay's room manager.
    pub fn relay(&self) -> &RoomManager<SimEnv> {
        &self.relay
    }

    /// Participant by index.
    pub fn participant(&self, index: usize) -> Option<&Participant> {
        self.participants.get(index)
    }

    /// Number of participants ever added.
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    /// True if no participant was ever added.
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Index of the participant holding `peer_id`.
    pub fn index_of(&self, peer_id: &PeerId) -> Option<usize> {
        self.participants.iter().position(|p| &p.peer_id == peer_id)
    }

    /// Make the relay flip one ciphertext bit in every frame it forwards.
    pub fn set_tamper_frames(&mut self, tamper: bool) {
        self.tamper_frames = tamper;
    }

    /// Connect a new participant and start its join. Returns its index.
    ///
    /// The join completes on the next [`SimWorld::run_until_quiet`].
    pub fn join(&mut self, name: &str) -> Result<usize, WorldError> {
        let client = Client::new(self.env.clone(), self.room.clone(), Some(name.to_string()))?;
        let peer_id = self.relay.connect()?;

        let index = self.participants.len();
        self.participants.push(Participant {
            name: name.to_string(),
            client,
            peer_id,
            connected: true,
            inbox: VecDeque::new(),
            delivered: Vec::new(),
            errors: Vec::new(),
            rejections: Vec::new(),
        });

        self.apply(index, ClientEvent::Connected)?;
        Ok(index)
    }

    /// Queue `plaintext` from participant `index` to every keyed peer.
    pub fn send(&mut self, index: usize, plaintext: &[u8]) -> Result<(), WorldError> {
        self.apply(index, ClientEvent::SendMessage { plaintext: plaintext.to_vec() })
    }

    /// Close participant `index` gracefully: leave the room, then hang up.
    pub fn leave(&mut self, index: usize) -> Result<(), WorldError> {
        self.apply(index, ClientEvent::Close)?;
        self.run_until_quiet()?;
        self.hang_up(index)
    }

    /// Drop participant `index`'s connection without a leave message.
    pub fn disconnect(&mut self, index: usize) -> Result<(), WorldError> {
        self.hang_up(index)?;
        let participant = self.participant_mut(index)?;
        if !participant.client.is_closed() {
            // The connection is gone, so the Leave the client emits goes nowhere.
            participant.client.handle(ClientEvent::Close)?;
        }
        Ok(())
    }

    /// Deliver queued packets until every queue is empty.
    pub fn run_until_quiet(&mut self) -> Result<(), WorldError> {
        while self.step()? {}
        Ok(())
    }

    /// Deliver one queued packet. Returns false when nothing was pending.
    pub fn step(&mut self) -> Result<bool, WorldError> {
        if let Some((from, packet)) = self.to_relay.pop_front() {
            self.relay_receive(&from, &packet)?;
            return Ok(true);
        }

        let next = self.participants.iter().position(|p| !p.inbox.is_empty());
        let Some(index) = next else {
            return Ok(false);
        };
        let Some(packet) = self.participants[index].inbox.pop_front() else {
            return Ok(false);
        };

        let message: ServerMessage = decode_packet(&packet)?;
        match ClientEvent::try_from(message) {
            Ok(event) => self.apply(index, event)?,
            Err(reason) => self.participants[index].rejections.push(reason),
        }

        Ok(true)
    }

    fn hang_up(&mut self, index: usize) -> Result<(), WorldError> {
        let participant = self.participant_mut(index)?;
        if !participant.connected {
            return Ok(());
        }
        participant.connected = false;
        let peer_id = participant.peer_id.clone();

        let actions = self.relay.disconnect(&peer_id);
        self.route_relay(actions)
    }

    /// Feed one event to a client and route what it produces.
    ///
    /// Per-peer client errors are recorded on the participant, not returned.
    fn apply(&mut self, index: usize, event: ClientEvent) -> Result<(), WorldError> {
        let Some(participant) = self.participants.get_mut(index) else {
            return Err(WorldError::UnknownParticipant(index));
        };

        let actions = match participant.client.handle(event) {
            Ok(actions) => actions,
            Err(e) => {
                tracing::debug!(participant = index, error = %e, "client error");
                participant.errors.push(e);
                return Ok(());
            },
        };

        for action in actions {
            match action {
                ClientAction::Send(message) => {
                    if participant.connected {
                        let mut packet = Vec::new();
                        encode_packet(&message, &mut packet)?;
                        self.to_relay.push_back((participant.peer_id.clone(), packet));
                    }
                },
                ClientAction::DeliverMessage { from, plaintext } => {
                    participant.delivered.push(Delivery { from, plaintext });
                },
                ClientAction::PeerJoined { .. }
                | ClientAction::PeerKeyed { .. }
                | ClientAction::PeerRemoved { .. } => {},
            }
        }

        Ok(())
    }

    fn relay_receive(&mut self, from: &PeerId, packet: &[u8]) -> Result<(), WorldError> {
        let message: ClientMessage = decode_packet(packet)?;

        match self.relay.handle(from, message) {
            Ok(actions) => self.route_relay(actions),
            // Packets still in flight from a connection that hung up.
            Err(RoomError::UnknownConnection(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn route_relay(&mut self, actions: Vec<RoomAction>) -> Result<(), WorldError> {
        for action in actions {
            let RoomAction::Deliver { to, mut message } = action;

            if self.tamper_frames {
                tamper(&mut message);
            }

            let recipient =
                self.participants.iter_mut().find(|p| p.connected && p.peer_id == to);
            if let Some(recipient) = recipient {
                let mut packet = Vec::new();
                encode_packet(&message, &mut packet)?;
                recipient.inbox.push_back(packet);
            }
        }

        Ok(())
    }

    fn participant_mut(&mut self, index: usize) -> Result<&mut Participant, WorldError> {
        self.participants.get_mut(index).ok_or(WorldError::UnknownParticipant(index))
    }
}

/// Flip the last ciphertext bit of a forwarded frame.
fn tamper(message: &mut ServerMessage) {
    if let ServerMessage::FrameReceived { frame, .. } = message {
        if let Ok(mut bytes) = BASE64.decode(frame.as_bytes()) {
            if let Some(last) = bytes.last_mut() {
                *last ^= 0x01;
            }
            *frame = BASE64.encode(bytes);
        }
    }
}
