//! Fuzz target for the [`Client`] state machine
//!
//! A hostile relay controls every event the client sees.
//!
//! # Strategy
//!
//! - Event sequences: arbitrary interleavings of welcomes, joins, keys,
//!   frames, leaves, sends and close
//! - Key material: valid-length garbage, wrong lengths and non-base64 text
//! - Identity reuse: four peer ids so announcements, frames and leaves
//!   collide on the same peer
//!
//! # Invariants
//!
//! - NEVER panic on any event sequence from a hostile relay
//! - Only `RandomnessUnavailable` and `Closed` are fatal
//! - No event is accepted after `Close`
//! - Outgoing frames are only addressed to keyed peers

#![no_main]

use std::{sync::Arc, time::Instant};

use arbitrary::Arbitrary;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use libfuzzer_sys::fuzz_target;
use murmur_client::{Client, ClientAction, ClientError, ClientEvent, Environment, PeerId};
use murmur_crypto::{ChaChaEntropy, CryptoError, EntropySource};
use murmur_proto::ClientMessage;

#[derive(Clone)]
struct FuzzEnv(Arc<ChaChaEntropy>);

impl EntropySource for FuzzEnv {
    fn try_fill(&self, buffer: &mut [u8]) -> Result<(), CryptoError> {
        self.0.try_fill(buffer)
    }
}

impl Environment for FuzzEnv {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Arbitrary)]
enum FuzzEvent {
    Connected,
    Welcome { peer: u8 },
    PeerJoined { peer: u8 },
    PublicKey { peer: u8, key: Vec<u8> },
    RawPublicKey { peer: u8, text: String },
    Frame { peer: u8, frame: Vec<u8> },
    PeerLeft { peer: u8 },
    Send { plaintext: Vec<u8> },
    Close,
}

fn peer(id: u8) -> PeerId {
    PeerId::new(format!("peer-{}", id % 4))
}

fuzz_target!(|input: (u64, Vec<FuzzEvent>)| {
    let (seed, events) = input;
    let env = FuzzEnv(Arc::new(ChaChaEntropy::seed_from_u64(seed)));
    let mut client = Client::new(env, "fuzz", None).unwrap();

    for event in events {
        let was_closed = client.is_closed();
        let event = match event {
            FuzzEvent::Connected => ClientEvent::Connected,
            FuzzEvent::Welcome { peer: p } => {
                ClientEvent::Welcome { peer_id: peer(p), room: "fuzz".to_string() }
            },
            FuzzEvent::PeerJoined { peer: p } => {
                ClientEvent::PeerJoined { peer_id: peer(p), name: String::new() }
            },
            FuzzEvent::PublicKey { peer: p, key } => {
                ClientEvent::PublicKeyReceived { from: peer(p), public_key: BASE64.encode(key) }
            },
            FuzzEvent::RawPublicKey { peer: p, text } => {
                ClientEvent::PublicKeyReceived { from: peer(p), public_key: text }
            },
            FuzzEvent::Frame { peer: p, frame } => {
                ClientEvent::FrameReceived { from: peer(p), frame: BASE64.encode(frame) }
            },
            FuzzEvent::PeerLeft { peer: p } => ClientEvent::PeerLeft { peer_id: peer(p) },
            FuzzEvent::Send { plaintext } => ClientEvent::SendMessage { plaintext },
            FuzzEvent::Close => ClientEvent::Close,
        };

        match client.handle(event) {
            Ok(actions) => {
                assert!(!was_closed);
                for action in actions {
                    if let ClientAction::Send(ClientMessage::SendFrame { to, .. }) = action {
                        assert!(client.peers().get(&to).is_some());
                    }
                }
            },
            Err(ClientError::Closed) => assert!(was_closed),
            Err(e) => assert!(!e.is_fatal(), "unexpected fatal error {e:?}"),
        }
    }
});
