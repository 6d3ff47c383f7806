//! Model-based properties of relay routing.
//!
//! A fixed set of connections performs random joins, announcements, frames,
//! leaves and disconnects. After each step the deliveries are compared with
//! what a plain membership map says should happen.

#![allow(clippy::unwrap_used)]

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
    time::Instant,
};

use murmur_core::Environment;
use murmur_crypto::{ChaChaEntropy, CryptoError, EntropySource};
use murmur_proto::{ClientMessage, PeerId, ServerMessage};
use murmur_relay::{RoomAction, RoomError, RoomManager};
use proptest::prelude::*;

const CONNECTIONS: usize = 4;
const ROOMS: [&str; 2] = ["a", "b"];

#[derive(Clone)]
struct TestEnv(Arc<ChaChaEntropy>);

impl EntropySource for TestEnv {
    fn try_fill(&self, buffer: &mut [u8]) -> Result<(), CryptoError> {
        self.0.try_fill(buffer)
    }
}

impl Environment for TestEnv {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Clone)]
enum Step {
    Join { conn: usize, room: usize },
    Announce { conn: usize },
    Frame { conn: usize, to: usize },
    Leave { conn: usize },
    Disconnect { conn: usize },
}

fn step_strategy() -> impl Strategy<Value = Step> {
    let conn = 0..CONNECTIONS;
    prop_oneof![
        3 => (conn.clone(), 0..ROOMS.len()).prop_map(|(conn, room)| Step::Join { conn, room }),
        2 => conn.clone().prop_map(|conn| Step::Announce { conn }),
        3 => (conn.clone(), 0..CONNECTIONS).prop_map(|(conn, to)| Step::Frame { conn, to }),
        1 => conn.clone().prop_map(|conn| Step::Leave { conn }),
        1 => conn.prop_map(|conn| Step::Disconnect { conn }),
    ]
}

/// Connection states the relay should agree with.
#[derive(Default)]
struct Model {
    closed: BTreeSet<usize>,
    rooms: BTreeMap<usize, usize>,
}

impl Model {
    fn others(&self, conn: usize) -> BTreeSet<usize> {
        let Some(room) = self.rooms.get(&conn) else {
            return BTreeSet::new();
        };
        self.rooms.iter().filter(|(c, r)| **c != conn && *r == room).map(|(c, _)| *c).collect()
    }
}

/// Recipient indices and messages, sorted by recipient.
fn delivered(ids: &[PeerId], actions: Vec<RoomAction>) -> Vec<(usize, ServerMessage)> {
    let mut out: Vec<_> = actions
        .into_iter()
        .map(|RoomAction::Deliver { to, message }| {
            (ids.iter().position(|id| *id == to).unwrap(), message)
        })
        .collect();
    out.sort_by_key(|(to, _)| *to);
    out
}

fn is_refusal(deliveries: &[(usize, ServerMessage)], conn: usize) -> bool {
    matches!(deliveries, [(to, ServerMessage::Error { .. })] if *to == conn)
}

proptest! {
    #[test]
    fn routing_matches_membership(
        seed in any::<u64>(),
        steps in proptest::collection::vec(step_strategy(), 1..40),
    ) {
        let mut manager =
            RoomManager::new(TestEnv(Arc::new(ChaChaEntropy::seed_from_u64(seed))), CONNECTIONS);
        let ids: Vec<PeerId> = (0..CONNECTIONS).map(|_| manager.connect().unwrap()).collect();
        let mut model = Model::default();

        for step in steps {
            let conn = match step {
                Step::Join { conn, .. }
                | Step::Announce { conn }
                | Step::Frame { conn, .. }
                | Step::Leave { conn }
                | Step::Disconnect { conn } => conn,
            };
            let room_of = |model: &Model| ROOMS[model.rooms.get(&conn).copied().unwrap_or(0)];

            if let Step::Disconnect { .. } = step {
                let expected = model.others(conn);
                let deliveries = delivered(&ids, manager.disconnect(&ids[conn]));

                let recipients: BTreeSet<usize> = deliveries.iter().map(|(to, _)| *to).collect();
                let expected =
                    if model.closed.contains(&conn) { BTreeSet::new() } else { expected };
                prop_assert_eq!(recipients, expected);
                for (_, message) in &deliveries {
                    let is_left = matches!(
                        message,
                        ServerMessage::PeerLeft { peer_id } if *peer_id == ids[conn]
                    );
                    prop_assert!(is_left);
                }

                model.closed.insert(conn);
                model.rooms.remove(&conn);
                continue;
            }

            let message = match step {
                Step::Join { room, .. } => {
                    ClientMessage::Join { room: ROOMS[room].to_string(), name: None }
                },
                Step::Announce { .. } => ClientMessage::AnnouncePublicKey {
                    room: room_of(&model).to_string(),
                    public_key: format!("key-{conn}"),
                },
                Step::Frame { to, .. } => ClientMessage::SendFrame {
                    room: room_of(&model).to_string(),
                    to: ids[to].clone(),
                    frame: format!("frame-{conn}"),
                },
                Step::Leave { .. } => ClientMessage::Leave { room: room_of(&model).to_string() },
                Step::Disconnect { .. } => unreachable!(),
            };

            let result = manager.handle(&ids[conn], message);
            if model.closed.contains(&conn) {
                prop_assert_eq!(result, Err(RoomError::UnknownConnection(ids[conn].clone())));
                continue;
            }
            let deliveries = delivered(&ids, result.unwrap());
            let joined = model.rooms.contains_key(&conn);

            match step {
                Step::Join { room, .. } => {
                    if joined {
                        prop_assert!(is_refusal(&deliveries, conn));
                    } else {
                        model.rooms.insert(conn, room);
                        let mut expected = model.others(conn);
                        expected.insert(conn);
                        let recipients: BTreeSet<usize> =
                            deliveries.iter().map(|(to, _)| *to).collect();
                        prop_assert_eq!(recipients, expected);
                    }
                },
                Step::Announce { .. } => {
                    if joined {
                        let recipients: BTreeSet<usize> =
                            deliveries.iter().map(|(to, _)| *to).collect();
                        prop_assert_eq!(recipients, model.others(conn));
                    } else {
                        prop_assert!(is_refusal(&deliveries, conn));
                    }
                },
                Step::Frame { to, .. } => {
                    if joined && model.others(conn).contains(&to) {
                        prop_assert_eq!(deliveries.len(), 1);
                        prop_assert_eq!(deliveries[0].0, to);
                        let is_frame = matches!(
                            &deliveries[0].1,
                            ServerMessage::FrameReceived { from, .. } if *from == ids[conn]
                        );
                        prop_assert!(is_frame);
                    } else {
                        prop_assert!(is_refusal(&deliveries, conn));
                    }
                },
                Step::Leave { .. } => {
                    if joined {
                        let expected = model.others(conn);
                        model.rooms.remove(&conn);
                        let recipients: BTreeSet<usize> =
                            deliveries.iter().map(|(to, _)| *to).collect();
                        prop_assert_eq!(recipients, expected);
                    } else {
                        prop_assert!(is_refusal(&deliveries, conn));
                    }
                },
                Step::Disconnect { .. } => unreachable!(),
            }
        }

        for (index, room) in ROOMS.iter().enumerate() {
            let expected: BTreeSet<PeerId> = model
                .rooms
                .iter()
                .filter(|(_, r)| **r == index)
                .map(|(c, _)| ids[*c].clone())
                .collect();
            let actual: BTreeSet<PeerId> = manager.members(room).into_iter().collect();
            prop_assert_eq!(actual, expected);
        }
    }
}
