//! Room Manager tests

#![allow(clippy::unwrap_used)]

use std::{sync::Arc, time::Instant};

use murmur_core::Environment;
use murmur_crypto::{ChaChaEntropy, CryptoError, EntropySource};
use murmur_proto::{ClientMessage, PeerId, ServerMessage};
use murmur_relay::{RoomAction, RoomError, RoomManager};

// Test environment with seeded randomness
#[derive(Clone)]
struct TestEnv {
    entropy: Arc<ChaChaEntropy>,
}

impl EntropySource for TestEnv {
    fn try_fill(&self, buffer: &mut [u8]) -> Result<(), CryptoError> {
        self.entropy.try_fill(buffer)
    }
}

impl Environment for TestEnv {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

fn manager() -> RoomManager<TestEnv> {
    RoomManager::new(TestEnv { entropy: Arc::new(ChaChaEntropy::seed_from_u64(7)) }, 16)
}

fn join(manager: &mut RoomManager<TestEnv>, room: &str, name: Option<&str>) -> PeerId {
    let peer_id = manager.connect().unwrap();
    manager
        .handle(&peer_id, ClientMessage::Join {
            room: room.to_string(),
            name: name.map(str::to_string),
        })
        .unwrap();
    peer_id
}

fn deliveries(actions: &[RoomAction]) -> Vec<(&PeerId, &ServerMessage)> {
    actions
        .iter()
        .map(|action| match action {
            RoomAction::Deliver { to, message } => (to, message),
        })
        .collect()
}

#[test]
fn connect_issues_distinct_ids() {
    let mut manager = manager();

    let a = manager.connect().unwrap();
    let b = manager.connect().unwrap();

    assert_ne!(a, b);
    assert_eq!(a.as_str().len(), 32);
    assert_eq!(manager.connection_count(), 2);
}

#[test]
fn connection_limit_is_enforced() {
    let env = TestEnv { entropy: Arc::new(ChaChaEntropy::seed_from_u64(1)) };
    let mut manager = RoomManager::new(env, 1);

    manager.connect().unwrap();
    let result = manager.connect();

    assert_eq!(result, Err(RoomError::ConnectionLimit { max: 1 }));
}

#[test]
fn join_welcomes_and_notifies_members() {
    let mut manager = manager();
    let alice = join(&mut manager, "demo", Some("alice"));

    let bob = manager.connect().unwrap();
    let actions = manager
        .handle(&bob, ClientMessage::Join { room: "demo".to_string(), name: Some("bob".into()) })
        .unwrap();

    assert_eq!(
        deliveries(&actions),
        vec![
            (&bob, &ServerMessage::Welcome { peer_id: bob.clone(), room: "demo".to_string() }),
            (&alice, &ServerMessage::PeerJoined { peer_id: bob.clone(), name: "bob".to_string() }),
        ]
    );
    assert_eq!(manager.members("demo").len(), 2);
}

#[test]
fn missing_name_defaults_to_id_prefix() {
    let mut manager = manager();
    let alice = join(&mut manager, "demo", None);
    let bob = join(&mut manager, "demo", Some("  "));

    let expected = format!("user-{}", &alice.as_str()[..5]);
    assert_eq!(manager.membership(&alice).unwrap().name, expected);
    assert!(manager.membership(&bob).unwrap().name.starts_with("user-"));
}

#[test]
fn join_twice_is_refused() {
    let mut manager = manager();
    let alice = join(&mut manager, "demo", None);

    let actions = manager
        .handle(&alice, ClientMessage::Join { room: "other".to_string(), name: None })
        .unwrap();

    assert!(matches!(
        deliveries(&actions).as_slice(),
        [(to, ServerMessage::Error { .. })] if *to == &alice
    ));
    assert_eq!(manager.membership(&alice).unwrap().room, "demo");
}

#[test]
fn announcement_reaches_every_other_member() {
    let mut manager = manager();
    let alice = join(&mut manager, "demo", None);
    let bob = join(&mut manager, "demo", None);
    let carol = join(&mut manager, "demo", None);
    let outsider = join(&mut manager, "elsewhere", None);

    let actions = manager
        .handle(&alice, ClientMessage::AnnouncePublicKey {
            room: "demo".to_string(),
            public_key: "KEY".to_string(),
        })
        .unwrap();

    let recipients: Vec<_> = deliveries(&actions).into_iter().map(|(to, _)| to.clone()).collect();
    assert_eq!(recipients.len(), 2);
    assert!(recipients.contains(&bob));
    assert!(recipients.contains(&carol));
    assert!(!recipients.contains(&alice));
    assert!(!recipients.contains(&outsider));

    for (_, message) in deliveries(&actions) {
        assert_eq!(
            message,
            &ServerMessage::PublicKeyReceived { from: alice.clone(), public_key: "KEY".to_string() }
        );
    }
}

#[test]
fn frame_reaches_only_its_addressee() {
    let mut manager = manager();
    let alice = join(&mut manager, "demo", None);
    let bob = join(&mut manager, "demo", None);
    let _carol = join(&mut manager, "demo", None);

    let actions = manager
        .handle(&alice, ClientMessage::SendFrame {
            room: "demo".to_string(),
            to: bob.clone(),
            frame: "FRAME".to_string(),
        })
        .unwrap();

    assert_eq!(
        deliveries(&actions),
        vec![(&bob, &ServerMessage::FrameReceived { from: alice, frame: "FRAME".to_string() })]
    );
}

#[test]
fn frame_to_other_room_is_refused() {
    let mut manager = manager();
    let alice = join(&mut manager, "demo", None);
    let outsider = join(&mut manager, "elsewhere", None);

    let actions = manager
        .handle(&alice, ClientMessage::SendFrame {
            room: "demo".to_string(),
            to: outsider,
            frame: "FRAME".to_string(),
        })
        .unwrap();

    assert!(matches!(
        deliveries(&actions).as_slice(),
        [(to, ServerMessage::Error { .. })] if *to == &alice
    ));
}

#[test]
fn messages_before_join_are_refused() {
    let mut manager = manager();
    let peer = manager.connect().unwrap();

    let actions = manager
        .handle(&peer, ClientMessage::AnnouncePublicKey {
            room: "demo".to_string(),
            public_key: "KEY".to_string(),
        })
        .unwrap();

    assert_eq!(
        deliveries(&actions),
        vec![(&peer, &ServerMessage::Error { reason: RoomError::NotJoined.to_string() })]
    );
}

#[test]
fn room_mismatch_is_refused() {
    let mut manager = manager();
    let alice = join(&mut manager, "demo", None);

    let actions = manager
        .handle(&alice, ClientMessage::Leave { room: "other".to_string() })
        .unwrap();

    let expected = RoomError::RoomMismatch { joined: "demo".into(), requested: "other".into() };
    assert_eq!(
        deliveries(&actions),
        vec![(&alice, &ServerMessage::Error { reason: expected.to_string() })]
    );
    assert!(manager.membership(&alice).is_some());
}

#[test]
fn leave_notifies_remaining_members() {
    let mut manager = manager();
    let alice = join(&mut manager, "demo", None);
    let bob = join(&mut manager, "demo", None);

    let actions =
        manager.handle(&alice, ClientMessage::Leave { room: "demo".to_string() }).unwrap();

    assert_eq!(
        deliveries(&actions),
        vec![(&bob, &ServerMessage::PeerLeft { peer_id: alice.clone() })]
    );
    assert!(manager.membership(&alice).is_none());
    assert_eq!(manager.members("demo"), vec![bob]);
}

#[test]
fn disconnect_notifies_room() {
    let mut manager = manager();
    let alice = join(&mut manager, "demo", None);
    let bob = join(&mut manager, "demo", None);

    let actions = manager.disconnect(&bob);

    assert_eq!(deliveries(&actions), vec![(&alice, &ServerMessage::PeerLeft { peer_id: bob })]);
}

#[test]
fn disconnect_of_last_member_empties_room() {
    let mut manager = manager();
    let alice = join(&mut manager, "demo", None);

    let actions = manager.disconnect(&alice);

    assert!(actions.is_empty());
    assert_eq!(manager.room_count(), 0);
    assert_eq!(manager.connection_count(), 0);
    assert!(manager.disconnect(&alice).is_empty());
}

#[test]
fn unknown_connection_is_an_error() {
    let mut manager = manager();

    let result =
        manager.handle(&PeerId::new("ghost"), ClientMessage::Leave { room: "demo".to_string() });

    assert_eq!(result, Err(RoomError::UnknownConnection(PeerId::new("ghost"))));
}
