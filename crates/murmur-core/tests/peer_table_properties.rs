//! Model-based properties of the peer key table.

#![allow(clippy::unwrap_used)]

use std::collections::{BTreeMap, BTreeSet};

use murmur_core::{PeerTable, PeerTableError};
use murmur_crypto::{ChaChaEntropy, IdentityKeyPair, derive_session_key};
use murmur_proto::PeerId;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Announce { peer: u8, key: u8 },
    Leave { peer: u8 },
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0u8..4, 0u8..3).prop_map(|(peer, key)| Op::Announce { peer, key }),
        1 => (0u8..4).prop_map(|peer| Op::Leave { peer }),
    ]
}

proptest! {
    #[test]
    fn table_matches_model(
        seed in any::<u64>(),
        ops in proptest::collection::vec(arb_op(), 0..40),
    ) {
        let entropy = ChaChaEntropy::seed_from_u64(seed);
        let me = IdentityKeyPair::generate(&entropy).unwrap();
        let keys: Vec<IdentityKeyPair> =
            (0..3).map(|_| IdentityKeyPair::generate(&entropy).unwrap()).collect();

        let mut table = PeerTable::new();
        let mut known: BTreeMap<u8, u8> = BTreeMap::new();
        let mut removed: BTreeSet<u8> = BTreeSet::new();

        for op in ops {
            match op {
                Op::Announce { peer, key } => {
                    let id = PeerId::new(format!("peer-{peer}"));
                    let result = table.on_announce(id, *keys[key as usize].public_key(), &me);
                    if removed.contains(&peer) {
                        let is_removed = matches!(result, Err(PeerTableError::Removed { .. }));
                        prop_assert!(is_removed);
                    } else {
                        prop_assert!(result.is_ok());
                        known.insert(peer, key);
                    }
                },
                Op::Leave { peer } => {
                    let had = table.on_leave(&PeerId::new(format!("peer-{peer}")));
                    prop_assert_eq!(had, known.remove(&peer).is_some());
                    removed.insert(peer);
                },
            }
        }

        prop_assert_eq!(table.len(), known.len());
        for (peer, key) in &known {
            let entry = table.get(&PeerId::new(format!("peer-{peer}"))).unwrap();
            let expected = derive_session_key(&me, keys[*key as usize].public_key()).unwrap();
            prop_assert_eq!(entry.public_key(), keys[*key as usize].public_key());
            prop_assert_eq!(entry.session_key(), &expected);
        }
        for peer in &removed {
            let id = PeerId::new(format!("peer-{peer}"));
            prop_assert!(table.is_removed(&id));
        }
    }
}
