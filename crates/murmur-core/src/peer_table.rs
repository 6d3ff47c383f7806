//! Peer Key Table
//!
//! Maps each peer in the session to its announced public key and the session
//! key derived from it.
//!
//! # Lifecycle
//!
//! ```text
//! Unknown --announce--> Known --announce--> Known (re-derived)
//!    |                    |
//!    +------leave---------+--> Removed (terminal)
//! ```
//!
//! The session key is derived before anything is written, so a rejected key
//! leaves the table exactly as it was. Removed ids are remembered for the
//! rest of the session: a late announcement cannot bring a departed peer back.

use std::collections::{BTreeMap, BTreeSet};

use murmur_crypto::{IdentityKeyPair, PublicKey, SessionKey, derive_session_key};
use murmur_proto::PeerId;

use crate::error::PeerTableError;

/// Keys held for one known peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerEntry {
    public_key: PublicKey,
    session_key: SessionKey,
}

impl PeerEntry {
    /// The peer's announced public key.
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Session key shared with the peer.
    pub fn session_key(&self) -> &SessionKey {
        &self.session_key
    }
}

/// Outcome of applying an announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStatus {
    /// First key seen for this peer.
    New,
    /// The peer announced a different key; the session key was replaced.
    Rotated,
    /// The peer re-announced the key already held.
    Unchanged,
}

/// Per-session peer key table.
#[derive(Debug, Default)]
pub struct PeerTable {
    peers: BTreeMap<PeerId, PeerEntry>,
    removed: BTreeSet<PeerId>,
}

impl PeerTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a public key announcement from `peer_id`.
    ///
    /// Derives the session key against `identity` and stores it, overwriting
    /// any previous entry for the peer.
    ///
    /// # Errors
    ///
    /// - `PeerTableError::Removed` if the peer already left
    /// - `PeerTableError::InvalidKey` if derivation rejects the key
    ///
    /// On error the table is unchanged.
    pub fn on_announce(
        &mut self,
        peer_id: PeerId,
        public_key: PublicKey,
        identity: &IdentityKeyPair,
    ) -> Result<KeyStatus, PeerTableError> {
        if self.removed.contains(&peer_id) {
            return Err(PeerTableError::Removed { peer_id });
        }

        let session_key = derive_session_key(identity, &public_key)?;
        let entry = PeerEntry { public_key, session_key };

        let status = match self.peers.insert(peer_id, entry) {
            None => KeyStatus::New,
            Some(old) if old.public_key == public_key => KeyStatus::Unchanged,
            Some(_) => KeyStatus::Rotated,
        };

        Ok(status)
    }

    /// Forget `peer_id` for the rest of the session.
    ///
    /// Returns true if the peer had a key entry.
    pub fn on_leave(&mut self, peer_id: &PeerId) -> bool {
        self.removed.insert(peer_id.clone());
        self.peers.remove(peer_id).is_some()
    }

    /// Entry for `peer_id`, if the peer is known.
    pub fn get(&self, peer_id: &PeerId) -> Option<&PeerEntry> {
        self.peers.get(peer_id)
    }

    /// Visit every known peer in peer id order.
    pub fn for_each_peer(&self, mut f: impl FnMut(&PeerId, &PeerEntry)) {
        for (peer_id, entry) in self.iter() {
            f(peer_id, entry);
        }
    }

    /// Known peers and their entries in peer id order.
    pub fn iter(&self) -> impl Iterator<Item = (&PeerId, &PeerEntry)> {
        self.peers.iter()
    }

    /// Known peer ids in order.
    pub fn peer_ids(&self) -> impl Iterator<Item = &PeerId> {
        self.peers.keys()
    }

    /// Number of known peers.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// True if no peer is known.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// True if `peer_id` left this session.
    pub fn is_removed(&self, peer_id: &PeerId) -> bool {
        self.removed.contains(peer_id)
    }

    /// Drop every entry and every removal marker.
    ///
    /// Session keys are zeroized as their entries drop.
    pub fn clear(&mut self) {
        self.peers.clear();
        self.removed.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use murmur_crypto::{ChaChaEntropy, CryptoError};

    use super::*;

    fn keypair(entropy: &ChaChaEntropy) -> IdentityKeyPair {
        IdentityKeyPair::generate(entropy).unwrap()
    }

    #[test]
    fn announce_creates_entry() {
        let entropy = ChaChaEntropy::seed_from_u64(1);
        let me = keypair(&entropy);
        let bob = keypair(&entropy);

        let mut table = PeerTable::new();
        let status = table.on_announce(PeerId::new("bob"), *bob.public_key(), &me).unwrap();

        assert_eq!(status, KeyStatus::New);
        assert_eq!(table.len(), 1);

        let entry = table.get(&PeerId::new("bob")).unwrap();
        assert_eq!(entry.public_key(), bob.public_key());
        assert_eq!(entry.session_key(), &derive_session_key(&me, bob.public_key()).unwrap());
    }

    #[test]
    fn reannounce_overwrites() {
        let entropy = ChaChaEntropy::seed_from_u64(2);
        let me = keypair(&entropy);
        let first = keypair(&entropy);
        let second = keypair(&entropy);
        let bob = PeerId::new("bob");

        let mut table = PeerTable::new();
        table.on_announce(bob.clone(), *first.public_key(), &me).unwrap();

        let same = table.on_announce(bob.clone(), *first.public_key(), &me).unwrap();
        assert_eq!(same, KeyStatus::Unchanged);

        let rotated = table.on_announce(bob.clone(), *second.public_key(), &me).unwrap();
        assert_eq!(rotated, KeyStatus::Rotated);
        assert_eq!(table.get(&bob).unwrap().public_key(), second.public_key());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn rejected_key_leaves_table_untouched() {
        let entropy = ChaChaEntropy::seed_from_u64(3);
        let me = keypair(&entropy);
        let bob_key = keypair(&entropy);
        let bob = PeerId::new("bob");

        let mut table = PeerTable::new();
        table.on_announce(bob.clone(), *bob_key.public_key(), &me).unwrap();

        let result = table.on_announce(bob.clone(), PublicKey::from_bytes([0u8; 32]), &me);

        assert!(matches!(result, Err(PeerTableError::InvalidKey(CryptoError::InvalidKey { .. }))));
        assert_eq!(table.get(&bob).unwrap().public_key(), bob_key.public_key());
    }

    #[test]
    fn rejected_first_key_creates_nothing() {
        let entropy = ChaChaEntropy::seed_from_u64(4);
        let me = keypair(&entropy);

        let mut table = PeerTable::new();
        let result = table.on_announce(PeerId::new("eve"), PublicKey::from_bytes([0u8; 32]), &me);

        assert!(result.is_err());
        assert!(table.is_empty());
    }

    #[test]
    fn leave_is_terminal() {
        let entropy = ChaChaEntropy::seed_from_u64(5);
        let me = keypair(&entropy);
        let bob_key = keypair(&entropy);
        let bob = PeerId::new("bob");

        let mut table = PeerTable::new();
        table.on_announce(bob.clone(), *bob_key.public_key(), &me).unwrap();

        assert!(table.on_leave(&bob));
        assert!(table.get(&bob).is_none());
        assert!(table.is_removed(&bob));

        let result = table.on_announce(bob.clone(), *bob_key.public_key(), &me);
        assert_eq!(result, Err(PeerTableError::Removed { peer_id: bob.clone() }));
        assert!(table.get(&bob).is_none());
    }

    #[test]
    fn leave_of_unknown_peer_still_blocks_rejoin() {
        let entropy = ChaChaEntropy::seed_from_u64(6);
        let me = keypair(&entropy);
        let carol_key = keypair(&entropy);
        let carol = PeerId::new("carol");

        let mut table = PeerTable::new();
        assert!(!table.on_leave(&carol));

        let result = table.on_announce(carol, *carol_key.public_key(), &me);
        assert!(matches!(result, Err(PeerTableError::Removed { .. })));
    }

    #[test]
    fn for_each_peer_visits_in_order() {
        let entropy = ChaChaEntropy::seed_from_u64(7);
        let me = keypair(&entropy);

        let mut table = PeerTable::new();
        for name in ["carol", "alice", "bob"] {
            let key = keypair(&entropy);
            table.on_announce(PeerId::new(name), *key.public_key(), &me).unwrap();
        }

        let mut seen = Vec::new();
        table.for_each_peer(|id, _| seen.push(id.as_str().to_string()));

        assert_eq!(seen, ["alice", "bob", "carol"]);
    }

    #[test]
    fn clear_forgets_everything() {
        let entropy = ChaChaEntropy::seed_from_u64(8);
        let me = keypair(&entropy);
        let bob_key = keypair(&entropy);

        let mut table = PeerTable::new();
        table.on_announce(PeerId::new("bob"), *bob_key.public_key(), &me).unwrap();
        table.on_leave(&PeerId::new("dave"));

        table.clear();

        assert!(table.is_empty());
        assert!(!table.is_removed(&PeerId::new("dave")));
    }
}
