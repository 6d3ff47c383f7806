//! Peer table error types.

use murmur_crypto::CryptoError;
use murmur_proto::PeerId;
use thiserror::Error;

/// Errors from peer table updates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeerTableError {
    /// The announced key was rejected; the table is unchanged.
    #[error("invalid peer key: {0}")]
    InvalidKey(#[from] CryptoError),

    /// The peer left this session and cannot be re-keyed.
    #[error("peer {peer_id} has left the session")]
    Removed {
        /// The departed peer.
        peer_id: PeerId,
    },
}
