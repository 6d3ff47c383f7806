//! Murmur Session Core
//!
//! Shared building blocks for participants and the relay:
//!
//! - [`Environment`]: time and randomness behind a trait, so session logic
//!   runs unchanged in production and in deterministic simulation
//! - [`PeerTable`]: the per-session map from peer id to public key and
//!   derived session key

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod env;
pub mod error;
pub mod peer_table;

pub use env::{Environment, SystemEnv};
pub use error::PeerTableError;
pub use peer_table::{KeyStatus, PeerEntry, PeerTable};
