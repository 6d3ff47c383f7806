//! Murmur Client
//!
//! Action-based session state machine for one participant in a relay room.
//!
//! # Architecture
//!
//! The client is a pure state machine that:
//! - Receives events from the caller (relay messages, application sends)
//! - Produces actions for the caller to execute (packets to push to the
//!   relay, plaintext to show the user)
//! - Uses the [`Environment`] trait for randomness, so a seeded environment
//!   replays a session exactly
//!
//! With the `transport` feature, [`transport::Session`] drives a client over
//! a TCP connection to the relay from a single tokio task.
//!
//! # Components
//!
//! - [`Client`]: owns the identity key pair and the peer key table
//! - [`ClientEvent`]: events fed into the client
//! - [`ClientAction`]: actions produced by the client
//! - [`ClientConfig`]: relay address, room and display name

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod client;
mod config;
mod error;
mod event;
#[cfg(feature = "transport")]
pub mod transport;

pub use client::{Client, MAX_PLAINTEXT_SIZE};
pub use config::ClientConfig;
pub use error::ClientError;
pub use event::{ClientAction, ClientEvent};
pub use murmur_core::{Environment, SystemEnv};
pub use murmur_proto::PeerId;
