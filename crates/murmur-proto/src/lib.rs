//! Murmur Relay Protocol
//!
//! Messages exchanged between participants and the untrusted relay, and their
//! packet encoding.
//!
//! The relay routes by room and peer id only. Key announcements and sealed
//! frames travel as base64 strings the relay never decodes; this crate treats
//! them as opaque.
//!
//! # Packet Layout
//!
//! ```text
//! +-------+---------+------+-------------+----------------+
//! | magic | version | kind | payload_len | CBOR payload   |
//! | "MR"  |   u8    |  u8  |  u32 (BE)   | payload_len B  |
//! +-------+---------+------+-------------+----------------+
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod messages;
pub mod packet;

pub use error::ProtocolError;
pub use messages::{ClientMessage, PeerId, ServerMessage};
pub use packet::{
    HEADER_SIZE, MAGIC, MAX_PAYLOAD_SIZE, PacketHeader, PacketKind, VERSION, WireMessage,
    decode_packet, encode_packet, try_decode_packet, try_decode_packet_with_limit,
};
