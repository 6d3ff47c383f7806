//! Protocol error types.

use thiserror::Error;

/// Errors from packet encoding and decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Packet does not start with the protocol magic.
    #[error("bad magic: {found:02x?}")]
    BadMagic {
        /// The two bytes found instead.
        found: [u8; 2],
    },

    /// Packet was produced by an unsupported protocol version.
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),

    /// Kind byte does not name a known message family.
    #[error("unknown packet kind {0}")]
    UnknownKind(u8),

    /// Packet carries a different message family than expected.
    #[error("packet kind mismatch: expected {expected:?}, got {actual:?}")]
    KindMismatch {
        /// Family the reader expected.
        expected: crate::PacketKind,
        /// Family found in the header.
        actual: crate::PacketKind,
    },

    /// Declared or actual payload exceeds the limit.
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Payload size.
        size: usize,
        /// Configured limit.
        max: usize,
    },

    /// Fewer bytes than the header declares.
    #[error("truncated packet: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Bytes required.
        expected: usize,
        /// Bytes available.
        actual: usize,
    },

    /// CBOR serialization failed.
    #[error("encode failed: {0}")]
    Encode(String),

    /// CBOR deserialization failed.
    #[error("decode failed: {0}")]
    Decode(String),
}
