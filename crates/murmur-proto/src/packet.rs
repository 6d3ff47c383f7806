//! Packet framing: fixed header plus CBOR payload.
//!
//! The header is read with zero-copy parsing so a stream reader can learn the
//! payload length before buffering the payload. Limits are checked before any
//! allocation sized by the peer.

use bytes::{Buf, BytesMut};
use serde::{Serialize, de::DeserializeOwned};
use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
    byteorder::{BigEndian, U32},
};

use crate::{
    error::ProtocolError,
    messages::{ClientMessage, ServerMessage},
};

/// Protocol magic, first two bytes of every packet.
pub const MAGIC: [u8; 2] = *b"MR";

/// Current protocol version.
pub const VERSION: u8 = 1;

/// Header size in bytes.
pub const HEADER_SIZE: usize = 8;

/// Largest accepted payload (64 KiB).
pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024;

/// Message family carried by a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketKind {
    /// [`ClientMessage`] (participant to relay).
    Client = 1,
    /// [`ServerMessage`] (relay to participant).
    Server = 2,
}

impl PacketKind {
    /// Parse a kind byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Client),
            2 => Some(Self::Server),
            _ => None,
        }
    }
}

/// Message types that can be framed into packets.
pub trait WireMessage: Serialize + DeserializeOwned {
    /// Family written into the header.
    const KIND: PacketKind;
}

impl WireMessage for ClientMessage {
    const KIND: PacketKind = PacketKind::Client;
}

impl WireMessage for ServerMessage {
    const KIND: PacketKind = PacketKind::Server;
}

/// Fixed 8-byte packet header.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned,
)]
#[repr(C)]
pub struct PacketHeader {
    magic: [u8; 2],
    version: u8,
    kind: u8,
    payload_len: U32<BigEndian>,
}

impl PacketHeader {
    /// Header for a payload of `payload_len` bytes.
    pub fn new(kind: PacketKind, payload_len: u32) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            kind: kind as u8,
            payload_len: U32::new(payload_len),
        }
    }

    /// Parse and validate the first [`HEADER_SIZE`] bytes of `bytes`.
    ///
    /// # Errors
    ///
    /// Truncated input, bad magic, unsupported version, unknown kind, or a
    /// declared payload larger than `max_payload`.
    pub fn parse(bytes: &[u8], max_payload: usize) -> Result<Self, ProtocolError> {
        let head = bytes.get(..HEADER_SIZE).ok_or(ProtocolError::Truncated {
            expected: HEADER_SIZE,
            actual: bytes.len(),
        })?;

        let header = Self::read_from_bytes(head).map_err(|_| ProtocolError::Truncated {
            expected: HEADER_SIZE,
            actual: head.len(),
        })?;

        if header.magic != MAGIC {
            return Err(ProtocolError::BadMagic { found: header.magic });
        }
        if header.version != VERSION {
            return Err(ProtocolError::UnsupportedVersion(header.version));
        }
        if PacketKind::from_u8(header.kind).is_none() {
            return Err(ProtocolError::UnknownKind(header.kind));
        }

        let size = header.payload_size();
        if size > max_payload {
            return Err(ProtocolError::PayloadTooLarge { size, max: max_payload });
        }

        Ok(header)
    }

    /// Message family (validated by [`PacketHeader::parse`]).
    pub fn kind(&self) -> Option<PacketKind> {
        PacketKind::from_u8(self.kind)
    }

    /// Declared payload length.
    pub fn payload_size(&self) -> usize {
        self.payload_len.get() as usize
    }

    /// Total packet length (header plus payload).
    pub fn packet_size(&self) -> usize {
        HEADER_SIZE + self.payload_size()
    }
}

/// Append one packet carrying `message` to `out`.
///
/// # Errors
///
/// `ProtocolError::Encode` on CBOR failure, `PayloadTooLarge` if the encoded
/// message exceeds [`MAX_PAYLOAD_SIZE`].
pub fn encode_packet<M: WireMessage>(message: &M, out: &mut Vec<u8>) -> Result<(), ProtocolError> {
    let mut payload = Vec::new();
    ciborium::into_writer(message, &mut payload)
        .map_err(|e| ProtocolError::Encode(e.to_string()))?;

    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::PayloadTooLarge { size: payload.len(), max: MAX_PAYLOAD_SIZE });
    }

    let header = PacketHeader::new(M::KIND, payload.len() as u32);
    out.reserve(HEADER_SIZE + payload.len());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(&payload);
    Ok(())
}

/// Decode exactly one complete packet.
///
/// # Errors
///
/// Header errors from [`PacketHeader::parse`], `KindMismatch` if the packet
/// carries the other message family, `Truncated` if bytes are missing, and
/// `Decode` if the payload is not a valid message. Trailing bytes are
/// rejected as a decode error.
pub fn decode_packet<M: WireMessage>(bytes: &[u8]) -> Result<M, ProtocolError> {
    let header = PacketHeader::parse(bytes, MAX_PAYLOAD_SIZE)?;
    if bytes.len() != header.packet_size() {
        if bytes.len() < header.packet_size() {
            return Err(ProtocolError::Truncated {
                expected: header.packet_size(),
                actual: bytes.len(),
            });
        }
        return Err(ProtocolError::Decode(format!(
            "{} trailing bytes",
            bytes.len() - header.packet_size()
        )));
    }

    decode_payload(&header, &bytes[HEADER_SIZE..])
}

/// Decode one packet from the front of a stream buffer.
///
/// Returns `Ok(None)` until a whole packet is buffered; on success the packet
/// is consumed from `buf`.
///
/// # Errors
///
/// As [`decode_packet`]. A header error leaves `buf` untouched; the caller
/// should drop the connection.
pub fn try_decode_packet<M: WireMessage>(buf: &mut BytesMut) -> Result<Option<M>, ProtocolError> {
    try_decode_packet_with_limit(buf, MAX_PAYLOAD_SIZE)
}

/// [`try_decode_packet`] with a payload limit below [`MAX_PAYLOAD_SIZE`].
///
/// Limits above [`MAX_PAYLOAD_SIZE`] are clamped to it.
pub fn try_decode_packet_with_limit<M: WireMessage>(
    buf: &mut BytesMut,
    max_payload: usize,
) -> Result<Option<M>, ProtocolError> {
    if buf.len() < HEADER_SIZE {
        return Ok(None);
    }

    let header = PacketHeader::parse(buf, max_payload.min(MAX_PAYLOAD_SIZE))?;
    if buf.len() < header.packet_size() {
        return Ok(None);
    }

    let packet = buf.split_to(header.packet_size());
    let mut payload = packet.freeze();
    payload.advance(HEADER_SIZE);

    decode_payload(&header, &payload).map(Some)
}

fn decode_payload<M: WireMessage>(
    header: &PacketHeader,
    payload: &[u8],
) -> Result<M, ProtocolError> {
    let actual = header.kind().ok_or(ProtocolError::UnknownKind(header.kind))?;
    if actual != M::KIND {
        return Err(ProtocolError::KindMismatch { expected: M::KIND, actual });
    }

    ciborium::from_reader(payload).map_err(|e| ProtocolError::Decode(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use hex_literal::hex;

    use super::*;
    use crate::messages::PeerId;

    #[test]
    fn header_layout() {
        let header = PacketHeader::new(PacketKind::Server, 3);
        assert_eq!(header.as_bytes(), hex!("4d52 01 02 00000003"));
    }

    #[test]
    fn header_size_matches_layout() {
        assert_eq!(std::mem::size_of::<PacketHeader>(), HEADER_SIZE);
    }

    #[test]
    fn client_message_roundtrip() {
        let message = ClientMessage::SendFrame {
            room: "demo".to_string(),
            to: PeerId::new("peer-1"),
            frame: "AAAA".to_string(),
        };

        let mut buf = Vec::new();
        encode_packet(&message, &mut buf).unwrap();
        let decoded: ClientMessage = decode_packet(&buf).unwrap();

        assert_eq!(decoded, message);
    }

    #[test]
    fn join_without_name_roundtrip() {
        let message = ClientMessage::Join { room: "demo".to_string(), name: None };

        let mut buf = Vec::new();
        encode_packet(&message, &mut buf).unwrap();
        let decoded: ClientMessage = decode_packet(&buf).unwrap();

        assert_eq!(decoded, message);
    }

    #[test]
    fn kind_mismatch_is_rejected() {
        let mut buf = Vec::new();
        encode_packet(&ServerMessage::PeerLeft { peer_id: PeerId::new("a") }, &mut buf).unwrap();

        let result: Result<ClientMessage, _> = decode_packet(&buf);
        assert_eq!(
            result,
            Err(ProtocolError::KindMismatch {
                expected: PacketKind::Client,
                actual: PacketKind::Server
            })
        );
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut buf = Vec::new();
        encode_packet(&ServerMessage::Error { reason: "x".to_string() }, &mut buf).unwrap();
        buf[0] = b'X';

        let result: Result<ServerMessage, _> = decode_packet(&buf);
        assert!(matches!(result, Err(ProtocolError::BadMagic { .. })));
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let mut buf = Vec::new();
        encode_packet(&ServerMessage::Error { reason: "x".to_string() }, &mut buf).unwrap();
        buf[2] = 9;

        let result: Result<ServerMessage, _> = decode_packet(&buf);
        assert_eq!(result, Err(ProtocolError::UnsupportedVersion(9)));
    }

    #[test]
    fn oversize_declaration_is_rejected_before_payload() {
        let header = PacketHeader::new(PacketKind::Client, (MAX_PAYLOAD_SIZE + 1) as u32);
        let result = PacketHeader::parse(header.as_bytes(), MAX_PAYLOAD_SIZE);

        assert!(matches!(result, Err(ProtocolError::PayloadTooLarge { .. })));
    }

    #[test]
    fn truncated_packet_is_rejected() {
        let mut buf = Vec::new();
        encode_packet(&ClientMessage::Leave { room: "demo".to_string() }, &mut buf).unwrap();
        buf.pop();

        let result: Result<ClientMessage, _> = decode_packet(&buf);
        assert!(matches!(result, Err(ProtocolError::Truncated { .. })));
    }

    #[test]
    fn stream_decoding_waits_for_whole_packet() {
        let mut wire = Vec::new();
        encode_packet(&ClientMessage::Leave { room: "a".to_string() }, &mut wire).unwrap();
        encode_packet(&ClientMessage::Leave { room: "b".to_string() }, &mut wire).unwrap();

        let mut buf = BytesMut::new();
        buf.extend_from_slice(&wire[..5]);
        assert_eq!(try_decode_packet::<ClientMessage>(&mut buf).unwrap(), None);

        buf.extend_from_slice(&wire[5..]);
        let first = try_decode_packet::<ClientMessage>(&mut buf).unwrap();
        let second = try_decode_packet::<ClientMessage>(&mut buf).unwrap();
        let third = try_decode_packet::<ClientMessage>(&mut buf).unwrap();

        assert_eq!(first, Some(ClientMessage::Leave { room: "a".to_string() }));
        assert_eq!(second, Some(ClientMessage::Leave { room: "b".to_string() }));
        assert_eq!(third, None);
        assert!(buf.is_empty());
    }

    #[test]
    fn configured_limit_applies_to_streams() {
        let mut wire = Vec::new();
        let message = ClientMessage::SendFrame {
            room: "demo".to_string(),
            to: PeerId::new("peer"),
            frame: "A".repeat(200),
        };
        encode_packet(&message, &mut wire).unwrap();

        let mut buf = BytesMut::from(&wire[..]);
        let result = try_decode_packet_with_limit::<ClientMessage>(&mut buf, 64);

        assert!(matches!(result, Err(ProtocolError::PayloadTooLarge { max: 64, .. })));
    }
}
