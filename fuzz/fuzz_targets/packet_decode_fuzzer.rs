//! Fuzz target for packet decoding
//!
//! # Invariants
//!
//! - NEVER panic on arbitrary bytes, whole or streamed in pieces
//! - A decoded message re-encodes to a packet that decodes to itself
//! - Stream decoding never consumes a partial packet

#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use murmur_proto::{
    ClientMessage, HEADER_SIZE, ServerMessage, decode_packet, encode_packet, try_decode_packet,
};

fuzz_target!(|data: &[u8]| {
    if let Ok(message) = decode_packet::<ClientMessage>(data) {
        let mut packet = Vec::new();
        encode_packet(&message, &mut packet).unwrap();
        assert_eq!(decode_packet::<ClientMessage>(&packet).unwrap(), message);
    }
    let _ = decode_packet::<ServerMessage>(data);

    let split = data.first().map_or(0, |b| *b as usize).min(data.len());
    let mut buf = BytesMut::new();
    for chunk in [&data[..split], &data[split..]] {
        buf.extend_from_slice(chunk);
        let before = buf.len();
        match try_decode_packet::<ServerMessage>(&mut buf) {
            Ok(Some(_)) => assert!(buf.len() + HEADER_SIZE <= before),
            Ok(None) => assert_eq!(buf.len(), before),
            Err(_) => break,
        }
    }
});
