//! Fuzz target for frame opening
//!
//! # Invariants
//!
//! - Arbitrary bytes NEVER open under a real session key
//! - Short input is `MalformedFrame`, everything else `Authentication`
//! - A genuine frame with any single byte changed fails to open

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use murmur_crypto::{
    ChaChaEntropy, CryptoError, IdentityKeyPair, NONCE_SIZE, TAG_SIZE, derive_session_key,
    open_bytes, seal,
};

#[derive(Debug, Arbitrary)]
struct Input {
    seed: u64,
    plaintext: Vec<u8>,
    garbage: Vec<u8>,
    flip_at: usize,
    flip_mask: u8,
}

fuzz_target!(|input: Input| {
    let entropy = ChaChaEntropy::seed_from_u64(input.seed);
    let alice = IdentityKeyPair::generate(&entropy).unwrap();
    let bob = IdentityKeyPair::generate(&entropy).unwrap();
    let key = derive_session_key(&alice, bob.public_key()).unwrap();

    match open_bytes(&key, &input.garbage) {
        Err(CryptoError::MalformedFrame { .. }) => {
            assert!(input.garbage.len() < NONCE_SIZE + TAG_SIZE);
        },
        Err(CryptoError::Authentication) => {
            assert!(input.garbage.len() >= NONCE_SIZE + TAG_SIZE);
        },
        other => panic!("garbage opened: {other:?}"),
    }

    let mut frame = seal(&key, &input.plaintext, &entropy).unwrap().to_bytes();
    let index = input.flip_at % frame.len();
    frame[index] ^= input.flip_mask.max(1);
    assert!(open_bytes(&key, &frame).is_err());
});
