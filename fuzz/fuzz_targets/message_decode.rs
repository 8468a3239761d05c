//! Fuzz target for client message decoding
//!
//! Feeds arbitrary text to `decode`. Invalid input must come back as an
//! error, never a panic, and anything that decodes must re-encode.

#![no_main]

use bingo_proto::{ClientMessage, decode};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    match decode(text) {
        Ok(ClientMessage::Unknown { kind }) => assert!(!ClientMessage::KINDS.contains(&kind.as_str())),
        Ok(message) => {
            let json = serde_json::to_string(&message).expect("decoded message must re-encode");
            let again = decode(&json).expect("re-encoded message must decode");
            assert_eq!(again, message);
        },
        Err(_) => {},
    }
});
