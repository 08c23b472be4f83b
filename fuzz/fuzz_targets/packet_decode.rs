//! Fuzz target for Packet::decode
//!
//! Arbitrary text must decode to a packet or a structured error, never a
//! panic. A packet that decodes must encode back to text that decodes to the
//! same packet.

#![no_main]

use athena_proto::Packet;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    if let Ok(packet) = Packet::decode(&text) {
        let again = Packet::decode(&packet.encode()).expect("encoded packet must decode");
        assert_eq!(packet, again);
    }
});
