//! Fuzz target for PacketDecoder over split reads
//!
//! # Strategy
//!
//! - Byte stream: arbitrary, including stray terminators and invalid UTF-8
//! - Split points: arbitrary chunk lengths, including zero
//! - Size limit: small enough that oversize packets are common
//!
//! # Invariants
//!
//! - Decoding never panics
//! - Buffered bytes never exceed the size limit plus one chunk
//! - The packets produced do not depend on where the stream was split

#![no_main]

use arbitrary::Arbitrary;
use athena_proto::{Packet, PacketDecoder};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    stream: Vec<u8>,
    splits: Vec<u8>,
    max_size: u8,
}

fn drain(decoder: &mut PacketDecoder, out: &mut Vec<Packet>) -> bool {
    loop {
        match decoder.next_packet() {
            Ok(Some(packet)) => out.push(packet),
            Ok(None) => return true,
            Err(_) => return false,
        }
    }
}

fuzz_target!(|input: Input| {
    let max_size = usize::from(input.max_size).max(4);

    let mut whole = PacketDecoder::new(max_size);
    whole.extend(&input.stream);
    let mut expected = Vec::new();
    let whole_ok = drain(&mut whole, &mut expected);

    let mut split = PacketDecoder::new(max_size);
    let mut actual = Vec::new();
    let mut split_ok = true;
    let mut rest = input.stream.as_slice();
    let mut sizes = input.splits.iter().copied().cycle();
    while !rest.is_empty() && split_ok {
        let take = sizes.next().map_or(rest.len(), usize::from).min(rest.len());
        let (chunk, tail) = rest.split_at(take.max(1).min(rest.len()));
        rest = tail;
        split.extend(chunk);
        assert!(split.pending() <= max_size + chunk.len());
        split_ok = drain(&mut split, &mut actual);
    }

    if whole_ok && split_ok {
        assert_eq!(expected, actual);
    }
});
