//! Athena wire protocol.
//!
//! Packets are `#`-separated text records terminated by `%`:
//!
//! ```text
//! HEADER#field1#field2#...#%
//! ```
//!
//! This crate is pure codec logic. It owns the reversible escaping of
//! reserved glyphs ([`escape`], [`unescape`]), single-packet encoding and
//! decoding ([`Packet`]), the buffered splitter used by stream transports
//! ([`PacketDecoder`]), and greedy size-bounded chunking of long lists
//! ([`chunk_packets`]). Nothing here performs I/O.

#![forbid(unsafe_code)]

mod chunk;
mod decoder;
mod errors;
mod escape;
mod packet;

pub use chunk::chunk_packets;
pub use decoder::PacketDecoder;
pub use errors::{ProtocolError, Result};
pub use escape::{escape, unescape};
pub use packet::{Packet, SEPARATOR, TERMINATOR};
