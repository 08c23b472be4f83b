//! Streaming packet splitter for byte transports.

use bytes::BytesMut;

use crate::{
    errors::{ProtocolError, Result},
    packet::Packet,
};

/// Accumulates transport bytes and yields complete packets.
///
/// Raw TCP delivers arbitrary slices of the packet stream and a WebSocket
/// message may carry one packet, several, or a fragment. Both feed bytes in
/// with [`PacketDecoder::extend`] and drain with
/// [`PacketDecoder::next_packet`] until it returns `Ok(None)`.
///
/// Bytes are interpreted as UTF-8 with lossy replacement: content validity
/// is not a framing concern.
#[derive(Debug)]
pub struct PacketDecoder {
    buf: BytesMut,
    max_size: usize,
}

impl PacketDecoder {
    /// Decoder rejecting packets longer than `max_size` bytes.
    pub fn new(max_size: usize) -> Self {
        Self { buf: BytesMut::with_capacity(4096), max_size }
    }

    /// Append received bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes buffered but not yet part of a complete packet.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Next complete packet, or `None` if more bytes are needed.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::PacketTooLarge` once a packet (complete or not)
    ///   exceeds the size limit; the decoder should then be discarded along
    ///   with its connection.
    /// - Any [`Packet::decode`] error for a malformed packet.
    pub fn next_packet(&mut self) -> Result<Option<Packet>> {
        match self.buf.iter().position(|&b| b == b'%') {
            Some(end) => {
                let size = end + 1;
                if size > self.max_size {
                    return Err(ProtocolError::PacketTooLarge { size, max: self.max_size });
                }
                let raw = self.buf.split_to(size);
                let text = String::from_utf8_lossy(&raw);
                Packet::decode(&text).map(Some)
            },
            None if self.buf.len() > self.max_size => {
                Err(ProtocolError::PacketTooLarge { size: self.buf.len(), max: self.max_size })
            },
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yields_packets_across_partial_reads() {
        let mut decoder = PacketDecoder::new(1024);

        decoder.extend(b"HI#ab");
        assert_eq!(decoder.next_packet().unwrap(), None);

        decoder.extend(b"c#%ID#AO2#2.10#%askch");
        assert_eq!(decoder.next_packet().unwrap().unwrap().header(), "HI");
        assert_eq!(decoder.next_packet().unwrap().unwrap().fields(), ["AO2", "2.10"]);
        assert_eq!(decoder.next_packet().unwrap(), None);
        assert_eq!(decoder.pending(), 5);

        decoder.extend(b"aa#%");
        assert_eq!(decoder.next_packet().unwrap().unwrap().header(), "askchaa");
    }

    #[test]
    fn rejects_unterminated_flood() {
        let mut decoder = PacketDecoder::new(16);
        decoder.extend(&[b'a'; 17]);
        assert!(matches!(decoder.next_packet(), Err(ProtocolError::PacketTooLarge { .. })));
    }

    #[test]
    fn rejects_oversize_complete_packet() {
        let mut decoder = PacketDecoder::new(8);
        decoder.extend(b"CT#0123456789#%");
        assert!(matches!(
            decoder.next_packet(),
            Err(ProtocolError::PacketTooLarge { size: 15, max: 8 })
        ));
    }

    #[test]
    fn invalid_utf8_is_replaced_not_rejected() {
        let mut decoder = PacketDecoder::new(64);
        decoder.extend(b"CT#n\xffme#hi#%");
        let packet = decoder.next_packet().unwrap().unwrap();
        assert_eq!(packet.header(), "CT");
        assert_eq!(packet.raw(1), Some("hi"));
    }
}
