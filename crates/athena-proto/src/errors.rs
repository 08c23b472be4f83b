//! Protocol error types.

/// Result alias for codec operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while decoding packets.
///
/// Every variant is fatal for the connection that produced the bytes and
/// harmless for everyone else: the read loop drops the offending client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// Packet had no header token.
    #[error("packet has an empty header")]
    EmptyHeader,

    /// Packet text did not end with the terminator.
    #[error("packet is missing the '%' terminator")]
    MissingTerminator,

    /// Buffered bytes grew past the limit without a terminator in sight.
    #[error("packet of {size} bytes exceeds limit of {max} bytes")]
    PacketTooLarge {
        /// Bytes buffered so far
        size: usize,
        /// Configured maximum
        max: usize,
    },
}
