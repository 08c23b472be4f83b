//! Server error types.
//!
//! - `ServerError`: listener, transport and startup failures
//! - `ConfigError`: configuration file problems, fatal at startup
//! - `BridgeError`: moderation bridge lookups and policy refusals

use std::{fmt, io, net::SocketAddr, path::PathBuf};

use athena_core::{AreaError, UnknownPermission, UnknownPunishment};
use athena_proto::ProtocolError;
use thiserror::Error;

use crate::storage::StorageError;

/// Errors from the server runtime.
#[derive(Debug)]
pub enum ServerError {
    /// Could not bind a listener.
    ///
    /// Fatal: sent over the fatal channel and ends the process.
    Bind {
        /// Address that failed
        addr: String,
        /// Underlying error
        source: io::Error,
    },

    /// A listener stopped accepting connections.
    ///
    /// Fatal for the same reason as `Bind`.
    Accept {
        /// Listener address
        addr: SocketAddr,
        /// Underlying error
        source: io::Error,
    },

    /// Transport I/O failed on one connection. Only that connection closes.
    Io(io::Error),

    /// WebSocket handshake or framing failed on one connection.
    WebSocket(String),

    /// A peer sent an undecodable frame. Only that connection closes.
    Protocol(ProtocolError),

    /// Storage backend failure.
    Storage(StorageError),

    /// Configuration was rejected at startup.
    Config(ConfigError),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bind { addr, source } => write!(f, "failed to bind {addr}: {source}"),
            Self::Accept { addr, source } => write!(f, "listener {addr} failed: {source}"),
            Self::Io(err) => write!(f, "I/O error: {err}"),
            Self::WebSocket(msg) => write!(f, "WebSocket error: {msg}"),
            Self::Protocol(err) => write!(f, "protocol error: {err}"),
            Self::Storage(err) => write!(f, "storage error: {err}"),
            Self::Config(err) => write!(f, "configuration error: {err}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Bind { source, .. } | Self::Accept { source, .. } => Some(source),
            Self::Io(err) => Some(err),
            Self::Protocol(err) => Some(err),
            Self::Storage(err) => Some(err),
            Self::Config(err) => Some(err),
            Self::WebSocket(_) => None,
        }
    }
}

impl From<io::Error> for ServerError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<ProtocolError> for ServerError {
    fn from(err: ProtocolError) -> Self {
        Self::Protocol(err)
    }
}

impl From<StorageError> for ServerError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}

impl From<ConfigError> for ServerError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read {path}: {source}")]
    Io {
        /// Config path
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },

    /// Malformed TOML
    #[error(transparent)]
    Parse(#[from] toml::de::Error),

    /// Semantically invalid setting
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// Role lists a permission that does not exist
    #[error(transparent)]
    UnknownPermission(#[from] UnknownPermission),
}

/// Moderation bridge failures.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// No live player matches the UID or name
    #[error("player not found: {0}")]
    PlayerNotFound(String),

    /// No area matches the id or name
    #[error("area not found: {0}")]
    AreaNotFound(String),

    /// Area refused the operation
    #[error(transparent)]
    Area(#[from] AreaError),

    /// Punishment name not in the catalog
    #[error(transparent)]
    UnknownPunishment(#[from] UnknownPunishment),

    /// Operation not allowed on the lobby
    #[error("area 0 cannot be {0}")]
    Lobby(&'static str),

    /// Area change refused
    #[error(transparent)]
    Move(#[from] MoveError),

    /// Storage backend failure
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Reasons an area change is refused. Shown to the client verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MoveError {
    /// Target index out of range
    #[error("Invalid area.")]
    NoSuchArea,

    /// Already there
    #[error("You are already in this area.")]
    SameArea,

    /// Jailed players stay put
    #[error("You are jailed and cannot change areas.")]
    Jailed,

    /// Locked and not invited
    #[error("This area is locked.")]
    Locked,
}
