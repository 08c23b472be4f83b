//! Athena session server.
//!
//! Production runtime around [`athena_core`]: tokio listeners for raw TCP and
//! WebSocket clients, per-connection sessions, the packet handlers and OOC
//! command table, timed events, ban and account storage, and a moderation
//! bridge for external tools.
//!
//! # Architecture
//!
//! A single [`Server`] owns configuration, the area list, the client
//! registry, the UID pool and storage. Each connection runs a
//! [`session`] that decodes packets and calls into [`handlers`]; replies and
//! broadcasts go through each [`Client`]'s outbound channel, so a slow peer
//! never blocks another.
//!
//! # Components
//!
//! - [`Server`]: shared context, area membership and bans
//! - [`Client`]: one connection's mutable state
//! - [`ClientRegistry`]: live connections, snapshot on read
//! - [`transport`]: TCP and WebSocket accept loops
//! - [`ModerationBridge`]: moderation API for bots and panels
//! - [`Storage`]: bans, warnings and accounts; [`MemoryStorage`] or
//!   [`RedbStorage`]
//! - [`SystemEnv`]: production environment (real time, OS randomness)

#![forbid(unsafe_code)]

pub mod broadcast;
pub mod bridge;
pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod handlers;
pub mod ipid;
pub mod registry;
pub mod server;
pub mod session;
pub mod storage;
pub mod system_env;
pub mod transport;

pub use bridge::{AreaInfo, ModerationBridge, PlayerInfo};
pub use client::{Client, ClientId, Limits, OUTBOUND_CAPACITY, Outbound};
pub use config::Config;
pub use error::{BridgeError, ConfigError, MoveError, ServerError};
pub use registry::ClientRegistry;
pub use server::{Server, VERSION};
pub use storage::{MemoryStorage, RedbStorage, Storage, StorageError};
pub use system_env::{EnvRng, SystemEnv};
