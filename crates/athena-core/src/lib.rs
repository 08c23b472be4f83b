//! Athena domain core.
//!
//! Sans-IO state shared by every connection: the UID pool, rooms with their
//! lock, CM and evidence state, the testimony recorder, permissions, mutes,
//! the per-client rate limiter and modcall cooldown, and the punishment
//! pipeline.
//!
//! Nothing here touches sockets or the system clock. Time-dependent
//! operations take an explicit `Instant`, randomized ones take an `Rng`,
//! and the runtime supplies both through an [`Environment`].

#![forbid(unsafe_code)]

pub mod area;
pub mod duration;
pub mod env;
pub mod error;
pub mod mute;
pub mod permissions;
pub mod punishment;
pub mod rate_limit;
pub mod testimony;
pub mod uid;

pub use area::{Area, AreaSettings, Bar, Evidence, EvidenceMode, LockKind, LockState, Status};
pub use env::Environment;
pub use error::{
    AreaError, CooldownError, DurationError, RateLimitError, TestimonyError, UidError,
    UnknownPermission, UnknownPunishment,
};
pub use mute::{Mute, MuteState};
pub use permissions::Permissions;
pub use punishment::{Punishment, PunishmentKind, Punishments};
pub use rate_limit::{ModcallCooldown, RateLimiter};
pub use testimony::{Captured, RecorderState, Testimony};
pub use uid::{Uid, UidPool};
