//! Error types for the Athena domain core.
//!
//! Policy errors (lock transitions, testimony transitions, rate limits) carry
//! `Display` text written for end users: the server forwards it verbatim as
//! a server message to the client that triggered it. Nothing here is fatal
//! to anything other than the operation that produced it.

use std::time::Duration;

use thiserror::Error;

/// UID allocation failures.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UidError {
    /// Every id in `[0, capacity)` is in use
    #[error("server is full ({capacity} players)")]
    Exhausted {
        /// Pool capacity
        capacity: u32,
    },
}

/// Rejected area state transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AreaError {
    /// Area 0 is the lobby and can never be locked
    #[error("You cannot lock area 0.")]
    LobbyLocked,

    /// Lock requested on an area that is already locked
    #[error("This area is already locked.")]
    AlreadyLocked,

    /// Unlock requested on a free area
    #[error("This area is not locked.")]
    NotLocked,

    /// Invite list changes are meaningless while the area is free
    #[error("This area is unlocked.")]
    Unlocked,

    /// Another CM already holds the area
    #[error("This area already has a CM.")]
    CmTaken,

    /// The area does not accept CMs
    #[error("CMs are not allowed in this area.")]
    CmsDisallowed,

    /// Character slot held by another player
    #[error("This character is already taken.")]
    CharacterTaken,

    /// Evidence index out of range
    #[error("Evidence {index} does not exist.")]
    NoSuchEvidence {
        /// Requested index
        index: usize,
    },

    /// Health bar or value out of range
    #[error("Invalid health bar update.")]
    InvalidHealth,
}

/// Rejected testimony recorder transitions.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestimonyError {
    /// Recording requires an idle recorder
    #[error("The recorder is currently active.")]
    Active,

    /// Update, insert and delete require playback
    #[error("The recorder is not active.")]
    NotActive,

    /// Playback requires at least one statement
    #[error("No testimony recorded.")]
    Empty,

    /// Statement 0 is the testimony title
    #[error("The first statement cannot be deleted.")]
    TitleProtected,
}

/// Sliding-window rate limit exceeded.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("rate limit of {limit} messages per {window:?} exceeded")]
pub struct RateLimitError {
    /// Configured limit
    pub limit: usize,
    /// Configured window
    pub window: Duration,
}

/// Modcall attempted during the cooldown.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("You must wait {remaining_secs} seconds before calling a moderator again.")]
pub struct CooldownError {
    /// Whole seconds until the next call is accepted (rounded up)
    pub remaining_secs: u64,
}

/// Punishment name that is not in the catalog.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown punishment type: {0}")]
pub struct UnknownPunishment(pub String);

/// Permission name that is not in the permission table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown permission: {0}")]
pub struct UnknownPermission(pub String);

/// Unparseable duration string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot parse duration '{0}'")]
pub struct DurationError(pub String);
