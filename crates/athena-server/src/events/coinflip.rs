//! Coinflip challenges, one open challenge per area.
//!
//! A challenge expires after 30 seconds; the next `/coinflip` in that area
//! then opens a fresh one instead of accepting.

use std::{
    collections::HashMap,
    fmt,
    str::FromStr,
    time::{Duration, Instant},
};

/// How long an open challenge waits for an opponent.
pub const CHALLENGE_TTL: Duration = Duration::from_secs(30);

/// A coin side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Heads.
    Heads,
    /// Tails.
    Tails,
}

impl Side {
    /// The other side.
    pub fn opposite(self) -> Self {
        match self {
            Self::Heads => Self::Tails,
            Self::Tails => Self::Heads,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Heads => "heads",
            Self::Tails => "tails",
        })
    }
}

impl FromStr for Side {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "heads" => Ok(Self::Heads),
            "tails" => Ok(Self::Tails),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
struct Challenge {
    player: String,
    side: Side,
    created: Instant,
}

/// Result of calling a side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// A new challenge was opened; `replaced_expired` if an old one timed out.
    Opened {
        /// An expired challenge was discarded first
        replaced_expired: bool,
    },
    /// The caller opened the standing challenge.
    OwnChallenge,
    /// The caller picked the challenger's side.
    SameSide(Side),
    /// The challenge was accepted and the coin flipped.
    Flipped {
        /// Challenger's name
        challenger: String,
        /// Challenger's side
        challenger_side: Side,
        /// Landed side
        result: Side,
    },
}

/// Open challenges keyed by area.
#[derive(Debug, Default)]
pub struct Coinflips {
    open: HashMap<usize, Challenge>,
}

impl Coinflips {
    /// Call `side` in `area` as `player`. `flip` is consulted only when a
    /// challenge is accepted.
    pub fn call(
        &mut self,
        area: usize,
        player: &str,
        side: Side,
        now: Instant,
        flip: impl FnOnce() -> Side,
    ) -> Call {
        let open = |replaced_expired| Call::Opened { replaced_expired };
        let fresh = Challenge { player: player.to_string(), side, created: now };

        let Some(existing) = self.open.get(&area) else {
            self.open.insert(area, fresh);
            return open(false);
        };
        if now.saturating_duration_since(existing.created) > CHALLENGE_TTL {
            self.open.insert(area, fresh);
            return open(true);
        }
        if existing.player == player {
            return Call::OwnChallenge;
        }
        if existing.side == side {
            return Call::SameSide(existing.side);
        }

        let Some(challenge) = self.open.remove(&area) else {
            return open(false);
        };
        Call::Flipped { challenger: challenge.player, challenger_side: challenge.side, result: flip() }
    }
}
