//! Punishment catalog and per-client pipeline.
//!
//! A client carries an ordered list of active punishments. Each IC message
//! runs through every live entry in insertion order, each effect's output
//! feeding the next. Expiry is checked lazily when a message is processed;
//! nothing sweeps the lists in the background.

mod effects;

use std::{
    fmt,
    str::FromStr,
    time::{Duration, Instant},
};

pub use effects::{EffectContext, MAX_TEXT_CHARS, TORMENT_CYCLE, apply_effect};
use rand::Rng;

use crate::{error::UnknownPunishment, uid::Uid};

/// Every punishment the server knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PunishmentKind {
    /// Messages are delivered only to moderators and the sender.
    Whisper,
    /// Characters reversed.
    Backward,
    /// Every word said twice.
    Stutterstep,
    /// Vowels stretched.
    Elongate,
    /// All caps.
    Uppercase,
    /// No caps.
    Lowercase,
    /// Words replaced with machine noises.
    Robotic,
    /// aLtErNaTiNg case.
    Alternating,
    /// Mathematical bold letters.
    Fancy,
    /// UwU speak.
    Uwu,
    /// Pirate speak.
    Pirate,
    /// Early modern English.
    Shakespearean,
    /// Grunts.
    Caveman,
    /// Random long words censored.
    Censor,
    /// Word order shuffled.
    Confused,
    /// Suspicious asides appended.
    Paranoid,
    /// Slurred, repeated words.
    Drunk,
    /// Hiccups between words.
    Hiccup,
    /// Letters whistled.
    Whistle,
    /// Inner letters obscured.
    Mumble,
    /// Two or three random effects stacked.
    Spaghetti,
    /// One random effect per message.
    Rng,
    /// Short messages flagged.
    Essay,
    /// Common words misspelled.
    Autospell,
    /// Rotates through a fixed effect cycle.
    Torment,
    /// Letters doubled in a per-player pattern.
    Copycats,
    /// Stage directions appended.
    Subtitles,
    /// Announcement prefix.
    Spotlight,
    /// Random emoji appended.
    Emoji,
}

impl PunishmentKind {
    /// Catalog in command-table order.
    pub const ALL: [Self; 29] = [
        Self::Whisper,
        Self::Backward,
        Self::Stutterstep,
        Self::Elongate,
        Self::Uppercase,
        Self::Lowercase,
        Self::Robotic,
        Self::Alternating,
        Self::Fancy,
        Self::Uwu,
        Self::Pirate,
        Self::Shakespearean,
        Self::Caveman,
        Self::Censor,
        Self::Confused,
        Self::Paranoid,
        Self::Drunk,
        Self::Hiccup,
        Self::Whistle,
        Self::Mumble,
        Self::Spaghetti,
        Self::Rng,
        Self::Essay,
        Self::Autospell,
        Self::Torment,
        Self::Copycats,
        Self::Subtitles,
        Self::Spotlight,
        Self::Emoji,
    ];

    /// Lowercase command name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Whisper => "whisper",
            Self::Backward => "backward",
            Self::Stutterstep => "stutterstep",
            Self::Elongate => "elongate",
            Self::Uppercase => "uppercase",
            Self::Lowercase => "lowercase",
            Self::Robotic => "robotic",
            Self::Alternating => "alternating",
            Self::Fancy => "fancy",
            Self::Uwu => "uwu",
            Self::Pirate => "pirate",
            Self::Shakespearean => "shakespearean",
            Self::Caveman => "caveman",
            Self::Censor => "censor",
            Self::Confused => "confused",
            Self::Paranoid => "paranoid",
            Self::Drunk => "drunk",
            Self::Hiccup => "hiccup",
            Self::Whistle => "whistle",
            Self::Mumble => "mumble",
            Self::Spaghetti => "spaghetti",
            Self::Rng => "rng",
            Self::Essay => "essay",
            Self::Autospell => "autospell",
            Self::Torment => "torment",
            Self::Copycats => "copycats",
            Self::Subtitles => "subtitles",
            Self::Spotlight => "spotlight",
            Self::Emoji => "emoji",
        }
    }

    /// One-line description for command help.
    pub fn description(self) -> &'static str {
        match self {
            Self::Whisper => "Only moderators can see their messages.",
            Self::Backward => "Reverses their messages.",
            Self::Stutterstep => "Makes them say every word twice.",
            Self::Elongate => "Stretches out their vowels.",
            Self::Uppercase => "Forces their messages to uppercase.",
            Self::Lowercase => "Forces their messages to lowercase.",
            Self::Robotic => "Turns their words into beeps and boops.",
            Self::Alternating => "Alternates the case of their letters.",
            Self::Fancy => "Renders their messages in bold unicode.",
            Self::Uwu => "Converts their messages to uwu speak.",
            Self::Pirate => "Converts their messages to pirate speak.",
            Self::Shakespearean => "Converts their messages to Shakespearean English.",
            Self::Caveman => "Reduces their messages to grunts.",
            Self::Censor => "Randomly censors their words.",
            Self::Confused => "Shuffles their word order.",
            Self::Paranoid => "Adds paranoid asides to their messages.",
            Self::Drunk => "Slurs and repeats their words.",
            Self::Hiccup => "Interrupts their words with hiccups.",
            Self::Whistle => "Replaces their letters with whistles.",
            Self::Mumble => "Obscures the middle of their words.",
            Self::Spaghetti => "Applies several random effects.",
            Self::Rng => "Applies a random effect to each message.",
            Self::Essay => "Flags messages under 50 characters.",
            Self::Autospell => "Misspells common words.",
            Self::Torment => "Cycles through effects on every message.",
            Self::Copycats => "Doubles letters in a pattern unique to them.",
            Self::Subtitles => "Adds confusing subtitles.",
            Self::Spotlight => "Announces every message to everyone.",
            Self::Emoji => "Adds a random emoji to their messages.",
        }
    }
}

impl fmt::Display for PunishmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PunishmentKind {
    type Err = UnknownPunishment;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == lower)
            .ok_or_else(|| UnknownPunishment(s.to_string()))
    }
}

/// One active punishment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Punishment {
    /// Effect
    pub kind: PunishmentKind,
    /// Expiry; `None` is permanent
    pub expires: Option<Instant>,
    /// Moderator-supplied reason
    pub reason: String,
    /// Times applied so far
    pub cycle: usize,
}

impl Punishment {
    /// True once `now` reaches the expiry.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires.is_some_and(|at| now >= at)
    }

    /// Time left at `now`, `None` when permanent.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.expires.map(|at| at.saturating_duration_since(now))
    }
}

/// Ordered set of active punishments, at most one per kind.
#[derive(Debug, Clone, Default)]
pub struct Punishments {
    entries: Vec<Punishment>,
}

impl Punishments {
    /// Add or replace the punishment of `kind`.
    ///
    /// A zero `duration` is permanent. Re-applying a kind overwrites its
    /// expiry and reason in place and restarts its cycle counter.
    pub fn add(&mut self, kind: PunishmentKind, duration: Duration, reason: impl Into<String>, now: Instant) {
        let entry = Punishment {
            kind,
            expires: (!duration.is_zero()).then(|| now + duration),
            reason: reason.into(),
            cycle: 0,
        };
        match self.entries.iter_mut().find(|p| p.kind == kind) {
            Some(slot) => *slot = entry,
            None => self.entries.push(entry),
        }
    }

    /// Remove `kind`. Returns `false` if it was not active.
    pub fn remove(&mut self, kind: PunishmentKind) -> bool {
        let before = self.entries.len();
        self.entries.retain(|p| p.kind != kind);
        self.entries.len() != before
    }

    /// Remove everything, returning how many entries were dropped.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    /// True if `kind` is present and unexpired at `now`.
    pub fn contains(&self, kind: PunishmentKind, now: Instant) -> bool {
        self.entries.iter().any(|p| p.kind == kind && !p.is_expired(now))
    }

    /// Drop expired entries, returning their kinds.
    pub fn prune(&mut self, now: Instant) -> Vec<PunishmentKind> {
        let mut expired = Vec::new();
        self.entries.retain(|p| {
            let keep = !p.is_expired(now);
            if !keep {
                expired.push(p.kind);
            }
            keep
        });
        expired
    }

    /// Live entries in application order.
    pub fn active(&self, now: Instant) -> Vec<&Punishment> {
        self.entries.iter().filter(|p| !p.is_expired(now)).collect()
    }

    /// Number of stored entries, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run `text` through every live punishment in insertion order.
    ///
    /// Prunes expired entries first and advances each applied entry's cycle
    /// counter.
    pub fn apply<R: Rng + ?Sized>(&mut self, text: &str, uid: Uid, now: Instant, rng: &mut R) -> String {
        self.prune(now);
        let mut out = text.to_string();
        for entry in &mut self.entries {
            out = apply_effect(entry.kind, &out, EffectContext { uid, cycle: entry.cycle }, rng);
            entry.cycle = entry.cycle.wrapping_add(1);
        }
        out
    }
}
