//! Mute state.

use std::{fmt, time::Instant};

/// What a player has been muted from.
///
/// Closed set: exactly one state is active at a time, and muting a player
/// who is already muted replaces the state rather than combining them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MuteState {
    /// Not muted.
    #[default]
    None,
    /// In-character messages blocked.
    Ic,
    /// Out-of-character chat blocked.
    Ooc,
    /// Both IC and OOC blocked.
    IcOoc,
    /// Music changes blocked.
    Music,
    /// Judge controls (health bars, testimony buttons) blocked.
    Judge,
    /// IC messages replaced with lines from the parrot list.
    Parrot,
}

impl MuteState {
    /// May send IC messages as written.
    pub fn can_speak_ic(self) -> bool {
        !matches!(self, Self::Ic | Self::IcOoc)
    }

    /// May send OOC messages.
    pub fn can_speak_ooc(self) -> bool {
        !matches!(self, Self::Ooc | Self::IcOoc)
    }

    /// May change the music.
    pub fn can_change_music(self) -> bool {
        self != Self::Music
    }

    /// May use judge controls.
    pub fn can_judge(self) -> bool {
        self != Self::Judge
    }
}

impl fmt::Display for MuteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "nothing",
            Self::Ic => "IC",
            Self::Ooc => "OOC",
            Self::IcOoc => "IC and OOC",
            Self::Music => "changing music",
            Self::Judge => "judge controls",
            Self::Parrot => "speaking (parrot)",
        })
    }
}

/// Mute state with an optional expiry.
///
/// Expiry is lazy: [`Mute::current`] reports `MuteState::None` once `until`
/// has passed and resets the stored state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Mute {
    state: MuteState,
    until: Option<Instant>,
}

impl Mute {
    /// Apply `state`, permanently when `until` is `None`.
    pub fn set(&mut self, state: MuteState, until: Option<Instant>) {
        self.state = state;
        self.until = if state == MuteState::None { None } else { until };
    }

    /// Lift any mute.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Effective state at `now`.
    pub fn current(&mut self, now: Instant) -> MuteState {
        if self.until.is_some_and(|until| now >= until) {
            self.clear();
        }
        self.state
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn ic_ooc_blocks_both_channels() {
        assert!(!MuteState::IcOoc.can_speak_ic());
        assert!(!MuteState::IcOoc.can_speak_ooc());
        assert!(MuteState::Music.can_speak_ic());
        assert!(!MuteState::Music.can_change_music());
        assert!(MuteState::Parrot.can_speak_ooc());
    }

    #[test]
    fn timed_mute_expires_lazily() {
        let start = Instant::now();
        let mut mute = Mute::default();
        mute.set(MuteState::Ooc, Some(start + Duration::from_secs(30)));

        assert_eq!(mute.current(start + Duration::from_secs(10)), MuteState::Ooc);
        assert_eq!(mute.current(start + Duration::from_secs(30)), MuteState::None);
        assert_eq!(mute, Mute::default());
    }

    #[test]
    fn permanent_mute_never_expires() {
        let start = Instant::now();
        let mut mute = Mute::default();
        mute.set(MuteState::Ic, None);
        assert_eq!(mute.current(start + Duration::from_secs(86_400)), MuteState::Ic);
    }
}
