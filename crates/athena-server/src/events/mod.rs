//! Server-wide timed events and minigames.
//!
//! Each event keeps its lifecycle state behind its own mutex. State changes
//! happen under that lock; messages, lookups and punishments happen after
//! it is released. Background tasks sleep through the environment and
//! re-check that the event is still active before acting, so an event
//! closed by another path makes a late timer a no-op.

pub mod coinflip;
pub mod giveaway;
pub mod hot_potato;

use std::{
    sync::{Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

pub use coinflip::Coinflips;
pub use giveaway::Giveaway;
pub use hot_potato::HotPotato;

/// State of every timed event.
#[derive(Debug, Default)]
pub struct Events {
    hot_potato: Mutex<HotPotato>,
    giveaway: Mutex<Giveaway>,
    coinflips: Mutex<Coinflips>,
}

impl Events {
    /// Hot potato state.
    pub fn hot_potato(&self) -> MutexGuard<'_, HotPotato> {
        self.hot_potato.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Giveaway state.
    pub fn giveaway(&self) -> MutexGuard<'_, Giveaway> {
        self.giveaway.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open coinflip challenges.
    pub fn coinflips(&self) -> MutexGuard<'_, Coinflips> {
        self.coinflips.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Whole seconds left on a cooldown that started at `last_end`, rounded up.
///
/// Zero when no cooldown is running.
fn cooldown_secs(last_end: Option<Instant>, cooldown: Duration, now: Instant) -> u64 {
    let Some(end) = last_end else { return 0 };
    let elapsed = now.saturating_duration_since(end);
    if elapsed >= cooldown { 0 } else { (cooldown - elapsed).as_secs() + 1 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooldown_rounds_up() {
        let now = Instant::now();
        let cd = Duration::from_secs(300);
        assert_eq!(cooldown_secs(None, cd, now), 0);
        assert_eq!(cooldown_secs(Some(now), cd, now), 301);
        assert_eq!(cooldown_secs(Some(now), cd, now + Duration::from_millis(299_500)), 1);
        assert_eq!(cooldown_secs(Some(now), cd, now + cd), 0);
    }
}
