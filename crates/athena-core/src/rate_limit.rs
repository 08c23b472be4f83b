//! Per-client abuse controls: message rate limiting and modcall cooldown.
//!
//! Both are plain values; the server wraps each client's instances in that
//! client's lock. Time is always passed in explicitly.

use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

use crate::error::{CooldownError, RateLimitError};

/// Sliding-window message counter.
///
/// Accepted messages record their timestamp. A check first drops every
/// timestamp at least `window` old, then rejects if `limit` messages remain
/// in the window. Rejected attempts are not recorded, so a client that backs
/// off recovers as soon as its oldest message leaves the window.
///
/// A limit of zero disables the limiter entirely: `check` returns
/// immediately and the history stays empty.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    limit: usize,
    window: Duration,
    history: VecDeque<Instant>,
}

impl RateLimiter {
    /// Limiter allowing `limit` messages per `window`.
    pub fn new(limit: usize, window: Duration) -> Self {
        Self { limit, window, history: VecDeque::with_capacity(limit) }
    }

    /// Limiter that accepts everything.
    pub fn disabled() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Record a message at `now` if it is within the limit.
    ///
    /// # Errors
    ///
    /// `RateLimitError` if `limit` messages were already accepted within the
    /// window ending at `now`.
    pub fn check(&mut self, now: Instant) -> Result<(), RateLimitError> {
        if self.limit == 0 {
            return Ok(());
        }

        while let Some(&oldest) = self.history.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                self.history.pop_front();
            } else {
                break;
            }
        }

        if self.history.len() >= self.limit {
            return Err(RateLimitError { limit: self.limit, window: self.window });
        }

        self.history.push_back(now);
        Ok(())
    }

    /// Messages currently counted against the window.
    pub fn recent(&self) -> usize {
        self.history.len()
    }

    /// Forget all history.
    pub fn reset(&mut self) {
        self.history.clear();
    }
}

/// Single-timestamp cooldown for moderator calls.
///
/// A zero cooldown disables the check.
#[derive(Debug, Clone)]
pub struct ModcallCooldown {
    cooldown: Duration,
    last: Option<Instant>,
}

impl ModcallCooldown {
    /// Cooldown of `cooldown` between calls.
    pub fn new(cooldown: Duration) -> Self {
        Self { cooldown, last: None }
    }

    /// Time left before another call is accepted.
    pub fn remaining(&self, now: Instant) -> Duration {
        match self.last {
            Some(last) if !self.cooldown.is_zero() => {
                self.cooldown.saturating_sub(now.saturating_duration_since(last))
            },
            _ => Duration::ZERO,
        }
    }

    /// Accept and record a call at `now`, or reject it.
    ///
    /// # Errors
    ///
    /// `CooldownError` with the remaining whole seconds, rounded up so the
    /// user is never told to wait 0 seconds.
    pub fn check(&mut self, now: Instant) -> Result<(), CooldownError> {
        let remaining = self.remaining(now);
        if !remaining.is_zero() {
            let secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
            return Err(CooldownError { remaining_secs: secs });
        }
        self.last = Some(now);
        Ok(())
    }

    /// Clear the last call time.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooldown_rounds_remaining_up() {
        let start = Instant::now();
        let mut cooldown = ModcallCooldown::new(Duration::from_secs(60));
        cooldown.check(start).unwrap();

        let err = cooldown.check(start + Duration::from_millis(500)).unwrap_err();
        assert_eq!(err.remaining_secs, 60);

        let err = cooldown.check(start + Duration::from_secs(59)).unwrap_err();
        assert_eq!(err.remaining_secs, 1);

        assert!(cooldown.check(start + Duration::from_secs(60)).is_ok());
    }

    #[test]
    fn zero_cooldown_never_blocks() {
        let now = Instant::now();
        let mut cooldown = ModcallCooldown::new(Duration::ZERO);
        for _ in 0..10 {
            assert!(cooldown.check(now).is_ok());
        }
        assert_eq!(cooldown.remaining(now), Duration::ZERO);
    }

    #[test]
    fn disabled_limiter_keeps_no_history() {
        let now = Instant::now();
        let mut limiter = RateLimiter::disabled();
        for _ in 0..1000 {
            limiter.check(now).unwrap();
        }
        assert_eq!(limiter.recent(), 0);
    }
}
