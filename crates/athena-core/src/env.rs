//! Environment abstraction for deterministic testing.
//!
//! Decouples server logic from system resources (time, sleeping, entropy).
//! Production uses the system clock and OS randomness; tests substitute a
//! clock they control so timed events resolve without real waiting.

use std::time::{Duration, Instant};

/// Time, sleeping and randomness for the server runtime.
///
/// # Invariants
///
/// - `now()` never goes backwards
/// - `random_bytes()` uses cryptographically secure entropy in production
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current monotonic time.
    fn now(&self) -> Instant;

    /// Seconds since the Unix epoch, used for persisted timestamps (bans,
    /// warnings) that must survive restarts.
    fn wall_clock_secs(&self) -> u64;

    /// Sleeps for the specified duration.
    ///
    /// Only timed background events await this; request handling never
    /// sleeps.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }

    /// Uniform index in `0..len`. Returns 0 when `len` is 0.
    fn random_index(&self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        // Modulo bias is irrelevant for the list sizes involved
        (self.random_u64() % len as u64) as usize
    }
}
