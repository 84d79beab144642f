//! Client-side pacing guard for authentication attempts.
//!
//! This is a heuristic only — the authoritative limit (5 attempts per
//! 15-minute window) is enforced server-side and arrives as a 429 with an
//! optional `Retry-After` hint. The guard keeps an attempt counter and a
//! last-throttle timestamp so the client can refuse obviously-doomed
//! retries without a round trip.
//!
//! The clock is injected so time-dependent behavior is deterministically
//! testable; production code uses [`SystemClock`].

use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Cool-off after a throttle event before the next attempt is allowed.
const RETRY_TIMEOUT_MS: u64 = 60_000;

/// Attempts allowed before the guard throttles. The guard increments first
/// and fails on `count > MAX_ATTEMPTS`: attempts 1-5 pass, attempt 6 fails.
const MAX_ATTEMPTS: u32 = 5;

/// Inactivity window after which the counter resets.
const RESET_AFTER_MS: u64 = 300_000;

/// Cap applied to server-supplied `Retry-After` values (seconds).
pub const MAX_RETRY_AFTER_SECS: u64 = 600;

/// Millisecond clock abstraction.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Wall-clock milliseconds since the Unix epoch.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

#[derive(Debug, Default)]
struct GuardState {
    attempt_count: u32,
    last_attempt_ms: Option<u64>,
}

/// Process-wide attempt counter shared by all concurrent login attempts.
pub struct AttemptGuard {
    clock: Arc<dyn Clock>,
    state: Mutex<GuardState>,
}

impl AttemptGuard {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            state: Mutex::new(GuardState::default()),
        }
    }

    /// Gate one authentication attempt.
    ///
    /// Resets the counter after 5 minutes of inactivity, refuses with
    /// [`Error::RetryAfter`] while inside the 60-second cool-off, and
    /// refuses with [`Error::TooManyAttempts`] once the counter passes 5.
    /// The success path records the attempt without stamping a throttle.
    pub fn check_and_record(&self) -> Result<()> {
        let now = self.clock.now_ms();
        let mut state = self.state.lock();

        if let Some(last) = state.last_attempt_ms {
            if now.saturating_sub(last) > RESET_AFTER_MS {
                state.attempt_count = 0;
                state.last_attempt_ms = None;
            }
        }

        if let Some(last) = state.last_attempt_ms {
            let elapsed = now.saturating_sub(last);
            if elapsed < RETRY_TIMEOUT_MS {
                let remaining = (RETRY_TIMEOUT_MS - elapsed).div_ceil(1000);
                return Err(Error::RetryAfter(remaining));
            }
        }

        state.attempt_count += 1;
        if state.attempt_count > MAX_ATTEMPTS {
            state.last_attempt_ms = Some(now);
            return Err(Error::TooManyAttempts);
        }

        Ok(())
    }

    /// Record a server-side throttle (429) so subsequent client attempts
    /// respect the cool-off even before hitting the network again.
    pub fn record_server_throttle(&self) {
        let now = self.clock.now_ms();
        self.state.lock().last_attempt_ms = Some(now);
    }

    /// Cap a server-supplied retry hint at 10 minutes. The server value,
    /// capped, always wins over the client-computed wait.
    pub fn cap_retry_after(seconds: u64) -> u64 {
        seconds.min(MAX_RETRY_AFTER_SECS)
    }
}

impl Default for AttemptGuard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Manually-advanced test clock.
    struct TestClock(Mutex<u64>);

    impl TestClock {
        fn new() -> Arc<Self> {
            Arc::new(Self(Mutex::new(1_000_000)))
        }

        fn advance_ms(&self, ms: u64) {
            *self.0.lock() += ms;
        }
    }

    impl Clock for TestClock {
        fn now_ms(&self) -> u64 {
            *self.0.lock()
        }
    }

    #[test]
    fn first_five_attempts_pass_sixth_fails() {
        let clock = TestClock::new();
        let guard = AttemptGuard::with_clock(clock.clone());

        for attempt in 1..=5 {
            clock.advance_ms(100);
            assert!(guard.check_and_record().is_ok(), "attempt {attempt}");
        }

        clock.advance_ms(100);
        assert!(matches!(
            guard.check_and_record(),
            Err(Error::TooManyAttempts)
        ));
    }

    #[test]
    fn cool_off_reports_remaining_seconds_ceiling_rounded() {
        let clock = TestClock::new();
        let guard = AttemptGuard::with_clock(clock.clone());

        for _ in 0..6 {
            let _ = guard.check_and_record();
        }

        // 10.5s into the 60s cool-off: 49.5s remain, ceiling 50.
        clock.advance_ms(10_500);
        assert!(matches!(
            guard.check_and_record(),
            Err(Error::RetryAfter(50))
        ));
    }

    #[test]
    fn counter_resets_after_five_minutes() {
        let clock = TestClock::new();
        let guard = AttemptGuard::with_clock(clock.clone());

        for _ in 0..6 {
            let _ = guard.check_and_record();
        }
        assert!(guard.check_and_record().is_err());

        clock.advance_ms(RESET_AFTER_MS + 1);
        assert!(guard.check_and_record().is_ok());
    }

    #[test]
    fn success_path_does_not_start_cool_off() {
        let clock = TestClock::new();
        let guard = AttemptGuard::with_clock(clock.clone());

        assert!(guard.check_and_record().is_ok());
        clock.advance_ms(10);
        // Were a throttle stamped on success, this would be RetryAfter.
        assert!(guard.check_and_record().is_ok());
    }

    #[test]
    fn server_throttle_starts_cool_off() {
        let clock = TestClock::new();
        let guard = AttemptGuard::with_clock(clock.clone());

        assert!(guard.check_and_record().is_ok());
        guard.record_server_throttle();

        clock.advance_ms(30_000);
        assert!(matches!(
            guard.check_and_record(),
            Err(Error::RetryAfter(30))
        ));

        clock.advance_ms(30_000);
        assert!(guard.check_and_record().is_ok());
    }

    #[test]
    fn retry_after_cap() {
        assert_eq!(AttemptGuard::cap_retry_after(30), 30);
        assert_eq!(AttemptGuard::cap_retry_after(600), 600);
        assert_eq!(AttemptGuard::cap_retry_after(86_400), 600);
    }
}
