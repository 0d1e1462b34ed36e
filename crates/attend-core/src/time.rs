//! Time source abstraction
//!
//! Every wait in the terminal (settle delays, retry backoff, reply timeouts and
//! the template drain) goes through [`Clock`] so tests can run the state
//! machine against virtual time.

use core::future::Future;

/// Monotonic millisecond clock with a cooperative sleep.
pub trait Clock {
    /// Milliseconds since an arbitrary fixed point (usually boot).
    fn now_ms(&self) -> u64;

    /// Yield to other cooperative work for `ms` milliseconds.
    fn sleep_ms(&self, ms: u32) -> impl Future<Output = ()>;
}

impl<C: Clock> Clock for &C {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }

    fn sleep_ms(&self, ms: u32) -> impl Future<Output = ()> {
        (**self).sleep_ms(ms)
    }
}

/// Wall-clock limit measured from the moment it was started.
///
/// A deadline without a limit never expires; it models the operator-paced
/// waits during enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    started_at_ms: u64,
    limit_ms: Option<u32>,
}

impl Deadline {
    /// Start a deadline that expires `limit_ms` after now.
    pub fn after<C: Clock>(clock: &C, limit_ms: u32) -> Self {
        Self::optional(clock, Some(limit_ms))
    }

    /// Start a deadline that only expires when a limit is given.
    pub fn optional<C: Clock>(clock: &C, limit_ms: Option<u32>) -> Self {
        Self {
            started_at_ms: clock.now_ms(),
            limit_ms,
        }
    }

    /// Milliseconds elapsed since the deadline was started.
    pub fn elapsed_ms<C: Clock>(&self, clock: &C) -> u64 {
        clock.now_ms().saturating_sub(self.started_at_ms)
    }

    /// True once the elapsed time has reached the limit.
    pub fn expired<C: Clock>(&self, clock: &C) -> bool {
        match self.limit_ms {
            Some(limit) => self.elapsed_ms(clock) >= u64::from(limit),
            None => false,
        }
    }

    pub fn limit_ms(&self) -> Option<u32> {
        self.limit_ms
    }
}

#[cfg(feature = "embassy")]
pub use embassy_clock::EmbassyClock;

#[cfg(feature = "embassy")]
mod embassy_clock {
    use super::Clock;

    /// [`Clock`] backed by the embassy time driver.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct EmbassyClock;

    impl Clock for EmbassyClock {
        fn now_ms(&self) -> u64 {
            embassy_time::Instant::now().as_millis()
        }

        async fn sleep_ms(&self, ms: u32) {
            embassy_time::Timer::after_millis(u64::from(ms)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ManualClock;

    #[test]
    fn test_deadline_expires_at_limit() {
        let clock = ManualClock::new();
        let deadline = Deadline::after(&clock, 3000);

        clock.advance(2999);
        assert!(!deadline.expired(&clock));

        clock.advance(1);
        assert!(deadline.expired(&clock));
        assert_eq!(deadline.elapsed_ms(&clock), 3000);
    }

    #[test]
    fn test_unbounded_deadline_never_expires() {
        let clock = ManualClock::new();
        let deadline = Deadline::optional(&clock, None);

        clock.advance(u32::MAX as u64);
        assert!(!deadline.expired(&clock));
        assert_eq!(deadline.limit_ms(), None);
    }
}
