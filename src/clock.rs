//! Commit timestamps.
//!
//! The ledger reads time through the [`Clock`] trait so tests can pin
//! timestamps (and therefore commit hashes). [`SystemClock`] never hands out
//! the same millisecond twice, even if the wall clock stalls or steps back.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of commit timestamps, in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Return the next timestamp.
    fn now_ms(&self) -> u64;
}

/// Wall clock, strictly increasing across calls.
#[derive(Debug, Default)]
pub struct SystemClock {
    last: AtomicU64,
}

impl SystemClock {
    /// Create a new clock.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last: AtomicU64::new(0),
        }
    }

    fn wall_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        let wall = Self::wall_ms();
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let next = wall.max(prev + 1);
            match self
                .last
                .compare_exchange_weak(prev, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }
}

/// A clock that ticks by a fixed step from a fixed start. For tests and
/// reproducible imports.
#[derive(Debug)]
pub struct ManualClock {
    next: AtomicU64,
    step: u64,
}

impl ManualClock {
    /// Start at `start`, advancing by `step` on every read.
    #[must_use]
    pub const fn new(start: u64, step: u64) -> Self {
        Self {
            next: AtomicU64::new(start),
            step,
        }
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.next.fetch_add(self.step, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_strictly_increasing() {
        let clock = SystemClock::new();
        let mut prev = clock.now_ms();
        for _ in 0..1_000 {
            let next = clock.now_ms();
            assert!(next > prev);
            prev = next;
        }
    }

    #[test]
    fn manual_clock_steps() {
        let clock = ManualClock::new(100, 10);
        assert_eq!(clock.now_ms(), 100);
        assert_eq!(clock.now_ms(), 110);
    }
}
