//! Time source for upload timestamps.
//!
//! Storage paths embed the upload timestamp, so two uploads must never observe
//! the same instant. `SystemClock` guarantees that within a process by never
//! returning a value less than or equal to the previous one.

use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// Provides the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock, strictly increasing at nanosecond resolution.
#[derive(Debug, Default)]
pub struct SystemClock {
    last_nanos: AtomicI64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        let wall = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX - 1);
        let mut prev = self.last_nanos.load(Ordering::Relaxed);
        loop {
            let next = wall.max(prev + 1);
            match self.last_nanos.compare_exchange_weak(
                prev,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Utc.timestamp_nanos(next),
                Err(actual) => prev = actual,
            }
        }
    }
}

/// Clock pinned to one instant. For tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
