//! Wall-clock access for the ledger.
//!
//! Stores and the recorder read time through [`Clock`] so timestamps and
//! generated token ids are reproducible under test.

use std::sync::Mutex;

use chrono::{DateTime, Duration, TimeZone, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn at_unix(secs: i64) -> Self {
        let now = Utc.timestamp_opt(secs, 0).single().unwrap_or_else(Utc::now);
        Self { now: Mutex::new(now) }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *now = *now + by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Get current timestamp in milliseconds (UTC)
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
