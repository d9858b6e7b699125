use std::sync::Mutex;

use chrono::{Duration, NaiveDateTime, Timelike, Utc};

/// Source of wall-clock time for everything that stamps rows.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> NaiveDateTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        truncate_to_micros(Utc::now().naive_utc())
    }
}

/// Manually driven clock for tests and replay tooling.
#[derive(Debug)]
pub struct FixedClock {
    current: Mutex<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    pub fn starting_now() -> Self {
        Self::new(truncate_to_micros(Utc::now().naive_utc()))
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard += by;
    }

    pub fn set(&self, to: NaiveDateTime) {
        let mut guard = self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = to;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Postgres keeps microseconds; dropping the rest keeps stored and in-memory values equal.
fn truncate_to_micros(value: NaiveDateTime) -> NaiveDateTime {
    value
        .with_nanosecond(value.nanosecond() / 1_000 * 1_000)
        .unwrap_or(value)
}
