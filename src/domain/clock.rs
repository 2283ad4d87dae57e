//! Wall-clock and timezone resolution.
//!
//! Everything that decides "which calendar day is it" goes through this
//! module so the scheduling logic is a pure function of (instant, zone).
//! An unknown IANA zone name falls back to UTC rather than erroring:
//! scheduling must always produce an answer.

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;
use log::warn;
use std::sync::{Arc, Mutex};

/// Source of the current instant. Services hold this behind an `Arc` so
/// tests can substitute a fixed clock and move it across day boundaries.
pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests and replays.
#[derive(Debug, Clone)]
pub struct FixedClock {
    instant: Arc<Mutex<DateTime<Utc>>>,
}

impl FixedClock {
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self {
            instant: Arc::new(Mutex::new(instant)),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.instant.lock().unwrap() = instant;
    }
}

impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.instant.lock().unwrap()
    }
}

/// Parse an IANA zone name, falling back to UTC for anything unknown.
pub fn resolve_tz(tz: &str) -> Tz {
    tz.parse().unwrap_or_else(|_| {
        warn!("Unknown timezone {:?}, falling back to UTC", tz);
        Tz::UTC
    })
}

/// Today's calendar date in the given zone.
pub fn today(now: DateTime<Utc>, tz: &str) -> NaiveDate {
    now.with_timezone(&resolve_tz(tz)).date_naive()
}

/// Day of week in the given zone, 0-6 with Sunday = 0.
pub fn weekday_index(now: DateTime<Utc>, tz: &str) -> u8 {
    now.with_timezone(&resolve_tz(tz))
        .weekday()
        .num_days_from_sunday() as u8
}

/// Current wall-clock time in the given zone as a zero-padded "HH:MM"
/// string. Zero-padded 24h strings order correctly under lexicographic
/// comparison, which is how routine times are compared throughout.
pub fn clock_time(now: DateTime<Utc>, tz: &str) -> String {
    let local = now.with_timezone(&resolve_tz(tz));
    format!("{:02}:{:02}", local.hour(), local.minute())
}

/// Check that a routine time string has the "HH:MM" shape.
pub fn is_valid_clock_time(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.len() != 5 || bytes[2] != b':' {
        return false;
    }
    let hour: u32 = match s[0..2].parse() {
        Ok(h) => h,
        Err(_) => return false,
    };
    let minute: u32 = match s[3..5].parse() {
        Ok(m) => m,
        Err(_) => return false,
    };
    hour < 24 && minute < 60
}
