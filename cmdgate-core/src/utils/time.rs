// File: cmdgate-core/src/utils/time.rs

use std::time::Duration;

use chrono::{DateTime, Utc};
use cmdgate_common::traits::Clock;

/// Wall clock backed by `Utc::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Time left from `now` until `then`, or `None` once `now >= then`.
pub fn remaining(now: DateTime<Utc>, then: DateTime<Utc>) -> Option<Duration> {
    if now >= then {
        return None;
    }
    then.signed_duration_since(now).to_std().ok()
}

/// Converts a positive seconds setting into a duration; anything `<= 0` means "none".
pub fn positive_secs(secs: i64) -> Option<Duration> {
    if secs > 0 {
        Some(Duration::from_secs(secs as u64))
    } else {
        None
    }
}

/// `at + d`, saturating instead of panicking on absurd durations.
pub fn add_std(at: DateTime<Utc>, d: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(d)
        .ok()
        .and_then(|cd| at.checked_add_signed(cd))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
