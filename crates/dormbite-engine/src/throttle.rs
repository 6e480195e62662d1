// SPDX-FileCopyrightText: 2026 Dormbite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keyed minimum-interval gates driven by event timestamps.

use std::hash::Hash;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

/// Lets at most one event per key through every `interval`.
///
/// Timestamps come from the events themselves, so tests can replay a
/// sequence without sleeping.
#[derive(Debug)]
pub struct Throttle<K: Eq + Hash> {
    interval: Duration,
    last: DashMap<K, DateTime<Utc>>,
}

impl<K: Eq + Hash> Throttle<K> {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: DashMap::new(),
        }
    }

    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX / 1000)))
    }

    /// Returns true and records `now` when the key's interval has elapsed.
    pub fn allow(&self, key: K, now: DateTime<Utc>) -> bool {
        let mut entry = self.last.entry(key).or_insert(DateTime::<Utc>::MIN_UTC);
        if now.signed_duration_since(*entry) < self.interval {
            return false;
        }
        *entry = now;
        true
    }

    pub fn forget(&self, key: &K) {
        self.last.remove(key);
    }

    pub fn clear(&self) {
        self.last.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn second_event_inside_interval_is_dropped() {
        let t = Throttle::from_secs(5);
        assert!(t.allow((1, 2), at(0)));
        assert!(!t.allow((1, 2), at(3)));
        assert!(t.allow((1, 2), at(5)));
    }

    #[test]
    fn keys_are_independent() {
        let t = Throttle::from_secs(5);
        assert!(t.allow("a", at(0)));
        assert!(t.allow("b", at(1)));
        assert!(!t.allow("a", at(1)));
    }

    #[test]
    fn dropped_event_does_not_extend_the_window() {
        let t = Throttle::from_secs(20);
        assert!(t.allow(7, at(0)));
        assert!(!t.allow(7, at(19)));
        assert!(t.allow(7, at(20)));
    }

    #[test]
    fn forget_reopens_the_gate() {
        let t = Throttle::from_secs(300);
        assert!(t.allow(7, at(0)));
        t.forget(&7);
        assert!(t.allow(7, at(1)));
    }
}
