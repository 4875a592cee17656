//! Wall-clock timestamps with millisecond resolution.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A point in wall-clock time, stored as milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    pub const EPOCH: Timestamp = Timestamp(0);

    pub fn from_millis(millis: i64) -> Self {
        Timestamp(millis)
    }

    pub fn now() -> Self {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp(since_epoch.as_millis() as i64)
    }

    /// Builds a timestamp from a `(seconds, microseconds)` pair, as delivered
    /// by capture metadata.
    pub fn from_secs_micros(secs: i64, micros: i64) -> Self {
        Timestamp(secs * 1000 + micros / 1000)
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }

    /// Splits back into `(seconds, microseconds)`.
    pub fn as_secs_micros(&self) -> (i64, i64) {
        let secs = self.0.div_euclid(1000);
        let millis_rem = self.0.rem_euclid(1000);
        (secs, millis_rem * 1000)
    }

    pub fn unix_secs(&self) -> i64 {
        self.0.div_euclid(1000)
    }

    /// The Unix timestamp (in seconds) of the start of the hour this
    /// timestamp falls into.
    pub fn hour_bucket(&self) -> i64 {
        let secs = self.unix_secs();
        secs - secs.rem_euclid(3600)
    }

    pub fn checked_add(&self, d: Duration) -> Option<Self> {
        self.0.checked_add(d.as_millis() as i64).map(Timestamp)
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Timestamp::EPOCH
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secs_micros_round_trip() {
        let ts = Timestamp::from_secs_micros(1_700_000_000, 500_000);
        let (secs, micros) = ts.as_secs_micros();
        assert_eq!(secs, 1_700_000_000);
        assert_eq!(micros, 500_000);
    }

    #[test]
    fn hour_bucket_floors_to_hour_start() {
        let ts = Timestamp::from_secs_micros(3661, 0);
        assert_eq!(ts.hour_bucket(), 3600);
        let ts2 = Timestamp::from_secs_micros(3599, 0);
        assert_eq!(ts2.hour_bucket(), 0);
    }

    #[test]
    fn ordering_is_by_millis() {
        let a = Timestamp::from_millis(10);
        let b = Timestamp::from_millis(20);
        assert!(a < b);
    }
}
