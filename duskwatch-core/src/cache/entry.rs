//! The per-address spoofing belief entry and its merge rule.

use crate::time::Timestamp;

/// One address's spoofing belief: `consistent == true` means the address has
/// not been observed to be spoofed; `false` means unknown or suspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub ts: Timestamp,
    pub consistent: bool,
}

impl Entry {
    pub fn new(ts: Timestamp, consistent: bool) -> Self {
        Entry { ts, consistent }
    }

    /// The sentinel returned for an address with no entry: oldest possible
    /// timestamp, and "suspected" rather than "clean" by default.
    pub fn sentinel() -> Self {
        Entry {
            ts: Timestamp::EPOCH,
            consistent: false,
        }
    }

    /// Merges `other` into `self` in place, following the newer-timestamp-
    /// wins rule with an AND on exact ties.
    pub fn merge(&mut self, other: Entry) {
        if other.ts > self.ts {
            *self = other;
        } else if other.ts == self.ts {
            self.consistent = self.consistent && other.consistent;
        }
        // older timestamp: no change
    }
}

impl Default for Entry {
    fn default() -> Self {
        Entry::sentinel()
    }
}
