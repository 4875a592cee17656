//! Rotating spoofing store: an ordered sequence of flat-store generations,
//! generation 0 newest. "Newest generation wins" on lookup — see
//! `rotate()` for the eviction side of that rule.

use super::entry::Entry;
use super::store::Store;
use std::net::Ipv4Addr;

#[derive(Debug, Clone)]
pub struct RotatingStore {
    generations: Vec<Store>,
}

impl RotatingStore {
    pub fn new() -> Self {
        RotatingStore {
            generations: vec![Store::new()],
        }
    }

    pub fn generation_count(&self) -> usize {
        self.generations.len()
    }

    /// Sum of per-generation sizes. Duplicate keys across generations each
    /// count once per occurrence.
    pub fn size(&self) -> usize {
        self.generations.iter().map(Store::len).sum()
    }

    /// Always writes to generation 0.
    pub fn insert(&mut self, addr: Ipv4Addr, entry: Entry) {
        self.generations[0].merge(addr, entry);
    }

    /// Scans generations newest-first (0, 1, 2, …) and returns the first
    /// hit, or the sentinel default if no generation has the address.
    pub fn get(&self, addr: Ipv4Addr) -> Entry {
        for gen in &self.generations {
            if gen.contains(addr) {
                return gen.get(addr);
            }
        }
        Entry::sentinel()
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        self.generations.iter().any(|g| g.contains(addr))
    }

    /// Prepends a fresh empty generation at index 0, pushing every existing
    /// generation one slot older, and truncates to at most `max`
    /// generations (oldest dropped first).
    pub fn rotate(&mut self, max: usize) {
        let max = max.max(1);
        self.generations.insert(0, Store::new());
        self.generations.truncate(max);
    }
}

impl Default for RotatingStore {
    fn default() -> Self {
        RotatingStore::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::Timestamp;

    fn addr(n: u8) -> Ipv4Addr {
        Ipv4Addr::new(10, 0, 0, n)
    }

    #[test]
    fn rotating_store_eviction_scenario() {
        let mut store = RotatingStore::new();
        store.insert(addr(1), Entry::new(Timestamp::from_millis(1), true)); // addr_A
        store.rotate(2);
        store.insert(addr(2), Entry::new(Timestamp::from_millis(2), true)); // addr_B
        store.rotate(2);

        assert_eq!(store.get(addr(1)), Entry::sentinel());
        assert_eq!(store.get(addr(2)), Entry::new(Timestamp::from_millis(2), true));
        assert_eq!(store.size(), 1);
    }

    #[test]
    fn newest_generation_wins_on_lookup() {
        let mut store = RotatingStore::new();
        store.insert(addr(1), Entry::new(Timestamp::from_millis(1), false));
        store.rotate(3);
        store.insert(addr(1), Entry::new(Timestamp::from_millis(2), true));
        // Both generations have addr(1); generation 0 (newest write) must win.
        assert_eq!(store.get(addr(1)), Entry::new(Timestamp::from_millis(2), true));
    }

    #[test]
    fn always_has_at_least_one_generation() {
        let mut store = RotatingStore::new();
        store.rotate(0);
        assert!(store.generation_count() >= 1);
    }
}
