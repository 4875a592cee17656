//! Flat spoofing-belief store: one generation, keyed by source address.

use super::entry::Entry;
use std::collections::HashMap;
use std::net::Ipv4Addr;

/// A mapping from address to spoofing belief. Lookup of an absent key
/// returns the sentinel default without inserting it.
#[derive(Debug, Clone, Default)]
pub struct Store {
    entries: HashMap<Ipv4Addr, Entry>,
}

impl Store {
    pub fn new() -> Self {
        Store::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        self.entries.contains_key(&addr)
    }

    /// Looks up `addr`, returning the sentinel default on a miss without
    /// materializing the key.
    pub fn get(&self, addr: Ipv4Addr) -> Entry {
        self.entries.get(&addr).copied().unwrap_or_default()
    }

    /// Merges `entry` into the store at `addr` using the scalar merge rule.
    pub fn merge(&mut self, addr: Ipv4Addr, entry: Entry) {
        self.entries
            .entry(addr)
            .and_modify(|existing| existing.merge(entry))
            .or_insert(entry);
    }

    /// Folds every entry of `other` into `self`.
    pub fn merge_store(&mut self, other: &Store) {
        for (&addr, &entry) in other.entries.iter() {
            self.merge(addr, entry);
        }
    }

    /// Removes every entry matching `predicate`, in place.
    pub fn remove_if<F>(&mut self, mut predicate: F)
    where
        F: FnMut(Ipv4Addr, Entry) -> bool,
    {
        self.entries.retain(|&addr, &mut entry| !predicate(addr, entry));
    }

    pub fn iter(&self) -> impl Iterator<Item = (Ipv4Addr, Entry)> + '_ {
        self.entries.iter().map(|(&a, &e)| (a, e))
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
    fn miss_returns_sentinel_without_insert() {
        let store = Store::new();
        assert_eq!(store.get(addr(1)), Entry::sentinel());
        assert!(!store.contains(addr(1)));
    }

    #[test]
    fn merge_scenario_from_spec() {
        let mut store = Store::new();
        store.merge(addr(23), Entry::new(Timestamp::from_millis(1), true));
        store.merge(addr(23), Entry::new(Timestamp::from_millis(1), false));
        assert_eq!(
            store.get(addr(23)),
            Entry::new(Timestamp::from_millis(1), false)
        );

        store.merge(addr(23), Entry::new(Timestamp::from_millis(3), true));
        assert_eq!(
            store.get(addr(23)),
            Entry::new(Timestamp::from_millis(3), true)
        );

        store.merge(addr(23), Entry::new(Timestamp::from_millis(1), false));
        assert_eq!(
            store.get(addr(23)),
            Entry::new(Timestamp::from_millis(3), true)
        );
    }

    #[test]
    fn merge_idempotence() {
        let mut store = Store::new();
        let e = Entry::new(Timestamp::from_millis(5), true);
        store.merge(addr(1), e);
        let snapshot = store.get(addr(1));
        store.merge(addr(1), e);
        assert_eq!(store.get(addr(1)), snapshot);
    }

    #[test]
    fn remove_if_erases_matching_entries() {
        let mut store = Store::new();
        store.merge(addr(1), Entry::new(Timestamp::from_millis(1), true));
        store.merge(addr(2), Entry::new(Timestamp::from_millis(1), false));
        store.remove_if(|_, e| !e.consistent);
        assert!(store.contains(addr(1)));
        assert!(!store.contains(addr(2)));
    }
}
