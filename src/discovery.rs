use heapless::Vec;

use crate::bd_addr::BdAddr;
use crate::config::MAX_DISCOVERED;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeerDiscoveryEntry {
    pub addr: BdAddr,
    pub clock_offset: u16,
    pub page_scan_mode: u8,
}

/// Inquiry results of the current scan, in the order they were seen.
#[derive(Debug, Default)]
pub struct DiscoveryCache<const N: usize = MAX_DISCOVERED> {
    entries: Vec<PeerDiscoveryEntry, N>,
}

impl<const N: usize> DiscoveryCache<N> {
    pub const fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// First sighting of an address wins. Returns false when the entry was
    /// not stored, either because it is known already or the cache is full.
    pub fn append_if_new(&mut self, entry: PeerDiscoveryEntry) -> bool {
        if self.entries.iter().any(|e| e.addr == entry.addr) {
            return false;
        }
        self.entries.push(entry).is_ok()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn get(&self, index: usize) -> Option<&PeerDiscoveryEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.is_full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(last: u8) -> PeerDiscoveryEntry {
        PeerDiscoveryEntry {
            addr: BdAddr([last, 0, 0, 0, 0, 0xAA]),
            clock_offset: 0x1234,
            page_scan_mode: 1,
        }
    }

    #[test]
    fn test_duplicates_keep_first() {
        let mut cache: DiscoveryCache = DiscoveryCache::new();
        assert!(cache.append_if_new(entry(1)));
        let mut dup = entry(1);
        dup.clock_offset = 0;
        assert!(!cache.append_if_new(dup));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(0).unwrap().clock_offset, 0x1234);
    }

    #[test]
    fn test_saturates() {
        let mut cache = DiscoveryCache::<2>::new();
        assert!(cache.append_if_new(entry(1)));
        assert!(cache.append_if_new(entry(2)));
        assert!(cache.is_full());
        assert!(!cache.append_if_new(entry(3)));
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.append_if_new(entry(3)));
    }
}
