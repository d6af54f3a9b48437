//! Bounded Map Module
//!
//! Insertion-ordered map with a fixed capacity and FIFO eviction.

use std::collections::{HashMap, VecDeque};

// == Bounded Map ==
/// Keyed storage that never holds more than `capacity` entries.
///
/// Keys are tracked in a VecDeque where:
/// - Front = Oldest inserted
/// - Back = Newest inserted
///
/// Overwriting an existing key keeps its original position. Reads do not
/// reorder anything.
#[derive(Debug)]
pub struct BoundedMap<V> {
    entries: HashMap<String, V>,
    order: VecDeque<String>,
    capacity: usize,
}

impl<V> BoundedMap<V> {
    // == Constructor ==
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    // == Insert ==
    /// Inserts or overwrites `key`.
    ///
    /// A new key arriving at capacity first evicts the oldest entry, which is
    /// returned so callers can log it.
    pub fn insert(&mut self, key: &str, value: V) -> Option<(String, V)> {
        if let Some(slot) = self.entries.get_mut(key) {
            *slot = value;
            return None;
        }

        let evicted = if self.entries.len() >= self.capacity {
            self.evict_oldest()
        } else {
            None
        };

        self.entries.insert(key.to_string(), value);
        self.order.push_back(key.to_string());
        evicted
    }

    // == Get ==
    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.entries.get_mut(key)
    }

    // == Remove ==
    pub fn remove(&mut self, key: &str) -> Option<V> {
        let value = self.entries.remove(key)?;
        self.order.retain(|k| k != key);
        Some(value)
    }

    /// Removes every entry matching `predicate`, returning how many went.
    pub fn remove_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&V) -> bool,
    {
        let doomed: Vec<String> = self
            .order
            .iter()
            .filter(|k| self.entries.get(*k).is_some_and(&mut predicate))
            .cloned()
            .collect();

        for key in &doomed {
            self.remove(key);
        }
        doomed.len()
    }

    // == Evict Oldest ==
    /// Removes and returns the earliest inserted entry.
    pub fn evict_oldest(&mut self) -> Option<(String, V)> {
        let key = self.order.pop_front()?;
        let value = self.entries.remove(&key)?;
        Some((key, value))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_map_is_empty() {
        let map: BoundedMap<u32> = BoundedMap::new(3);
        assert!(map.is_empty());
        assert_eq!(map.len(), 0);
    }

    #[test]
    fn test_insert_beyond_capacity_evicts_oldest() {
        let mut map = BoundedMap::new(3);
        assert!(map.insert("a", 1).is_none());
        assert!(map.insert("b", 2).is_none());
        assert!(map.insert("c", 3).is_none());
        assert_eq!(map.len(), 3);

        let evicted = map.insert("d", 4);
        assert_eq!(evicted, Some(("a".to_string(), 1)));
        assert_eq!(map.len(), 3);
        assert!(!map.contains("a"));
        assert!(map.contains("d"));
    }

    #[test]
    fn test_overwrite_keeps_position() {
        let mut map = BoundedMap::new(2);
        map.insert("a", 1);
        map.insert("b", 2);

        // Overwrite 'a'; it stays oldest
        assert!(map.insert("a", 10).is_none());
        assert_eq!(map.get("a"), Some(&10));

        let evicted = map.insert("c", 3);
        assert_eq!(evicted, Some(("a".to_string(), 10)));
    }

    #[test]
    fn test_reads_do_not_reorder() {
        let mut map = BoundedMap::new(2);
        map.insert("a", 1);
        map.insert("b", 2);
        assert_eq!(map.get("a"), Some(&1));

        map.insert("c", 3);
        assert!(!map.contains("a"));
        assert!(map.contains("b"));
    }

    #[test]
    fn test_remove() {
        let mut map = BoundedMap::new(3);
        map.insert("a", 1);
        map.insert("b", 2);

        assert_eq!(map.remove("a"), Some(1));
        assert_eq!(map.remove("a"), None);
        assert_eq!(map.len(), 1);
        assert_eq!(map.evict_oldest(), Some(("b".to_string(), 2)));
        assert_eq!(map.evict_oldest(), None);
    }

    #[test]
    fn test_remove_where() {
        let mut map = BoundedMap::new(5);
        for (i, key) in ["a", "b", "c", "d"].iter().enumerate() {
            map.insert(key, i);
        }

        let removed = map.remove_where(|v| v % 2 == 0);
        assert_eq!(removed, 2);
        assert!(!map.contains("a"));
        assert!(map.contains("b"));
        assert!(!map.contains("c"));
        assert!(map.contains("d"));
    }

    #[test]
    fn test_clear() {
        let mut map = BoundedMap::new(2);
        map.insert("a", 1);
        map.clear();
        assert!(map.is_empty());
        assert_eq!(map.evict_oldest(), None);
    }
}
