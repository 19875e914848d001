use std::collections::{HashMap, VecDeque};

use super::CachedData;

/// Bounded in-process tier.
///
/// Eviction is by insertion order, not recency: once the cap is exceeded
/// the oldest inserted key goes. Overwriting a key keeps its position.
#[derive(Debug)]
pub struct MemoryTier<T> {
    entries: HashMap<String, CachedData<T>>,
    order: VecDeque<String>,
    capacity: usize,
}

impl<T> MemoryTier<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn get(&self, key: &str) -> Option<&CachedData<T>> {
        self.entries.get(key)
    }

    /// Insert an entry, returning the keys evicted to make room.
    pub fn insert(&mut self, key: String, value: CachedData<T>) -> Vec<String> {
        if self.entries.insert(key.clone(), value).is_none() {
            self.order.push_back(key);
        }

        let mut evicted = Vec::new();
        while self.entries.len() > self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                    evicted.push(oldest);
                }
                None => break,
            }
        }
        evicted
    }

    pub fn remove(&mut self, key: &str) -> Option<CachedData<T>> {
        let removed = self.entries.remove(key);
        if removed.is_some() {
            self.order.retain(|k| k != key);
        }
        removed
    }

    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        self.order.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn data(n: i32) -> CachedData<i32> {
        CachedData::new(n, Utc::now())
    }

    #[test]
    fn test_evicts_oldest_inserted() {
        let mut tier = MemoryTier::new(2);
        assert!(tier.insert("a".to_string(), data(1)).is_empty());
        assert!(tier.insert("b".to_string(), data(2)).is_empty());

        // Reading does not refresh position.
        assert!(tier.get("a").is_some());

        let evicted = tier.insert("c".to_string(), data(3));
        assert_eq!(evicted, vec!["a".to_string()]);
        assert!(tier.get("a").is_none());
        assert_eq!(tier.len(), 2);
    }

    #[test]
    fn test_overwrite_keeps_position() {
        let mut tier = MemoryTier::new(2);
        tier.insert("a".to_string(), data(1));
        tier.insert("b".to_string(), data(2));
        tier.insert("a".to_string(), data(10));

        assert_eq!(tier.get("a").map(|c| c.data), Some(10));
        let evicted = tier.insert("c".to_string(), data(3));
        assert_eq!(evicted, vec!["a".to_string()]);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut tier = MemoryTier::new(5);
        tier.insert("a".to_string(), data(1));
        tier.insert("b".to_string(), data(2));

        assert!(tier.remove("a").is_some());
        assert!(tier.remove("a").is_none());
        assert_eq!(tier.clear(), 1);
        assert!(tier.is_empty());
    }
}
