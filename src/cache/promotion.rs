//! Hit Promotion Queue
//!
//! Write-back queue for "this entry is now a confirmed hit" bookkeeping.
//! Backends schedule promotions on read and drain them at their flush
//! points (next fetch, save, teardown) instead of writing on every lookup.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

// == Promotion ==
/// What a backend must do for one drained key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Promotion {
    /// The entry expired while queued; delete it.
    Expired(String),
    /// Rewrite the entry with its hit flag set.
    Promote(String),
}

// == Promotion Queue ==
/// Pending promotions keyed by cache key, each with the entry's expiration.
#[derive(Debug, Default)]
pub struct PromotionQueue {
    pending: HashMap<String, Option<DateTime<Utc>>>,
}

impl PromotionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `key`; re-scheduling only refreshes the tracked expiration.
    pub fn schedule(&mut self, key: &str, expiration: Option<DateTime<Utc>>) {
        self.pending.insert(key.to_string(), expiration);
    }

    /// Drops `key` without acting on it. Returns whether it was queued.
    pub fn cancel(&mut self, key: &str) -> bool {
        self.pending.remove(key).is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.pending.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    // == Drain ==
    /// Empties the queue, classifying each key against `now`.
    ///
    /// Output is sorted by key so flushes are deterministic.
    pub fn drain(&mut self, now: DateTime<Utc>) -> Vec<Promotion> {
        let mut drained: Vec<Promotion> = self
            .pending
            .drain()
            .map(|(key, expiration)| match expiration {
                Some(at) if now >= at => Promotion::Expired(key),
                _ => Promotion::Promote(key),
            })
            .collect();
        drained.sort_by(|a, b| promotion_key(a).cmp(promotion_key(b)));
        drained
    }
}

fn promotion_key(promotion: &Promotion) -> &str {
    match promotion {
        Promotion::Expired(key) | Promotion::Promote(key) => key,
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_schedule_and_cancel() {
        let mut queue = PromotionQueue::new();
        queue.schedule("a", None);
        queue.schedule("a", None);
        assert_eq!(queue.len(), 1);
        assert!(queue.contains("a"));

        assert!(queue.cancel("a"));
        assert!(!queue.cancel("a"));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drain_classifies_by_expiration() {
        let now = Utc::now();
        let mut queue = PromotionQueue::new();
        queue.schedule("live", Some(now + Duration::minutes(5)));
        queue.schedule("forever", None);
        queue.schedule("stale", Some(now - Duration::seconds(1)));

        let drained = queue.drain(now);
        assert_eq!(
            drained,
            vec![
                Promotion::Promote("forever".to_string()),
                Promotion::Promote("live".to_string()),
                Promotion::Expired("stale".to_string()),
            ]
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drain_boundary_is_expired() {
        let now = Utc::now();
        let mut queue = PromotionQueue::new();
        queue.schedule("edge", Some(now));
        assert_eq!(queue.drain(now), vec![Promotion::Expired("edge".to_string())]);
    }

    #[test]
    fn test_drain_empty_queue() {
        let mut queue = PromotionQueue::new();
        assert!(queue.drain(Utc::now()).is_empty());
    }
}
