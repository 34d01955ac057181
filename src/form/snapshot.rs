//! Per-account cache of the section values currently being edited

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::schema::{SectionSnapshot, SectionValue};

struct Entry {
    sections: SectionSnapshot,
    touched: Instant,
}

/// In-memory section values keyed by account id, with a TTL and a bound on
/// the number of accounts held
pub struct SnapshotCache {
    entries: RwLock<HashMap<String, Entry>>,
    ttl: Duration,
    capacity: usize,
}

impl SnapshotCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            capacity: capacity.max(1),
        }
    }

    /// Record the current value of one section
    pub fn record(&self, account_id: &str, value: &SectionValue) {
        let now = Instant::now();
        let mut entries = match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.evict_expired(&mut entries, now);

        if !entries.contains_key(account_id) && entries.len() >= self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.touched)
                .map(|(id, _)| id.clone());
            if let Some(id) = oldest {
                log::debug!("snapshot cache full, evicting account {}", id);
                entries.remove(&id);
            }
        }

        let entry = entries.entry(account_id.to_string()).or_insert_with(|| Entry {
            sections: SectionSnapshot::new(),
            touched: now,
        });
        entry.sections.insert(value.key(), value.clone());
        entry.touched = now;
    }

    /// Current values for the account, if any are cached and fresh
    pub fn get(&self, account_id: &str) -> Option<SectionSnapshot> {
        let entries = match self.entries.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries
            .get(account_id)
            .filter(|entry| entry.touched.elapsed() < self.ttl)
            .map(|entry| entry.sections.clone())
    }

    /// Forget everything held for the account
    pub fn clear(&self, account_id: &str) {
        let mut entries = match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.remove(account_id);
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn evict_expired(&self, entries: &mut HashMap<String, Entry>, now: Instant) {
        let ttl = self.ttl;
        entries.retain(|id, entry| {
            let fresh = now.duration_since(entry.touched) < ttl;
            if !fresh {
                log::debug!("snapshot for account {} expired", id);
            }
            fresh
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SectionKey;

    #[test]
    fn records_sections_per_account() {
        let cache = SnapshotCache::new(Duration::from_secs(60), 8);
        cache.record("a", &SectionValue::empty(SectionKey::Work));
        cache.record("a", &SectionValue::empty(SectionKey::Profile));
        cache.record("b", &SectionValue::empty(SectionKey::Work));

        let a = cache.get("a").unwrap();
        assert_eq!(a.len(), 2);
        assert!(a.contains_key(&SectionKey::Profile));
        assert_eq!(cache.len(), 2);

        cache.clear("a");
        assert!(cache.get("a").is_none());
    }

    #[test]
    fn capacity_evicts_least_recently_touched() {
        let cache = SnapshotCache::new(Duration::from_secs(60), 2);
        cache.record("a", &SectionValue::empty(SectionKey::Work));
        std::thread::sleep(Duration::from_millis(2));
        cache.record("b", &SectionValue::empty(SectionKey::Work));
        std::thread::sleep(Duration::from_millis(2));
        cache.record("c", &SectionValue::empty(SectionKey::Work));

        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn expired_entries_are_not_returned() {
        let cache = SnapshotCache::new(Duration::ZERO, 8);
        cache.record("a", &SectionValue::empty(SectionKey::Work));
        assert!(cache.get("a").is_none());
    }
}
