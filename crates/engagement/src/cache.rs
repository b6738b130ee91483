//! Bounded, sharded TTL cache for per-channel state.
//!
//! Each shard is a `std::sync::Mutex` around a `HashMap`, held only for the
//! duration of one closure call. Entries idle for longer than the TTL are
//! treated as absent on access and removed by [`TtlCache::sweep`]. A pin
//! predicate can hold entries past their TTL and shield them from capacity
//! eviction.

use std::collections::HashMap;
use std::hash::{BuildHasher, Hash, RandomState};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

const DEFAULT_SHARDS: usize = 16;

struct Slot<V> {
    value: V,
    touched: Instant,
}

/// Keeps an entry alive while it returns `true` for the current instant.
pub type PinFn<V> = fn(&V, Instant) -> bool;

pub struct TtlCache<K, V> {
    shards: Vec<Mutex<HashMap<K, Slot<V>>>>,
    hasher: RandomState,
    ttl: Duration,
    max_per_shard: usize,
    pin: Option<PinFn<V>>,
}

impl<K: Hash + Eq + Clone, V> TtlCache<K, V> {
    /// `max_entries` is spread evenly over the shards (at least one per shard).
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self::with_shards(ttl, max_entries, DEFAULT_SHARDS)
    }

    pub fn with_shards(ttl: Duration, max_entries: usize, shards: usize) -> Self {
        let shards = shards.max(1);
        Self {
            shards: (0..shards).map(|_| Mutex::new(HashMap::new())).collect(),
            hasher: RandomState::new(),
            ttl,
            max_per_shard: max_entries.div_ceil(shards).max(1),
            pin: None,
        }
    }

    /// Never expire or evict an entry while `pin` holds for it.
    pub fn with_pin(mut self, pin: PinFn<V>) -> Self {
        self.pin = Some(pin);
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn shard(&self, key: &K) -> &Mutex<HashMap<K, Slot<V>>> {
        let idx = (self.hasher.hash_one(key) as usize) % self.shards.len();
        &self.shards[idx]
    }

    fn is_pinned(&self, slot: &Slot<V>, now: Instant) -> bool {
        self.pin.is_some_and(|pin| pin(&slot.value, now))
    }

    fn is_live(&self, slot: &Slot<V>, now: Instant) -> bool {
        now.saturating_duration_since(slot.touched) < self.ttl || self.is_pinned(slot, now)
    }

    /// Read-modify-write one entry atomically.
    ///
    /// The closure sees `None` for a missing or expired entry. Leaving
    /// `Some` stores the value and refreshes its timestamp; leaving `None`
    /// removes it.
    pub fn update<R>(&self, key: &K, now: Instant, f: impl FnOnce(&mut Option<V>) -> R) -> R {
        let mut shard = self.shard(key).lock().unwrap_or_else(|e| e.into_inner());

        let mut current = shard
            .remove(key)
            .filter(|slot| self.is_live(slot, now))
            .map(|slot| slot.value);

        let result = f(&mut current);

        if let Some(value) = current {
            if shard.len() >= self.max_per_shard {
                self.evict_oldest(&mut shard, now);
            }
            shard.insert(
                key.clone(),
                Slot {
                    value,
                    touched: now,
                },
            );
        }
        result
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.shard(key)
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key)
            .map(|slot| slot.value)
    }

    pub fn contains(&self, key: &K, now: Instant) -> bool {
        self.shard(key)
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .is_some_and(|slot| self.is_live(slot, now))
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn sweep(&self, now: Instant) -> usize {
        self.shards
            .iter()
            .map(|shard| {
                let mut shard = shard.lock().unwrap_or_else(|e| e.into_inner());
                let before = shard.len();
                shard.retain(|_, slot| self.is_live(slot, now));
                before - shard.len()
            })
            .sum()
    }

    /// Entry count, including expired entries not yet swept.
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.lock().unwrap_or_else(|e| e.into_inner()).len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop the least recently touched unpinned entry. A shard holding only
    /// pinned entries may briefly exceed its capacity.
    fn evict_oldest(&self, shard: &mut HashMap<K, Slot<V>>, now: Instant) {
        let oldest = shard
            .iter()
            .filter(|(_, slot)| !self.is_pinned(slot, now))
            .min_by_key(|(_, slot)| slot.touched)
            .map(|(k, _)| k.clone());
        if let Some(key) = oldest {
            shard.remove(&key);
        }
    }
}

impl<K: Hash + Eq + Clone, V: Clone> TtlCache<K, V> {
    pub fn get(&self, key: &K, now: Instant) -> Option<V> {
        self.shard(key)
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .filter(|slot| self.is_live(slot, now))
            .map(|slot| slot.value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> TtlCache<String, u32> {
        TtlCache::new(Duration::from_secs(60), 100)
    }

    fn bump(cache: &TtlCache<String, u32>, key: &str, now: Instant) -> u32 {
        cache.update(&key.to_string(), now, |slot| {
            let v = slot.get_or_insert(0);
            *v += 1;
            *v
        })
    }

    #[tokio::test(start_paused = true)]
    async fn update_creates_and_mutates() {
        let cache = cache();
        let now = Instant::now();
        assert_eq!(bump(&cache, "a", now), 1);
        assert_eq!(bump(&cache, "a", now), 2);
        assert_eq!(cache.get(&"a".to_string(), now), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn setting_none_removes() {
        let cache = cache();
        let now = Instant::now();
        bump(&cache, "a", now);
        cache.update(&"a".to_string(), now, |slot| *slot = None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entries_read_as_absent() {
        let cache = cache();
        bump(&cache, "a", Instant::now());

        tokio::time::advance(Duration::from_secs(61)).await;
        let now = Instant::now();
        assert!(cache.get(&"a".to_string(), now).is_none());
        assert!(!cache.contains(&"a".to_string(), now));
        // Lazy expiry: a fresh value starts over.
        assert_eq!(bump(&cache, "a", now), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_removes_only_stale() {
        let cache = cache();
        bump(&cache, "old", Instant::now());
        tokio::time::advance(Duration::from_secs(45)).await;
        bump(&cache, "new", Instant::now());
        tokio::time::advance(Duration::from_secs(30)).await;

        assert_eq!(cache.sweep(Instant::now()), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&"new".to_string(), Instant::now()).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn capacity_evicts_least_recently_touched() {
        let cache: TtlCache<String, u32> = TtlCache::with_shards(Duration::from_secs(60), 2, 1);
        bump(&cache, "a", Instant::now());
        tokio::time::advance(Duration::from_secs(1)).await;
        bump(&cache, "b", Instant::now());
        tokio::time::advance(Duration::from_secs(1)).await;
        bump(&cache, "c", Instant::now());

        let now = Instant::now();
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&"a".to_string(), now).is_none());
        assert!(cache.get(&"c".to_string(), now).is_some());
    }

    fn pinned_cache(ttl_secs: u64, max_entries: usize) -> TtlCache<String, u32> {
        // Values of 100 and above are pinned.
        TtlCache::with_shards(Duration::from_secs(ttl_secs), max_entries, 1)
            .with_pin(|value, _| *value >= 100)
    }

    fn set(cache: &TtlCache<String, u32>, key: &str, value: u32) {
        cache.update(&key.to_string(), Instant::now(), |slot| *slot = Some(value));
    }

    #[tokio::test(start_paused = true)]
    async fn pinned_entries_outlive_the_ttl() {
        let cache = pinned_cache(60, 10);
        set(&cache, "held", 100);
        set(&cache, "loose", 1);

        tokio::time::advance(Duration::from_secs(120)).await;
        let now = Instant::now();
        assert_eq!(cache.sweep(now), 1);
        assert_eq!(cache.get(&"held".to_string(), now), Some(100));
        assert!(cache.get(&"loose".to_string(), now).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn capacity_eviction_skips_pinned_entries() {
        let cache = pinned_cache(60, 2);
        set(&cache, "held", 100);
        tokio::time::advance(Duration::from_secs(1)).await;
        set(&cache, "b", 1);
        tokio::time::advance(Duration::from_secs(1)).await;
        set(&cache, "c", 2);

        let now = Instant::now();
        assert!(cache.contains(&"held".to_string(), now));
        assert!(cache.get(&"b".to_string(), now).is_none());
        assert!(cache.contains(&"c".to_string(), now));
    }

    #[tokio::test(start_paused = true)]
    async fn remove_returns_value() {
        let cache = cache();
        bump(&cache, "a", Instant::now());
        assert_eq!(cache.remove(&"a".to_string()), Some(1));
        assert_eq!(cache.remove(&"a".to_string()), None);
    }
}
