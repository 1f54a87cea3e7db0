use std::{
    collections::hash_map::DefaultHasher,
    hash::Hasher,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard,
    },
};

use lru::LruCache;
use std::hash::Hash;

const NUM_SHARD_BITS: u32 = 4;
const NUM_SHARDS: u32 = 1 << NUM_SHARD_BITS;

/// A capacity bounded, reference counted key/value cache.
///
/// Handles are `Arc<V>`: releasing a handle is dropping it, and the value is
/// destroyed (its `Drop` runs) exactly once, after the cache slot and every
/// outstanding handle are gone. Erasing or evicting a slot never invalidates
/// handles that callers already hold.
pub trait Cache<K: Sized, V: Sized> {
    /// Inserts `value` and returns a handle to it. An existing entry for
    /// `key` is replaced; holders of the old value keep it alive.
    fn insert(&self, key: K, value: V, charge: u64) -> Arc<V>;
    fn lookup(&self, key: &K) -> Option<Arc<V>>;
    fn erase(&self, key: &K);

    /// Returns a new numeric id, used by clients sharing one cache to
    /// partition the key space.
    fn new_id(&self) -> u64;
    fn total_charge(&self) -> u64;
}

pub struct ShardLruCache<K, V>
where
    K: Eq + Hash,
{
    shards: Box<[Mutex<LruCacheInner<K, V>>]>,
    last_id: AtomicU64,
}

impl<K, V> ShardLruCache<K, V>
where
    K: Eq + Hash,
{
    pub fn new(capacity: u64) -> Self {
        let per_shard = (capacity + NUM_SHARDS as u64 - 1) / NUM_SHARDS as u64;
        let mut cache = Vec::with_capacity(NUM_SHARDS as usize);
        for _ in 0..NUM_SHARDS {
            cache.push(Mutex::new(LruCacheInner::new(per_shard)));
        }
        ShardLruCache {
            shards: cache.into_boxed_slice(),
            last_id: AtomicU64::new(0),
        }
    }

    fn shard(key: &K) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let h = hasher.finish();
        (h >> (64 - NUM_SHARD_BITS)) as usize
    }

    fn get_shard(&self, key: &K) -> MutexGuard<'_, LruCacheInner<K, V>> {
        // shard state stays consistent across a panic, so a poisoned lock
        // is still usable
        self.shards[Self::shard(key)]
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}

impl<K, V> Cache<K, V> for ShardLruCache<K, V>
where
    K: Eq + Hash,
{
    fn insert(&self, key: K, value: V, charge: u64) -> Arc<V> {
        let mut lru = self.get_shard(&key);
        lru.insert(key, value, charge)
    }

    fn lookup(&self, key: &K) -> Option<Arc<V>> {
        let mut lru = self.get_shard(key);
        lru.lookup(key)
    }

    fn erase(&self, key: &K) {
        let mut lru = self.get_shard(key);
        lru.erase(key);
    }

    fn new_id(&self) -> u64 {
        self.last_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn total_charge(&self) -> u64 {
        self.shards
            .iter()
            .map(|shard| shard.lock().unwrap_or_else(|e| e.into_inner()).total_charge())
            .sum()
    }
}

struct LruValue<V> {
    value: Arc<V>,
    charge: u64,
}

struct LruCacheInner<K: Eq + Hash, V> {
    lru: LruCache<K, LruValue<V>>,
    usage: u64,
    capacity: u64,
}

impl<K: Eq + Hash, V> LruCacheInner<K, V> {
    fn new(capacity: u64) -> Self {
        LruCacheInner {
            lru: LruCache::unbounded(),
            usage: 0,
            capacity,
        }
    }

    fn insert(&mut self, key: K, value: V, charge: u64) -> Arc<V> {
        let value = Arc::new(value);
        if self.capacity == 0 {
            // caching disabled, the caller holds the only reference
            return value;
        }

        if let Some(old) = self.lru.put(
            key,
            LruValue {
                value: value.clone(),
                charge,
            },
        ) {
            self.usage -= old.charge;
        }
        self.usage += charge;

        // the newest entry is never evicted by its own insert
        while self.usage > self.capacity && self.lru.len() > 1 {
            if let Some((_, evicted)) = self.lru.pop_lru() {
                self.usage -= evicted.charge;
            }
        }

        value
    }

    fn lookup(&mut self, key: &K) -> Option<Arc<V>> {
        self.lru.get(key).map(|h| h.value.clone())
    }

    fn erase(&mut self, key: &K) {
        if let Some(v) = self.lru.pop(key) {
            self.usage -= v.charge;
        }
    }

    fn total_charge(&self) -> u64 {
        self.usage
    }
}
