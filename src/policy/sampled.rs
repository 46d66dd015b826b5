//! # Sampled LRU Cache (Redis-Style Approximation)
//!
//! Approximates LRU without a recency list. Every entry carries an idle
//! timestamp refreshed on each hit and overwrite; under byte pressure the
//! engine draws a handful of random entries, funnels them through a small
//! sorted candidate pool, and destroys the pool from the stalest slot
//! downward. Approximation quality rises with the sample count.
//!
//! ## Architecture
//!
//! ```text
//!   ┌─────────────────────────────────────────────────────────────────────┐
//!   │                      SampledLruCore<K, V>                           │
//!   │                                                                     │
//!   │   map: FxHashMap<K, Entry>          keys: Vec<K> (dense)            │
//!   │        key → {Arc<V>, weight,            │                          │
//!   │               idle, slot}  ──────────────┘ slot index               │
//!   │                                                                     │
//!   │   The dense key vector gives O(1) uniform sampling; deletes use     │
//!   │   swap-remove and patch the moved key's slot.                       │
//!   │                                                                     │
//!   │   eviction pool (16 slots, rebuilt per round, sorted by idle age)   │
//!   │                                                                     │
//!   │     slot 0          slot 1          ...         slot 15             │
//!   │   ┌──────────┐    ┌──────────┐              ┌──────────┐            │
//!   │   │ freshest │ ≤  │          │     ≤        │ stalest  │──► evicted │
//!   │   └──────────┘    └──────────┘              └──────────┘    first   │
//!   └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Eviction Round
//!
//! ```text
//!   remove_oldest():
//!     1. populate: draw up to max_samples DISTINCT random entries
//!        (bounded Floyd sampling over the dense key vector)
//!        for each sample with idle age a:
//!          k = first pool slot whose occupant is at least as stale as a
//!          ├── k == 0 and pool full  → sample too fresh, skip
//!          ├── pool full             → destroy stalest slot (callback),
//!          │                           then insert at k
//!          └── otherwise             → insert at k (pool stays sorted)
//!     2. drain: destroy every pooled candidate, stalest slot downward,
//!        firing the callback once per entry; the pool ends empty
//! ```
//!
//! Populate and drain run back-to-back under the same exclusive lease, so
//! the pool can never refer to an entry that was deleted in between; the
//! drain still skips keys that are gone.
//!
//! An overwrite that grows an entry past the budget triggers the same rounds,
//! but the key being written is excluded from the draw: a growing overwrite
//! can never evict its own entry, so `put(k, v1); put(k, v2)` always leaves
//! `k` live holding `v2`.
//!
//! Randomness comes from an internal xorshift64 state seeded at construction
//! with no clock or OS entropy on the eviction path, and is deterministic under
//! Miri.
//!
//! ## Thread Safety
//!
//! [`SampledLruCore`] is single-threaded; [`ConcurrentSampledLruCache`]
//! wraps it in `parking_lot::RwLock`. `get` takes the write lock because it
//! refreshes the idle timestamp.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Instant;

#[cfg(feature = "concurrency")]
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::error::ConfigError;
use crate::traits::{entry_weight, ByteCache, ByteWeighted, EvictionCallback};

/// Number of slots in the eviction candidate pool.
pub const EVICTION_POOL_SIZE: usize = 16;

/// Default number of random entries drawn per eviction round.
pub const DEFAULT_MAX_SAMPLES: usize = 5;

struct SampledEntry<V> {
    value: Arc<V>,
    weight: u64,
    /// Last access or write; "idle age" is the time elapsed since.
    idle: Instant,
    /// Position of the key in the dense sampling vector.
    slot: usize,
}

/// Candidate awaiting destruction; holds the idle instant observed at
/// sampling time so the pool order is stable while it fills.
struct PoolCandidate<K> {
    key: K,
    idle: Instant,
}

/// Single-threaded sampled-LRU engine.
///
/// Unlike the list-based engines, an oversized put is refused here exactly as
/// the Redis original does: `false`, a warning, and no state change.
///
/// # Example
///
/// ```
/// use bytecache::policy::sampled::SampledLruCore;
/// use bytecache::traits::ByteCache;
///
/// let mut cache: SampledLruCore<String, String> = SampledLruCore::new(30, 5);
/// cache.put("key1".into(), "value1".into());
/// cache.put("key2".into(), "value2".into());
///
/// assert_eq!(cache.size(), 20);
/// assert!(!cache.put("key3".into(), "x".repeat(40))); // can never fit
/// assert_eq!(cache.len(), 2);
/// ```
pub struct SampledLruCore<K, V>
where
    K: Eq + Hash + Clone + ByteWeighted,
    V: ByteWeighted,
{
    map: FxHashMap<K, SampledEntry<V>>,
    /// Dense key vector for O(1) uniform sampling (swap-remove on delete).
    keys: Vec<K>,
    /// Scratch candidate pool, rebuilt per eviction round.
    pool: Vec<PoolCandidate<K>>,
    max_bytes: u64,
    used_bytes: u64,
    max_samples: usize,
    /// Internal PRNG state for sampling (xorshift64).
    rng_state: u64,
    on_evicted: Option<EvictionCallback<K, V>>,
}

impl<K, V> SampledLruCore<K, V>
where
    K: Eq + Hash + Clone + ByteWeighted,
    V: ByteWeighted,
{
    /// Creates a sampled-LRU engine bounded by `max_bytes`, drawing
    /// `max_samples` random entries per eviction round.
    ///
    /// # Panics
    ///
    /// Panics if `max_samples == 0`; use [`try_new`](Self::try_new) to handle
    /// the error.
    pub fn new(max_bytes: u64, max_samples: usize) -> Self {
        match Self::try_new(max_bytes, max_samples) {
            Ok(cache) => cache,
            Err(err) => panic!("{err}"),
        }
    }

    /// Fallible constructor.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `max_samples == 0`: a round that samples
    /// nothing can never relieve byte pressure.
    pub fn try_new(max_bytes: u64, max_samples: usize) -> Result<Self, ConfigError> {
        if max_samples == 0 {
            return Err(ConfigError::new("max_samples must be >= 1"));
        }
        Ok(SampledLruCore {
            map: FxHashMap::default(),
            keys: Vec::new(),
            pool: Vec::with_capacity(EVICTION_POOL_SIZE),
            max_bytes,
            used_bytes: 0,
            max_samples,
            // Non-zero seed: xorshift has a fixed point at zero.
            rng_state: max_bytes.wrapping_add(0x9e37_79b9_7f4a_7c15) | 1,
            on_evicted: None,
        })
    }

    /// Creates a sampled-LRU engine with an eviction callback.
    ///
    /// # Panics
    ///
    /// Panics if `max_samples == 0`.
    pub fn with_on_evicted(
        max_bytes: u64,
        max_samples: usize,
        on_evicted: EvictionCallback<K, V>,
    ) -> Self {
        let mut cache = Self::new(max_bytes, max_samples);
        cache.on_evicted = Some(on_evicted);
        cache
    }

    /// Registers or replaces the eviction callback.
    #[inline]
    pub fn set_on_evicted(&mut self, on_evicted: EvictionCallback<K, V>) {
        self.on_evicted = Some(on_evicted);
    }

    /// Number of random entries drawn per eviction round.
    #[inline]
    pub fn max_samples(&self) -> usize {
        self.max_samples
    }

    /// xorshift64 step.
    #[inline]
    fn next_random(&mut self) -> u64 {
        let mut x = self.rng_state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.rng_state = x;
        x
    }

    /// Draws `count` distinct indices from `0..population`.
    ///
    /// Floyd's sampling: one random draw per sample, no retry loop, no
    /// O(len) marker allocation. `count` must not exceed `population`.
    fn draw_distinct_slots(&mut self, count: usize, population: usize) -> Vec<usize> {
        let mut chosen: Vec<usize> = Vec::with_capacity(count);
        for j in (population - count)..population {
            let t = (self.next_random() as usize) % (j + 1);
            if chosen.contains(&t) {
                chosen.push(j);
            } else {
                chosen.push(t);
            }
        }
        chosen
    }

    /// Destroys one entry: unmaps it, releases its sampling slot, adjusts the
    /// byte total, and fires the callback. Missing keys are skipped.
    fn remove_entry(&mut self, key: &K) -> bool {
        let Some(entry) = self.map.remove(key) else {
            return false;
        };
        self.used_bytes -= entry.weight;

        let dense_key = self.keys.swap_remove(entry.slot);
        debug_assert!(dense_key == *key);
        if let Some(moved) = self.keys.get(entry.slot) {
            // swap_remove relocated the former last key into this slot.
            if let Some(moved_entry) = self.map.get_mut(moved) {
                moved_entry.slot = entry.slot;
            }
        }

        if let Some(cb) = &self.on_evicted {
            cb(key, &entry.value);
        }
        true
    }

    /// Fills the candidate pool from up to `max_samples` distinct random
    /// entries, keeping it sorted by idle age ascending (slot 0 freshest).
    ///
    /// A `protected` key (the entry an overwrite is growing) never enters the
    /// pool: its slot is spliced out of the sampled population, so the draw
    /// stays uniform over the other entries.
    ///
    /// Inserting into a full pool destroys the stalest candidate on the spot,
    /// so populate itself already applies eviction pressure.
    fn eviction_pool_populate(&mut self, protected: Option<&K>) {
        debug_assert!(self.pool.is_empty(), "pool must be drained between rounds");

        let protected_slot = protected
            .and_then(|key| self.map.get(key))
            .map(|entry| entry.slot);
        let population = self.keys.len() - usize::from(protected_slot.is_some());
        let sample_count = self.max_samples.min(population);
        let slots = self.draw_distinct_slots(sample_count, population);
        // Snapshot the samples up front: pool overflow below mutates the
        // dense key vector, which would invalidate the drawn slots.
        let samples: Vec<(K, Instant)> = slots
            .into_iter()
            .filter_map(|slot| {
                // Indices at or past the protected slot name the entry one
                // position over in the dense vector.
                let slot = match protected_slot {
                    Some(skip) if slot >= skip => slot + 1,
                    _ => slot,
                };
                let key = self.keys[slot].clone();
                let idle = self.map.get(&key)?.idle;
                Some((key, idle))
            })
            .collect();

        for (key, idle) in samples {
            // Pool order is idle age ascending; a later `idle` instant means
            // a smaller age, so candidates fresher than this sample are
            // exactly those with a later instant.
            let position = self.pool.iter().take_while(|c| c.idle > idle).count();

            if position == 0 && self.pool.len() == EVICTION_POOL_SIZE {
                // Fresher than every pooled candidate and no room left.
                continue;
            }
            if self.pool.len() == EVICTION_POOL_SIZE {
                if let Some(stalest) = self.pool.pop() {
                    self.remove_entry(&stalest.key);
                }
            }
            let position = position.min(self.pool.len());
            self.pool.insert(position, PoolCandidate { key, idle });
        }

        debug_assert!(
            self.pool.windows(2).all(|w| w[0].idle >= w[1].idle),
            "pool must be sorted by idle age ascending"
        );
    }

    /// One eviction round: populate the pool, then destroy every candidate
    /// from the stalest slot downward.
    ///
    /// A `protected` key survives the round untouched; every round still
    /// destroys at least one other entry, so the pressure loop makes
    /// progress.
    fn remove_oldest(&mut self, protected: Option<&K>) {
        debug_assert!(
            self.map.len() > usize::from(protected.is_some()),
            "eviction round with no evictable entries"
        );

        self.eviction_pool_populate(protected);
        while let Some(candidate) = self.pool.pop() {
            self.remove_entry(&candidate.key);
        }
    }

    /// Validate internal invariants (debug builds only).
    fn validate_invariants(&self) {
        #[cfg(debug_assertions)]
        {
            debug_assert_eq!(self.map.len(), self.keys.len());
            let weight_sum: u64 = self.map.values().map(|e| e.weight).sum();
            debug_assert_eq!(weight_sum, self.used_bytes);
            for (slot, key) in self.keys.iter().enumerate() {
                match self.map.get(key) {
                    Some(entry) => debug_assert_eq!(entry.slot, slot),
                    None => panic!("dense key without a live entry"),
                }
            }
        }
    }
}

impl<K, V> ByteCache<K, V> for SampledLruCore<K, V>
where
    K: Eq + Hash + Clone + ByteWeighted,
    V: ByteWeighted,
{
    fn put_arc(&mut self, key: K, value: Arc<V>) -> bool {
        let weight = entry_weight(&key, &*value);
        if weight > self.max_bytes {
            tracing::warn!(
                weight,
                max_bytes = self.max_bytes,
                "refusing entry larger than the byte budget"
            );
            return false;
        }

        let now = Instant::now();
        if let Some(entry) = self.map.get_mut(&key) {
            let old_weight = entry.weight;
            entry.weight = weight;
            entry.value = value;
            entry.idle = now;
            self.used_bytes = self.used_bytes - old_weight + weight;
            // An overwrite that grew the entry can breach the ceiling; run
            // eviction rounds until the budget holds again, shielding the key
            // just written so the rounds can never sample it away.
            while self.used_bytes > self.max_bytes {
                self.remove_oldest(Some(&key));
            }
        } else {
            // Evict before inserting: the new entry does not exist yet, so a
            // round can never sample it away.
            while self.used_bytes + weight > self.max_bytes {
                self.remove_oldest(None);
            }
            let slot = self.keys.len();
            self.keys.push(key.clone());
            self.map.insert(
                key,
                SampledEntry {
                    value,
                    weight,
                    idle: now,
                    slot,
                },
            );
            self.used_bytes += weight;
        }

        self.validate_invariants();
        true
    }

    /// Refreshes the idle timestamp on a hit.
    fn get(&mut self, key: &K) -> Option<&Arc<V>> {
        let entry = self.map.get_mut(key)?;
        entry.idle = Instant::now();
        Some(&entry.value)
    }

    fn peek(&self, key: &K) -> Option<&Arc<V>> {
        self.map.get(key).map(|entry| &entry.value)
    }

    #[inline]
    fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    fn del(&mut self, key: &K) -> bool {
        let removed = self.remove_entry(key);
        if removed {
            self.validate_invariants();
        }
        removed
    }

    #[inline]
    fn len(&self) -> usize {
        self.map.len()
    }

    /// Exactly the live key set; the dense sampling vector is that set.
    fn keys(&self) -> Vec<K> {
        self.keys.clone()
    }

    #[inline]
    fn size(&self) -> u64 {
        self.used_bytes
    }

    #[inline]
    fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    fn clear(&mut self) {
        self.map.clear();
        self.keys.clear();
        self.pool.clear();
        self.used_bytes = 0;
    }
}

impl<K, V> fmt::Debug for SampledLruCore<K, V>
where
    K: Eq + Hash + Clone + ByteWeighted,
    V: ByteWeighted,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampledLruCore")
            .field("len", &self.len())
            .field("used_bytes", &self.used_bytes)
            .field("max_bytes", &self.max_bytes)
            .field("max_samples", &self.max_samples)
            .finish_non_exhaustive()
    }
}

/// Thread-safe sampled-LRU cache handle.
///
/// `get` takes the write lock (idle refresh); `peek`, `contains`, `len`,
/// `size`, and `keys` take the read lock.
#[cfg(feature = "concurrency")]
pub struct ConcurrentSampledLruCache<K, V>
where
    K: Eq + Hash + Clone + ByteWeighted,
    V: ByteWeighted,
{
    inner: Arc<RwLock<SampledLruCore<K, V>>>,
}

// Manual impl: cloning the handle must not require V: Clone.
#[cfg(feature = "concurrency")]
impl<K, V> Clone for ConcurrentSampledLruCache<K, V>
where
    K: Eq + Hash + Clone + ByteWeighted,
    V: ByteWeighted,
{
    fn clone(&self) -> Self {
        ConcurrentSampledLruCache {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(feature = "concurrency")]
impl<K, V> ConcurrentSampledLruCache<K, V>
where
    K: Eq + Hash + Clone + ByteWeighted + Send + Sync,
    V: ByteWeighted + Send + Sync,
{
    /// Creates a thread-safe sampled-LRU cache.
    ///
    /// # Panics
    ///
    /// Panics if `max_samples == 0`; use [`try_new`](Self::try_new) to handle
    /// the error.
    pub fn new(max_bytes: u64, max_samples: usize) -> Self {
        Self::from_core(SampledLruCore::new(max_bytes, max_samples))
    }

    pub(crate) fn from_core(core: SampledLruCore<K, V>) -> Self {
        ConcurrentSampledLruCache {
            inner: Arc::new(RwLock::new(core)),
        }
    }

    /// Fallible constructor.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `max_samples == 0`.
    pub fn try_new(max_bytes: u64, max_samples: usize) -> Result<Self, ConfigError> {
        Ok(ConcurrentSampledLruCache {
            inner: Arc::new(RwLock::new(SampledLruCore::try_new(max_bytes, max_samples)?)),
        })
    }

    /// Creates a thread-safe sampled-LRU cache with an eviction callback.
    ///
    /// # Panics
    ///
    /// Panics if `max_samples == 0`.
    pub fn with_on_evicted(
        max_bytes: u64,
        max_samples: usize,
        on_evicted: EvictionCallback<K, V>,
    ) -> Self {
        ConcurrentSampledLruCache {
            inner: Arc::new(RwLock::new(SampledLruCore::with_on_evicted(
                max_bytes,
                max_samples,
                on_evicted,
            ))),
        }
    }

    /// Inserts or overwrites an entry. See [`ByteCache::put`].
    pub fn put(&self, key: K, value: V) -> bool {
        self.inner.write().put(key, value)
    }

    /// Inserts a pre-wrapped `Arc<V>` without re-wrapping.
    pub fn put_arc(&self, key: K, value: Arc<V>) -> bool {
        self.inner.write().put_arc(key, value)
    }

    /// Looks up a value, refreshing its idle timestamp. Write lock.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.inner.write().get(key).map(Arc::clone)
    }

    /// Looks up a value without refreshing the idle timestamp. Read lock.
    pub fn peek(&self, key: &K) -> Option<Arc<V>> {
        self.inner.read().peek(key).map(Arc::clone)
    }

    /// Checks key existence without refreshing the idle timestamp. Read lock.
    pub fn contains(&self, key: &K) -> bool {
        self.inner.read().contains(key)
    }

    /// Removes an entry if present, firing the eviction callback.
    pub fn del(&self, key: &K) -> bool {
        self.inner.write().del(key)
    }

    /// Number of live entries. Read lock.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Returns `true` if the cache holds no entries. Read lock.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Snapshot of the live key set. Read lock.
    pub fn keys(&self) -> Vec<K> {
        self.inner.read().keys()
    }

    /// Current byte usage. Read lock.
    pub fn size(&self) -> u64 {
        self.inner.read().size()
    }

    /// Configured byte ceiling. Read lock.
    pub fn max_bytes(&self) -> u64 {
        self.inner.read().max_bytes()
    }

    /// Number of random entries drawn per eviction round.
    pub fn max_samples(&self) -> usize {
        self.inner.read().max_samples()
    }

    /// Discards every entry without firing the eviction callback.
    pub fn clear(&self) {
        self.inner.write().clear()
    }
}

#[cfg(feature = "concurrency")]
impl<K, V> crate::traits::ConcurrentByteCache for ConcurrentSampledLruCache<K, V>
where
    K: Eq + Hash + Clone + ByteWeighted + Send + Sync,
    V: ByteWeighted + Send + Sync,
{
}

#[cfg(feature = "concurrency")]
impl<K, V> fmt::Debug for ConcurrentSampledLruCache<K, V>
where
    K: Eq + Hash + Clone + ByteWeighted,
    V: ByteWeighted,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cache = self.inner.read();
        f.debug_struct("ConcurrentSampledLruCache")
            .field("len", &cache.len())
            .field("used_bytes", &cache.size())
            .field("max_bytes", &cache.max_bytes())
            .finish_non_exhaustive()
    }
}
