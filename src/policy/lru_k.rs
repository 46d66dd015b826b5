//! # Byte-Bounded LRU-K Cache
//!
//! Two-tier eviction: new keys enter a probationary **history** list and are
//! promoted to the **main cache** only once they have been referenced K
//! times. One-shot keys age out of history without ever displacing the stable
//! working set, which gives the policy its scan resistance.
//!
//! ## Architecture
//!
//! ```text
//!   ┌─────────────────────────────────────────────────────────────────────┐
//!   │                         LrukCore<K, V>                              │
//!   │                                                                     │
//!   │   FxHashMap<K, NonNull<Node>>        node.tier ∈ {History, Cache}   │
//!   │                                                                     │
//!   │   HISTORY (probation, visits < K, byte-bounded, silent eviction)    │
//!   │   head ──► [v=1] ◄──► [v=2] ◄──► [v=1] ◄── tail ──► discarded       │
//!   │                                                                     │
//!   │                    visits reaches K: promote                        │
//!   │                          │                                          │
//!   │                          ▼                                          │
//!   │   CACHE (main, byte-bounded, eviction fires the callback)           │
//!   │   head ──► [hot] ◄──► [hot] ◄──► [hot] ◄── tail ──► on_evicted      │
//!   │                                                                     │
//!   │   Each tier keeps its own used/max byte pair; an entry lives in     │
//!   │   exactly one tier at any time.                                     │
//!   └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Put Flow
//!
//! ```text
//!   put(key, value)
//!     │
//!     ├─► key in CACHE:   overwrite in place, adjust bytes, move to front,
//!     │                   drain cache tail while over budget
//!     │
//!     ├─► key in HISTORY: visits += 1, replace value (adjust history bytes)
//!     │     │
//!     │     ├── visits >= K:  move to cache front, drain cache tail
//!     │     └── visits <  K:  move to history front, drain history tail
//!     │
//!     └─► new key:        insert into history front with visits = 1,
//!                         drain history tail while over budget
//! ```
//!
//! ## Visibility Rules
//!
//! - `get` hits only the main cache; a key that exists solely in history is
//!   reported as a miss regardless of its visit count.
//! - `len()`, `keys()`, and `size()` describe the main cache. The probation
//!   tier is observable through [`history_len`](LrukCore::history_len) and
//!   [`history_size`](LrukCore::history_size).
//! - History evictions are silent; main-cache removals (byte pressure or
//!   explicit delete) fire the eviction callback. `del` removes the key from
//!   whichever tier holds it.
//!
//! ## Thread Safety
//!
//! [`LrukCore`] is single-threaded; [`ConcurrentLrukCache`] wraps it in
//! `parking_lot::RwLock` with the same lock discipline as the LRU wrapper
//! (`get` takes the write lock, `peek`/`contains`/`len`/`size`/`keys` the
//! read lock).

use std::fmt;
use std::hash::Hash;
use std::ptr::NonNull;
use std::sync::Arc;

#[cfg(feature = "concurrency")]
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::error::ConfigError;
use crate::traits::{entry_weight, ByteCache, ByteWeighted, EvictionCallback};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Tier {
    History,
    Cache,
}

/// Node shared by both tier lists; `tier` says which list links it.
#[repr(C)]
struct Node<K, V> {
    prev: Option<NonNull<Node<K, V>>>,
    next: Option<NonNull<Node<K, V>>>,
    tier: Tier,
    visits: u32,
    weight: u64,
    key: K,
    value: Arc<V>,
}

/// Single-threaded byte-bounded LRU-K engine.
///
/// `k` is the promotion threshold (at least 2). By default the history tier
/// carries the same byte budget as the main cache;
/// [`with_history_bytes`](LrukCore::with_history_bytes) sizes it separately.
///
/// # Example
///
/// ```
/// use bytecache::policy::lru_k::LrukCore;
/// use bytecache::traits::ByteCache;
///
/// let mut cache: LrukCore<String, String> = LrukCore::new(2, 1024);
///
/// cache.put("key1".into(), "value1".into());
/// assert!(cache.get(&"key1".into()).is_none()); // still on probation
///
/// cache.put("key1".into(), "value1".into());    // second reference: promoted
/// assert!(cache.get(&"key1".into()).is_some());
/// ```
pub struct LrukCore<K, V>
where
    K: Eq + Hash + Clone + ByteWeighted,
    V: ByteWeighted,
{
    k: u32,
    map: FxHashMap<K, NonNull<Node<K, V>>>,
    // Main cache tier (promoted entries).
    cache_head: Option<NonNull<Node<K, V>>>,
    cache_tail: Option<NonNull<Node<K, V>>>,
    cache_len: usize,
    max_bytes: u64,
    used_bytes: u64,
    // History tier (probation).
    history_head: Option<NonNull<Node<K, V>>>,
    history_tail: Option<NonNull<Node<K, V>>>,
    history_len: usize,
    history_max_bytes: u64,
    history_used_bytes: u64,
    on_evicted: Option<EvictionCallback<K, V>>,
}

// SAFETY: same reasoning as LruCore; the raw pointers only reference heap
// memory owned by the struct.
unsafe impl<K, V> Send for LrukCore<K, V>
where
    K: Eq + Hash + Clone + ByteWeighted + Send,
    V: ByteWeighted + Send,
{
}

// SAFETY: shared access never dereferences the node pointers mutably; actual
// cross-thread mutation is serialized by the RwLock in ConcurrentLrukCache.
unsafe impl<K, V> Sync for LrukCore<K, V>
where
    K: Eq + Hash + Clone + ByteWeighted + Sync,
    V: ByteWeighted + Sync,
{
}

impl<K, V> LrukCore<K, V>
where
    K: Eq + Hash + Clone + ByteWeighted,
    V: ByteWeighted,
{
    /// Creates an LRU-K engine. Both tiers are bounded by `max_bytes`.
    ///
    /// # Panics
    ///
    /// Panics if `k < 2`; use [`try_new`](Self::try_new) to handle the error.
    pub fn new(k: u32, max_bytes: u64) -> Self {
        match Self::try_new(k, max_bytes) {
            Ok(cache) => cache,
            Err(err) => panic!("{err}"),
        }
    }

    /// Fallible constructor; both tiers are bounded by `max_bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `k < 2`. With `k = 1` every insert would
    /// promote immediately and the history tier would be dead weight; that
    /// configuration is plain LRU and should be requested as such.
    pub fn try_new(k: u32, max_bytes: u64) -> Result<Self, ConfigError> {
        Self::try_with_history_bytes(k, max_bytes, max_bytes)
    }

    /// Creates an LRU-K engine with a separately sized history tier.
    ///
    /// # Panics
    ///
    /// Panics if `k < 2`.
    pub fn with_history_bytes(k: u32, max_bytes: u64, history_max_bytes: u64) -> Self {
        match Self::try_with_history_bytes(k, max_bytes, history_max_bytes) {
            Ok(cache) => cache,
            Err(err) => panic!("{err}"),
        }
    }

    /// Fallible constructor with a separately sized history tier.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `k < 2`.
    pub fn try_with_history_bytes(
        k: u32,
        max_bytes: u64,
        history_max_bytes: u64,
    ) -> Result<Self, ConfigError> {
        if k < 2 {
            return Err(ConfigError::new(format!(
                "lru-k requires k >= 2, got {k}"
            )));
        }
        Ok(LrukCore {
            k,
            map: FxHashMap::default(),
            cache_head: None,
            cache_tail: None,
            cache_len: 0,
            max_bytes,
            used_bytes: 0,
            history_head: None,
            history_tail: None,
            history_len: 0,
            history_max_bytes,
            history_used_bytes: 0,
            on_evicted: None,
        })
    }

    /// Creates an LRU-K engine with an eviction callback.
    ///
    /// The callback fires for main-cache removals only; history evictions are
    /// probationary and silent.
    ///
    /// # Panics
    ///
    /// Panics if `k < 2`.
    pub fn with_on_evicted(k: u32, max_bytes: u64, on_evicted: EvictionCallback<K, V>) -> Self {
        let mut cache = Self::new(k, max_bytes);
        cache.on_evicted = Some(on_evicted);
        cache
    }

    /// Registers or replaces the eviction callback.
    #[inline]
    pub fn set_on_evicted(&mut self, on_evicted: EvictionCallback<K, V>) {
        self.on_evicted = Some(on_evicted);
    }

    /// The promotion threshold K.
    #[inline]
    pub fn k_value(&self) -> u32 {
        self.k
    }

    /// Number of entries on probation.
    #[inline]
    pub fn history_len(&self) -> usize {
        self.history_len
    }

    /// Byte usage of the probation tier.
    #[inline]
    pub fn history_size(&self) -> u64 {
        self.history_used_bytes
    }

    /// Byte ceiling of the probation tier.
    #[inline]
    pub fn history_max_bytes(&self) -> u64 {
        self.history_max_bytes
    }

    /// Detach a node from the list its tier tag names.
    #[inline(always)]
    fn detach(&mut self, node_ptr: NonNull<Node<K, V>>) {
        unsafe {
            let node = node_ptr.as_ref();
            let prev = node.prev;
            let next = node.next;

            let (head, tail, len) = match node.tier {
                Tier::History => (
                    &mut self.history_head,
                    &mut self.history_tail,
                    &mut self.history_len,
                ),
                Tier::Cache => (&mut self.cache_head, &mut self.cache_tail, &mut self.cache_len),
            };

            match prev {
                Some(mut p) => p.as_mut().next = next,
                None => *head = next,
            }

            match next {
                Some(mut n) => n.as_mut().prev = prev,
                None => *tail = prev,
            }

            *len -= 1;
        }
    }

    /// Attach a node at the front of the history list.
    #[inline(always)]
    fn attach_history_front(&mut self, mut node_ptr: NonNull<Node<K, V>>) {
        unsafe {
            let node = node_ptr.as_mut();
            node.prev = None;
            node.next = self.history_head;
            node.tier = Tier::History;

            match self.history_head {
                Some(mut h) => h.as_mut().prev = Some(node_ptr),
                None => self.history_tail = Some(node_ptr),
            }

            self.history_head = Some(node_ptr);
            self.history_len += 1;
        }
    }

    /// Attach a node at the front of the main-cache list.
    #[inline(always)]
    fn attach_cache_front(&mut self, mut node_ptr: NonNull<Node<K, V>>) {
        unsafe {
            let node = node_ptr.as_mut();
            node.prev = None;
            node.next = self.cache_head;
            node.tier = Tier::Cache;

            match self.cache_head {
                Some(mut h) => h.as_mut().prev = Some(node_ptr),
                None => self.cache_tail = Some(node_ptr),
            }

            self.cache_head = Some(node_ptr);
            self.cache_len += 1;
        }
    }

    /// Pop the history tail. The caller owns the returned node.
    #[inline(always)]
    fn pop_history_tail(&mut self) -> Option<Box<Node<K, V>>> {
        self.history_tail.map(|tail_ptr| unsafe {
            let node = Box::from_raw(tail_ptr.as_ptr());

            self.history_tail = node.prev;
            match self.history_tail {
                Some(mut t) => t.as_mut().next = None,
                None => self.history_head = None,
            }
            self.history_len -= 1;

            node
        })
    }

    /// Pop the main-cache tail. The caller owns the returned node.
    #[inline(always)]
    fn pop_cache_tail(&mut self) -> Option<Box<Node<K, V>>> {
        self.cache_tail.map(|tail_ptr| unsafe {
            let node = Box::from_raw(tail_ptr.as_ptr());

            self.cache_tail = node.prev;
            match self.cache_tail {
                Some(mut t) => t.as_mut().next = None,
                None => self.cache_head = None,
            }
            self.cache_len -= 1;

            node
        })
    }

    /// Silently discards the oldest probation entry.
    fn evict_history_oldest(&mut self) {
        if let Some(node) = self.pop_history_tail() {
            self.map.remove(&node.key);
            self.history_used_bytes -= node.weight;
        }
    }

    /// Evicts the least recently used main-cache entry, firing the callback.
    fn evict_cache_oldest(&mut self) {
        if let Some(node) = self.pop_cache_tail() {
            self.map.remove(&node.key);
            self.used_bytes -= node.weight;
            if let Some(cb) = &self.on_evicted {
                cb(&node.key, &node.value);
            }
        }
    }

    /// Validate per-tier invariants (debug builds only).
    fn validate_invariants(&self) {
        #[cfg(debug_assertions)]
        {
            let walk = |mut current: Option<NonNull<Node<K, V>>>, tier: Tier| {
                let mut count = 0usize;
                let mut weight_sum = 0u64;
                while let Some(ptr) = current {
                    count += 1;
                    unsafe {
                        let node = ptr.as_ref();
                        debug_assert_eq!(node.tier, tier);
                        debug_assert!(self.map.contains_key(&node.key));
                        weight_sum += node.weight;
                        current = node.next;
                    }
                    if count > self.map.len() {
                        panic!("cycle detected in tier list");
                    }
                }
                (count, weight_sum)
            };

            let (cache_count, cache_sum) = walk(self.cache_head, Tier::Cache);
            let (history_count, history_sum) = walk(self.history_head, Tier::History);

            debug_assert_eq!(cache_count, self.cache_len);
            debug_assert_eq!(history_count, self.history_len);
            debug_assert_eq!(cache_count + history_count, self.map.len());
            debug_assert_eq!(cache_sum, self.used_bytes);
            debug_assert_eq!(history_sum, self.history_used_bytes);
        }
    }
}

impl<K, V> ByteCache<K, V> for LrukCore<K, V>
where
    K: Eq + Hash + Clone + ByteWeighted,
    V: ByteWeighted,
{
    fn put_arc(&mut self, key: K, value: Arc<V>) -> bool {
        let weight = entry_weight(&key, &*value);
        // The entry may live in either tier over its lifetime, so it must fit
        // both budgets.
        if weight > self.max_bytes || weight > self.history_max_bytes {
            tracing::warn!(
                weight,
                max_bytes = self.max_bytes,
                history_max_bytes = self.history_max_bytes,
                "refusing entry larger than the byte budget"
            );
            return false;
        }

        if let Some(&node_ptr) = self.map.get(&key) {
            let tier = unsafe { node_ptr.as_ref().tier };
            match tier {
                Tier::Cache => {
                    // Overwrite in the main cache; probation is not involved.
                    unsafe {
                        let node = &mut *node_ptr.as_ptr();
                        self.used_bytes = self.used_bytes - node.weight + weight;
                        node.weight = weight;
                        node.value = value;
                    }
                    self.detach(node_ptr);
                    self.attach_cache_front(node_ptr);
                    while self.used_bytes > self.max_bytes {
                        self.evict_cache_oldest();
                    }
                }
                Tier::History => {
                    let promote = unsafe {
                        let node = &mut *node_ptr.as_ptr();
                        node.visits += 1;
                        self.history_used_bytes =
                            self.history_used_bytes - node.weight + weight;
                        node.weight = weight;
                        node.value = value;
                        node.visits >= self.k
                    };
                    if promote {
                        self.detach(node_ptr);
                        self.history_used_bytes -= weight;
                        self.attach_cache_front(node_ptr);
                        self.used_bytes += weight;
                        while self.used_bytes > self.max_bytes {
                            self.evict_cache_oldest();
                        }
                    } else {
                        self.detach(node_ptr);
                        self.attach_history_front(node_ptr);
                        while self.history_used_bytes > self.history_max_bytes {
                            self.evict_history_oldest();
                        }
                    }
                }
            }
        } else {
            // New keys always start on probation.
            let node = Box::new(Node {
                prev: None,
                next: None,
                tier: Tier::History,
                visits: 1,
                weight,
                key: key.clone(),
                value,
            });
            let node_ptr = NonNull::new(Box::into_raw(node)).unwrap();
            self.map.insert(key, node_ptr);
            self.attach_history_front(node_ptr);
            self.history_used_bytes += weight;
            while self.history_used_bytes > self.history_max_bytes {
                self.evict_history_oldest();
            }
        }

        self.validate_invariants();
        true
    }

    /// Hits only the main cache; keys on probation are misses.
    fn get(&mut self, key: &K) -> Option<&Arc<V>> {
        let node_ptr = *self.map.get(key)?;
        if unsafe { node_ptr.as_ref().tier } != Tier::Cache {
            return None;
        }

        self.detach(node_ptr);
        self.attach_cache_front(node_ptr);

        unsafe { Some(&(*node_ptr.as_ptr()).value) }
    }

    /// Main-cache lookup without recency movement; probation keys are misses.
    fn peek(&self, key: &K) -> Option<&Arc<V>> {
        let node_ptr = self.map.get(key)?;
        unsafe {
            let node = &*node_ptr.as_ptr();
            (node.tier == Tier::Cache).then_some(&node.value)
        }
    }

    /// Reports main-cache membership only, matching [`get`](Self::get).
    #[inline]
    fn contains(&self, key: &K) -> bool {
        self.peek(key).is_some()
    }

    /// Removes the key from whichever tier holds it. The callback fires only
    /// when a main-cache entry is removed.
    fn del(&mut self, key: &K) -> bool {
        let Some(node_ptr) = self.map.remove(key) else {
            return false;
        };

        self.detach(node_ptr);
        let node = unsafe { Box::from_raw(node_ptr.as_ptr()) };
        match node.tier {
            Tier::Cache => {
                self.used_bytes -= node.weight;
                if let Some(cb) = &self.on_evicted {
                    cb(&node.key, &node.value);
                }
            }
            Tier::History => {
                self.history_used_bytes -= node.weight;
            }
        }

        self.validate_invariants();
        true
    }

    #[inline]
    fn len(&self) -> usize {
        self.cache_len
    }

    /// Snapshot of the main-cache key set, most recent first.
    fn keys(&self) -> Vec<K> {
        let mut keys = Vec::with_capacity(self.cache_len);
        let mut current = self.cache_head;
        while let Some(ptr) = current {
            unsafe {
                let node = ptr.as_ref();
                keys.push(node.key.clone());
                current = node.next;
            }
        }
        keys
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
        while self.pop_cache_tail().is_some() {}
        while self.pop_history_tail().is_some() {}
        self.map.clear();
        self.used_bytes = 0;
        self.history_used_bytes = 0;
    }
}

impl<K, V> Drop for LrukCore<K, V>
where
    K: Eq + Hash + Clone + ByteWeighted,
    V: ByteWeighted,
{
    fn drop(&mut self) {
        while self.pop_cache_tail().is_some() {}
        while self.pop_history_tail().is_some() {}
    }
}

impl<K, V> fmt::Debug for LrukCore<K, V>
where
    K: Eq + Hash + Clone + ByteWeighted,
    V: ByteWeighted,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LrukCore")
            .field("k", &self.k)
            .field("len", &self.cache_len)
            .field("used_bytes", &self.used_bytes)
            .field("max_bytes", &self.max_bytes)
            .field("history_len", &self.history_len)
            .field("history_used_bytes", &self.history_used_bytes)
            .finish_non_exhaustive()
    }
}

/// Thread-safe LRU-K cache handle.
///
/// Same lock discipline as [`ConcurrentLruCache`](crate::policy::lru::ConcurrentLruCache):
/// `get` takes the write lock for recency maintenance, the observers take the
/// read lock.
#[cfg(feature = "concurrency")]
pub struct ConcurrentLrukCache<K, V>
where
    K: Eq + Hash + Clone + ByteWeighted,
    V: ByteWeighted,
{
    inner: Arc<RwLock<LrukCore<K, V>>>,
}

// Manual impl: cloning the handle must not require V: Clone.
#[cfg(feature = "concurrency")]
impl<K, V> Clone for ConcurrentLrukCache<K, V>
where
    K: Eq + Hash + Clone + ByteWeighted,
    V: ByteWeighted,
{
    fn clone(&self) -> Self {
        ConcurrentLrukCache {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(feature = "concurrency")]
impl<K, V> ConcurrentLrukCache<K, V>
where
    K: Eq + Hash + Clone + ByteWeighted + Send + Sync,
    V: ByteWeighted + Send + Sync,
{
    /// Creates a thread-safe LRU-K cache. Both tiers are bounded by
    /// `max_bytes`.
    ///
    /// # Panics
    ///
    /// Panics if `k < 2`; use [`try_new`](Self::try_new) to handle the error.
    pub fn new(k: u32, max_bytes: u64) -> Self {
        Self::from_core(LrukCore::new(k, max_bytes))
    }

    pub(crate) fn from_core(core: LrukCore<K, V>) -> Self {
        ConcurrentLrukCache {
            inner: Arc::new(RwLock::new(core)),
        }
    }

    /// Fallible constructor.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `k < 2`.
    pub fn try_new(k: u32, max_bytes: u64) -> Result<Self, ConfigError> {
        Ok(ConcurrentLrukCache {
            inner: Arc::new(RwLock::new(LrukCore::try_new(k, max_bytes)?)),
        })
    }

    /// Creates a thread-safe LRU-K cache with an eviction callback.
    ///
    /// # Panics
    ///
    /// Panics if `k < 2`.
    pub fn with_on_evicted(k: u32, max_bytes: u64, on_evicted: EvictionCallback<K, V>) -> Self {
        ConcurrentLrukCache {
            inner: Arc::new(RwLock::new(LrukCore::with_on_evicted(k, max_bytes, on_evicted))),
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

    /// Main-cache lookup, moving a hit to the MRU position. Write lock.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.inner.write().get(key).map(Arc::clone)
    }

    /// Main-cache lookup without recency movement. Read lock.
    pub fn peek(&self, key: &K) -> Option<Arc<V>> {
        self.inner.read().peek(key).map(Arc::clone)
    }

    /// Main-cache membership check. Read lock.
    pub fn contains(&self, key: &K) -> bool {
        self.inner.read().contains(key)
    }

    /// Removes the key from whichever tier holds it.
    pub fn del(&self, key: &K) -> bool {
        self.inner.write().del(key)
    }

    /// Number of main-cache entries. Read lock.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Returns `true` if the main cache holds no entries. Read lock.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Snapshot of the main-cache key set. Read lock.
    pub fn keys(&self) -> Vec<K> {
        self.inner.read().keys()
    }

    /// Main-cache byte usage. Read lock.
    pub fn size(&self) -> u64 {
        self.inner.read().size()
    }

    /// Main-cache byte ceiling. Read lock.
    pub fn max_bytes(&self) -> u64 {
        self.inner.read().max_bytes()
    }

    /// Number of entries on probation. Read lock.
    pub fn history_len(&self) -> usize {
        self.inner.read().history_len()
    }

    /// Byte usage of the probation tier. Read lock.
    pub fn history_size(&self) -> u64 {
        self.inner.read().history_size()
    }

    /// The promotion threshold K.
    pub fn k_value(&self) -> u32 {
        self.inner.read().k_value()
    }

    /// Discards every entry in both tiers without firing the callback.
    pub fn clear(&self) {
        self.inner.write().clear()
    }
}

#[cfg(feature = "concurrency")]
impl<K, V> crate::traits::ConcurrentByteCache for ConcurrentLrukCache<K, V>
where
    K: Eq + Hash + Clone + ByteWeighted + Send + Sync,
    V: ByteWeighted + Send + Sync,
{
}

#[cfg(feature = "concurrency")]
impl<K, V> fmt::Debug for ConcurrentLrukCache<K, V>
where
    K: Eq + Hash + Clone + ByteWeighted,
    V: ByteWeighted,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cache = self.inner.read();
        f.debug_struct("ConcurrentLrukCache")
            .field("k", &cache.k_value())
            .field("len", &cache.len())
            .field("used_bytes", &cache.size())
            .field("history_len", &cache.history_len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn cache(k: u32, max_bytes: u64) -> LrukCore<String, String> {
        LrukCore::new(k, max_bytes)
    }

    fn recording_cache(
        k: u32,
        max_bytes: u64,
    ) -> (LrukCore<String, String>, Arc<Mutex<Vec<String>>>) {
        let evicted = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&evicted);
        let cache = LrukCore::with_on_evicted(
            k,
            max_bytes,
            Box::new(move |k: &String, _v| log.lock().unwrap().push(k.clone())),
        );
        (cache, evicted)
    }

    mod configuration {
        use super::*;

        #[test]
        fn k_below_two_is_rejected() {
            assert!(LrukCore::<String, String>::try_new(1, 100).is_err());
            assert!(LrukCore::<String, String>::try_new(0, 100).is_err());
            assert!(LrukCore::<String, String>::try_new(2, 100).is_ok());
        }

        #[test]
        #[should_panic(expected = "k >= 2")]
        fn new_panics_on_bad_k() {
            let _ = LrukCore::<String, String>::new(1, 100);
        }

        #[test]
        fn history_tier_defaults_to_cache_budget() {
            let cache = cache(2, 512);
            assert_eq!(cache.max_bytes(), 512);
            assert_eq!(cache.history_max_bytes(), 512);
            assert_eq!(cache.k_value(), 2);
        }

        #[test]
        fn history_tier_can_be_sized_separately() {
            let cache: LrukCore<String, String> = LrukCore::with_history_bytes(3, 512, 64);
            assert_eq!(cache.max_bytes(), 512);
            assert_eq!(cache.history_max_bytes(), 64);
        }
    }

    mod promotion {
        use super::*;

        #[test]
        fn first_reference_stays_on_probation() {
            let mut cache = cache(2, 30);
            cache.put("key1".into(), "value1".into());

            assert!(cache.get(&"key1".into()).is_none());
            assert_eq!(cache.len(), 0);
            assert_eq!(cache.size(), 0);
            assert_eq!(cache.history_len(), 1);
            assert_eq!(cache.history_size(), 10);
        }

        #[test]
        fn second_reference_promotes() {
            let mut cache = cache(2, 30);
            cache.put("key2".into(), "value2".into());
            assert!(cache.get(&"key2".into()).is_none());

            cache.put("key2".into(), "value2".into());
            assert_eq!(cache.get(&"key2".into()).map(|v| v.as_str()), Some("value2"));
            assert_eq!(cache.len(), 1);
            assert_eq!(cache.size(), 10);
            assert_eq!(cache.history_len(), 0);
            assert_eq!(cache.history_size(), 0);
        }

        #[test]
        fn promotion_threshold_respects_k() {
            let mut cache = cache(3, 100);
            cache.put("key1".into(), "value1".into());
            cache.put("key1".into(), "value1".into());
            assert!(cache.get(&"key1".into()).is_none()); // 2 of 3 references

            cache.put("key1".into(), "value1".into());
            assert!(cache.get(&"key1".into()).is_some());
        }

        #[test]
        fn tiers_stay_disjoint() {
            let mut cache = cache(2, 100);
            cache.put("key1".into(), "value1".into());
            cache.put("key2".into(), "value2".into());
            cache.put("key2".into(), "value2".into());

            // key2 promoted, key1 on probation.
            let keys = cache.keys();
            assert_eq!(keys, vec!["key2".to_string()]);
            assert_eq!(cache.history_len(), 1);
            assert_eq!(cache.len() + cache.history_len(), 2);
        }

        #[test]
        fn promotion_carries_the_latest_value() {
            let mut cache = cache(2, 100);
            cache.put("key1".into(), "value1".into());
            cache.put("key1".into(), "value-two".into());
            assert_eq!(
                cache.get(&"key1".into()).map(|v| v.as_str()),
                Some("value-two")
            );
            // 4 + 9 bytes, charged to the main cache only.
            assert_eq!(cache.size(), 13);
            assert_eq!(cache.history_size(), 0);
        }
    }

    mod overwrite {
        use super::*;

        #[test]
        fn overwrite_in_cache_replaces_value() {
            let mut cache = cache(2, 30);
            cache.put("key3".into(), "value3".into());
            cache.put("key3".into(), "value3".into());
            assert!(cache.get(&"key3".into()).is_some());

            cache.put("key3".into(), "value33".into());
            assert_eq!(
                cache.get(&"key3".into()).map(|v| v.as_str()),
                Some("value33")
            );
            assert_eq!(cache.size(), 11);
        }

        #[test]
        fn history_value_replacement_adjusts_history_bytes() {
            let mut cache = cache(3, 100);
            cache.put("key1".into(), "value1".into()); // 10 bytes
            assert_eq!(cache.history_size(), 10);

            cache.put("key1".into(), "value1-longer".into()); // 4 + 13
            assert_eq!(cache.history_size(), 17);

            cache.put("key1".into(), "v".into()); // promotes at 4 + 1
            assert_eq!(cache.history_size(), 0);
            assert_eq!(cache.size(), 5);
        }
    }

    mod eviction {
        use super::*;

        #[test]
        fn main_cache_evicts_oldest_promoted_entry() {
            // K=2, budget 30: promote key2, key3 (overwritten to 11 bytes),
            // then key4. 10 + 11 + 10 = 31 > 30 pushes out key2, the entry at
            // the back of the main-cache list.
            let (mut cache, evicted) = recording_cache(2, 30);
            for _ in 0..2 {
                cache.put("key2".into(), "value2".into());
            }
            for _ in 0..2 {
                cache.put("key3".into(), "value3".into());
            }
            cache.put("key3".into(), "value33".into());
            for _ in 0..2 {
                cache.put("key4".into(), "value4".into());
            }

            assert_eq!(*evicted.lock().unwrap(), vec!["key2".to_string()]);
            assert!(cache.get(&"key2".into()).is_none());
            assert!(cache.get(&"key3".into()).is_some());
            assert!(cache.get(&"key4".into()).is_some());
            assert!(cache.size() <= 30);
        }

        #[test]
        fn history_eviction_is_silent() {
            let (mut cache, evicted) = recording_cache(2, 20);
            cache.put("key1".into(), "value1".into());
            cache.put("key2".into(), "value2".into());
            cache.put("key3".into(), "value3".into()); // history over 20: key1 discarded

            assert!(evicted.lock().unwrap().is_empty());
            assert_eq!(cache.history_len(), 2);
            assert_eq!(cache.history_size(), 20);

            // key1 aged out of probation entirely: one more put starts over.
            cache.put("key1".into(), "value1".into());
            assert!(cache.get(&"key1".into()).is_none());
        }

        #[test]
        fn aged_out_key_does_not_promote() {
            let mut cache = cache(2, 10);
            cache.put("key1".into(), "value1".into());
            cache.put("key2".into(), "value2".into()); // key1 falls off probation
            cache.put("key1".into(), "value1".into()); // visit count restarts at 1

            assert!(cache.get(&"key1".into()).is_none());
        }

        #[test]
        fn oversized_put_is_refused_for_both_tiers() {
            let mut cache = cache(2, 30);
            assert!(!cache.put("key".into(), "x".repeat(40)));
            assert_eq!(cache.history_len(), 0);
            assert_eq!(cache.len(), 0);

            let mut asym: LrukCore<String, String> = LrukCore::with_history_bytes(2, 100, 10);
            // Fits the cache budget but not probation, where it must start.
            assert!(!asym.put("key".into(), "x".repeat(20)));
            assert_eq!(asym.history_len(), 0);
        }
    }

    mod deletion {
        use super::*;

        #[test]
        fn del_removes_history_only_keys() {
            // The tier-accurate delete: a key that never got promoted is
            // still deletable.
            let (mut cache, evicted) = recording_cache(2, 100);
            cache.put("key1".into(), "value1".into());

            assert!(cache.del(&"key1".into()));
            assert_eq!(cache.history_len(), 0);
            assert_eq!(cache.history_size(), 0);
            assert!(evicted.lock().unwrap().is_empty()); // probation delete is silent

            cache.put("key1".into(), "value1".into());
            assert!(cache.get(&"key1".into()).is_none()); // visit count started over
        }

        #[test]
        fn del_removes_promoted_keys_and_fires_callback() {
            let (mut cache, evicted) = recording_cache(2, 100);
            cache.put("key1".into(), "value1".into());
            cache.put("key1".into(), "value1".into());

            assert!(cache.del(&"key1".into()));
            assert_eq!(*evicted.lock().unwrap(), vec!["key1".to_string()]);
            assert_eq!(cache.len(), 0);
            assert_eq!(cache.size(), 0);
        }

        #[test]
        fn del_of_absent_key_returns_false() {
            let mut cache = cache(2, 100);
            assert!(!cache.del(&"missing".into()));
        }
    }

    mod teardown {
        use super::*;

        #[test]
        fn clear_empties_both_tiers_silently() {
            let (mut cache, evicted) = recording_cache(2, 100);
            cache.put("key1".into(), "value1".into());
            cache.put("key2".into(), "value2".into());
            cache.put("key2".into(), "value2".into());

            cache.clear();
            assert_eq!(cache.len(), 0);
            assert_eq!(cache.history_len(), 0);
            assert_eq!(cache.size(), 0);
            assert_eq!(cache.history_size(), 0);
            assert!(evicted.lock().unwrap().is_empty());
        }
    }

    #[cfg(feature = "concurrency")]
    mod concurrent_wrapper {
        use super::*;

        #[test]
        fn shared_handle_promotes_and_reads() {
            let cache: ConcurrentLrukCache<String, String> = ConcurrentLrukCache::new(2, 100);
            cache.put("key1".into(), "value1".into());
            assert!(cache.get(&"key1".into()).is_none());
            cache.put("key1".into(), "value1".into());
            assert_eq!(
                cache.get(&"key1".into()).map(|v| v.as_str().to_owned()),
                Some("value1".to_string())
            );
            assert_eq!(cache.len(), 1);
            assert_eq!(cache.history_len(), 0);
        }

        #[test]
        fn try_new_surfaces_config_errors() {
            assert!(ConcurrentLrukCache::<String, String>::try_new(1, 100).is_err());
        }
    }
}
