//! # Byte-Bounded LRU Cache
//!
//! Classical least-recently-used eviction under a byte budget. One
//! doubly-linked recency list orders live entries from most recent (front) to
//! least recent (back); a hash index maps keys to list nodes; a running byte
//! total keeps `used_bytes <= max_bytes` by popping the back of the list.
//!
//! ## Architecture
//!
//! ```text
//!   ┌─────────────────────────────────────────────────────────────────────┐
//!   │                         LruCore<K, V>                               │
//!   │                                                                     │
//!   │   ┌───────────────────────────────────────────────────────────────┐ │
//!   │   │  FxHashMap<K, NonNull<Node>>                                  │ │
//!   │   │                                                               │ │
//!   │   │  ┌─────────┬──────────────────────────────────────────┐       │ │
//!   │   │  │   Key   │  Node ptr                                │       │ │
//!   │   │  ├─────────┼──────────────────────────────────────────┤       │ │
//!   │   │  │  key1   │  ───────────────────────────────────┐    │       │ │
//!   │   │  │  key2   │  ─────────────────────────────┐     │    │       │ │
//!   │   │  └─────────┴───────────────────────────────┼─────┼────┘       │ │
//!   │   └──────────────────────────────────────────  │  ── │  ──────────┘ │
//!   │                                                ▼     ▼              │
//!   │   head ──► ┌────────┐ ◄──► ┌────────┐ ◄──► ┌────────┐ ◄── tail     │
//!   │    (MRU)   │ weight │      │ weight │      │ weight │   (LRU)      │
//!   │            │ key    │      │ key    │      │ key    │              │
//!   │            │ Arc<V> │      │ Arc<V> │      │ Arc<V> │              │
//!   │            └────────┘      └────────┘      └────────┘              │
//!   │                                                                     │
//!   │   used_bytes = Σ node.weight     weight = key bytes + value bytes   │
//!   └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Operations
//!
//! | Method      | Complexity | Recency effect       | Byte effect          |
//! |-------------|------------|----------------------|----------------------|
//! | `put`       | O(1)*      | front                | ± delta, may evict   |
//! | `get`       | O(1)       | front                | none                 |
//! | `peek`      | O(1)       | none                 | none                 |
//! | `del`       | O(1)       | unlinked             | − weight             |
//! | `keys`      | O(n)       | none                 | none                 |
//!
//! \* amortized; the eviction loop pops back nodes until the budget holds.
//!
//! ## Eviction
//!
//! After any insert or overwrite, while `used_bytes > max_bytes` the back
//! node is unlinked, unindexed, its weight subtracted, and the eviction
//! callback fired once for it. A put whose entry alone outweighs `max_bytes`
//! is refused up front (`false`, nothing changes): evicting the entire
//! working set could never make it fit sustainably.
//!
//! ## Thread Safety
//!
//! - [`LruCore`] is **not** thread-safe; it is the single-threaded engine.
//! - [`ConcurrentLruCache`] wraps it in `parking_lot::RwLock`. `get` takes
//!   the write lock because it moves the hit node to the front; `peek`,
//!   `contains`, `len`, `size`, and `keys` take the read lock.

use std::fmt;
use std::hash::Hash;
use std::ptr::NonNull;
use std::sync::Arc;

#[cfg(feature = "concurrency")]
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::traits::{entry_weight, ByteCache, ByteWeighted, EvictionCallback};

/// Node in the recency list.
///
/// Layout keeps the list pointers first for traversal, then the precomputed
/// weight needed on every eviction, then key and value.
#[repr(C)]
struct Node<K, V> {
    prev: Option<NonNull<Node<K, V>>>,
    next: Option<NonNull<Node<K, V>>>,
    weight: u64,
    key: K,
    value: Arc<V>,
}

/// Single-threaded byte-bounded LRU engine.
///
/// Keys are cloned on insert and owned by the cache; values are stored as
/// `Arc<V>` so lookups hand out shared handles. The weight of each entry
/// (`key.byte_len() + value.byte_len()`) is computed once at insert and kept
/// in the node, so a value whose reported length drifts afterwards cannot
/// corrupt the accounting.
///
/// # Example
///
/// ```
/// use bytecache::policy::lru::LruCore;
/// use bytecache::traits::ByteCache;
///
/// let mut cache: LruCore<String, String> = LruCore::new(30);
/// cache.put("key1".into(), "value1".into()); // 10 bytes
/// cache.put("key2".into(), "value2".into()); // 10 bytes
/// cache.put("key3".into(), "value3".into()); // 10 bytes
///
/// cache.get(&"key1".into());                 // key1 becomes MRU
/// cache.put("key4".into(), "value4".into()); // evicts key2, the oldest
///
/// assert!(cache.contains(&"key1".into()));
/// assert!(!cache.contains(&"key2".into()));
/// assert_eq!(cache.size(), 30);
/// ```
pub struct LruCore<K, V>
where
    K: Eq + Hash + Clone + ByteWeighted,
    V: ByteWeighted,
{
    map: FxHashMap<K, NonNull<Node<K, V>>>,
    head: Option<NonNull<Node<K, V>>>,
    tail: Option<NonNull<Node<K, V>>>,
    max_bytes: u64,
    used_bytes: u64,
    on_evicted: Option<EvictionCallback<K, V>>,
}

// SAFETY: LruCore can be sent between threads if K and V are Send. The raw
// pointers only reference heap memory owned by the struct, and the callback
// type is already Send + Sync.
unsafe impl<K, V> Send for LruCore<K, V>
where
    K: Eq + Hash + Clone + ByteWeighted + Send,
    V: ByteWeighted + Send,
{
}

// SAFETY: shared access never dereferences the node pointers mutably; actual
// cross-thread mutation is serialized by the RwLock in ConcurrentLruCache.
unsafe impl<K, V> Sync for LruCore<K, V>
where
    K: Eq + Hash + Clone + ByteWeighted + Sync,
    V: ByteWeighted + Sync,
{
}

impl<K, V> LruCore<K, V>
where
    K: Eq + Hash + Clone + ByteWeighted,
    V: ByteWeighted,
{
    /// Creates an LRU engine bounded by `max_bytes`.
    ///
    /// A budget of 0 creates a cache that refuses every insert.
    #[inline]
    pub fn new(max_bytes: u64) -> Self {
        LruCore {
            map: FxHashMap::default(),
            head: None,
            tail: None,
            max_bytes,
            used_bytes: 0,
            on_evicted: None,
        }
    }

    /// Creates an LRU engine with an eviction callback.
    ///
    /// The callback is invoked once per entry removed by byte pressure or by
    /// [`del`](ByteCache::del), with the engine lock held.
    ///
    /// # Example
    ///
    /// ```
    /// use std::sync::{Arc, Mutex};
    /// use bytecache::policy::lru::LruCore;
    /// use bytecache::traits::ByteCache;
    ///
    /// let evicted = Arc::new(Mutex::new(Vec::new()));
    /// let log = Arc::clone(&evicted);
    /// let mut cache: LruCore<String, String> =
    ///     LruCore::with_on_evicted(20, Box::new(move |k: &String, _v| log.lock().unwrap().push(k.clone())));
    ///
    /// cache.put("key1".into(), "value1".into());
    /// cache.put("key2".into(), "value2".into());
    /// cache.put("key3".into(), "value3".into()); // pushes key1 out
    ///
    /// assert_eq!(*evicted.lock().unwrap(), vec!["key1".to_string()]);
    /// ```
    #[inline]
    pub fn with_on_evicted(max_bytes: u64, on_evicted: EvictionCallback<K, V>) -> Self {
        let mut cache = Self::new(max_bytes);
        cache.on_evicted = Some(on_evicted);
        cache
    }

    /// Registers or replaces the eviction callback.
    #[inline]
    pub fn set_on_evicted(&mut self, on_evicted: EvictionCallback<K, V>) {
        self.on_evicted = Some(on_evicted);
    }

    /// Detach a node from the linked list without removing it from the map.
    #[inline(always)]
    fn detach(&mut self, node_ptr: NonNull<Node<K, V>>) {
        unsafe {
            let node = node_ptr.as_ref();
            let prev = node.prev;
            let next = node.next;

            match prev {
                Some(mut p) => p.as_mut().next = next,
                None => self.head = next,
            }

            match next {
                Some(mut n) => n.as_mut().prev = prev,
                None => self.tail = prev,
            }
        }
    }

    /// Attach a node at the front (MRU position).
    #[inline(always)]
    fn attach_front(&mut self, mut node_ptr: NonNull<Node<K, V>>) {
        unsafe {
            let node = node_ptr.as_mut();
            node.prev = None;
            node.next = self.head;

            match self.head {
                Some(mut h) => h.as_mut().prev = Some(node_ptr),
                None => self.tail = Some(node_ptr),
            }

            self.head = Some(node_ptr);
        }
    }

    /// Pop the tail node (LRU victim) and return it.
    #[inline(always)]
    fn pop_tail(&mut self) -> Option<Box<Node<K, V>>> {
        self.tail.map(|tail_ptr| unsafe {
            let node = Box::from_raw(tail_ptr.as_ptr());

            self.tail = node.prev;
            match self.tail {
                Some(mut t) => t.as_mut().next = None,
                None => self.head = None,
            }

            node
        })
    }

    /// Evicts the least recently used entry under byte pressure.
    fn evict_oldest(&mut self) {
        if let Some(node) = self.pop_tail() {
            self.map.remove(&node.key);
            self.used_bytes -= node.weight;
            if let Some(cb) = &self.on_evicted {
                cb(&node.key, &node.value);
            }
        }
    }

    /// Validate internal invariants (debug builds only).
    fn validate_invariants(&self) {
        #[cfg(debug_assertions)]
        {
            if self.map.is_empty() {
                debug_assert!(self.head.is_none());
                debug_assert!(self.tail.is_none());
                debug_assert_eq!(self.used_bytes, 0);
                return;
            }

            let mut count = 0usize;
            let mut weight_sum = 0u64;
            let mut current = self.head;
            while let Some(ptr) = current {
                count += 1;
                unsafe {
                    let node = ptr.as_ref();
                    debug_assert!(self.map.contains_key(&node.key));
                    weight_sum += node.weight;
                    current = node.next;
                }
                if count > self.map.len() {
                    panic!("cycle detected in recency list");
                }
            }

            debug_assert_eq!(count, self.map.len());
            debug_assert_eq!(weight_sum, self.used_bytes);
        }
    }
}

impl<K, V> ByteCache<K, V> for LruCore<K, V>
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

        if let Some(&node_ptr) = self.map.get(&key) {
            // Overwrite in place, adjust by the weight delta, move to front.
            unsafe {
                let node = &mut *node_ptr.as_ptr();
                self.used_bytes = self.used_bytes - node.weight + weight;
                node.weight = weight;
                node.value = value;
            }
            self.detach(node_ptr);
            self.attach_front(node_ptr);
        } else {
            let node = Box::new(Node {
                prev: None,
                next: None,
                weight,
                key: key.clone(),
                value,
            });
            let node_ptr = NonNull::new(Box::into_raw(node)).unwrap();
            self.map.insert(key, node_ptr);
            self.attach_front(node_ptr);
            self.used_bytes += weight;
        }

        while self.used_bytes > self.max_bytes {
            self.evict_oldest();
        }

        self.validate_invariants();
        true
    }

    fn get(&mut self, key: &K) -> Option<&Arc<V>> {
        let node_ptr = *self.map.get(key)?;

        self.detach(node_ptr);
        self.attach_front(node_ptr);

        unsafe { Some(&(*node_ptr.as_ptr()).value) }
    }

    fn peek(&self, key: &K) -> Option<&Arc<V>> {
        self.map
            .get(key)
            .map(|node_ptr| unsafe { &(*node_ptr.as_ptr()).value })
    }

    #[inline]
    fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    fn del(&mut self, key: &K) -> bool {
        let Some(node_ptr) = self.map.remove(key) else {
            return false;
        };

        self.detach(node_ptr);
        let node = unsafe { Box::from_raw(node_ptr.as_ptr()) };
        self.used_bytes -= node.weight;
        if let Some(cb) = &self.on_evicted {
            cb(&node.key, &node.value);
        }

        self.validate_invariants();
        true
    }

    #[inline]
    fn len(&self) -> usize {
        self.map.len()
    }

    fn keys(&self) -> Vec<K> {
        self.map.keys().cloned().collect()
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
        while self.pop_tail().is_some() {}
        self.map.clear();
        self.used_bytes = 0;
    }
}

// Free all heap-allocated nodes when the engine is dropped.
impl<K, V> Drop for LruCore<K, V>
where
    K: Eq + Hash + Clone + ByteWeighted,
    V: ByteWeighted,
{
    fn drop(&mut self) {
        while self.pop_tail().is_some() {}
    }
}

impl<K, V> fmt::Debug for LruCore<K, V>
where
    K: Eq + Hash + Clone + ByteWeighted,
    V: ByteWeighted,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruCore")
            .field("len", &self.len())
            .field("used_bytes", &self.used_bytes)
            .field("max_bytes", &self.max_bytes)
            .finish_non_exhaustive()
    }
}

/// Thread-safe LRU cache handle.
///
/// Cloneable; clones share the same underlying engine. `get` acquires the
/// write lock because a hit moves the entry to the MRU position; recency
/// maintenance under a shared lease is exactly the race this wrapper exists
/// to rule out. Use [`peek`](ConcurrentLruCache::peek) for a read-locked
/// lookup with no recency effect.
///
/// # Example
///
/// ```
/// use bytecache::policy::lru::ConcurrentLruCache;
///
/// let cache: ConcurrentLruCache<String, String> = ConcurrentLruCache::new(1024);
/// cache.put("key1".into(), "value1".into());
///
/// let worker = cache.clone();
/// std::thread::spawn(move || {
///     worker.put("key2".into(), "value2".into());
/// })
/// .join()
/// .unwrap();
///
/// assert_eq!(cache.len(), 2);
/// ```
#[cfg(feature = "concurrency")]
pub struct ConcurrentLruCache<K, V>
where
    K: Eq + Hash + Clone + ByteWeighted,
    V: ByteWeighted,
{
    inner: Arc<RwLock<LruCore<K, V>>>,
}

// Manual impl: cloning the handle must not require V: Clone.
#[cfg(feature = "concurrency")]
impl<K, V> Clone for ConcurrentLruCache<K, V>
where
    K: Eq + Hash + Clone + ByteWeighted,
    V: ByteWeighted,
{
    fn clone(&self) -> Self {
        ConcurrentLruCache {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(feature = "concurrency")]
impl<K, V> ConcurrentLruCache<K, V>
where
    K: Eq + Hash + Clone + ByteWeighted + Send + Sync,
    V: ByteWeighted + Send + Sync,
{
    /// Creates a thread-safe LRU cache bounded by `max_bytes`.
    pub fn new(max_bytes: u64) -> Self {
        Self::from_core(LruCore::new(max_bytes))
    }

    pub(crate) fn from_core(core: LruCore<K, V>) -> Self {
        ConcurrentLruCache {
            inner: Arc::new(RwLock::new(core)),
        }
    }

    /// Creates a thread-safe LRU cache with an eviction callback.
    pub fn with_on_evicted(max_bytes: u64, on_evicted: EvictionCallback<K, V>) -> Self {
        ConcurrentLruCache {
            inner: Arc::new(RwLock::new(LruCore::with_on_evicted(max_bytes, on_evicted))),
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

    /// Looks up a value, moving it to the MRU position. Write lock.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.inner.write().get(key).map(Arc::clone)
    }

    /// Looks up a value without touching recency order. Read lock.
    pub fn peek(&self, key: &K) -> Option<Arc<V>> {
        self.inner.read().peek(key).map(Arc::clone)
    }

    /// Checks key existence without touching recency order. Read lock.
    pub fn contains(&self, key: &K) -> bool {
        self.inner.read().contains(key)
    }

    /// Removes an entry if present. See [`ByteCache::del`].
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

    /// Discards every entry without firing the eviction callback.
    pub fn clear(&self) {
        self.inner.write().clear()
    }
}

#[cfg(feature = "concurrency")]
impl<K, V> crate::traits::ConcurrentByteCache for ConcurrentLruCache<K, V>
where
    K: Eq + Hash + Clone + ByteWeighted + Send + Sync,
    V: ByteWeighted + Send + Sync,
{
}

#[cfg(feature = "concurrency")]
impl<K, V> fmt::Debug for ConcurrentLruCache<K, V>
where
    K: Eq + Hash + Clone + ByteWeighted,
    V: ByteWeighted,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cache = self.inner.read();
        f.debug_struct("ConcurrentLruCache")
            .field("len", &cache.len())
            .field("used_bytes", &cache.size())
            .field("max_bytes", &cache.max_bytes())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn cache(max_bytes: u64) -> LruCore<String, String> {
        LruCore::new(max_bytes)
    }

    fn recording_cache(
        max_bytes: u64,
    ) -> (LruCore<String, String>, Arc<Mutex<Vec<String>>>) {
        let evicted = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&evicted);
        let cache = LruCore::with_on_evicted(
            max_bytes,
            Box::new(move |k: &String, _v| log.lock().unwrap().push(k.clone())),
        );
        (cache, evicted)
    }

    mod basic_behavior {
        use super::*;

        #[test]
        fn put_then_get_round_trips() {
            let mut cache = cache(100);
            assert!(cache.put("key1".into(), "value1".into()));
            assert_eq!(cache.get(&"key1".into()).map(|v| v.as_str()), Some("value1"));
            assert_eq!(cache.len(), 1);
        }

        #[test]
        fn get_miss_returns_none() {
            let mut cache = cache(100);
            cache.put("key1".into(), "value1".into());
            assert!(cache.get(&"missing".into()).is_none());
        }

        #[test]
        fn overwrite_replaces_value_in_place() {
            let mut cache = cache(100);
            cache.put("key1".into(), "value1".into());
            cache.put("key1".into(), "value2".into());
            assert_eq!(cache.len(), 1);
            assert_eq!(cache.get(&"key1".into()).map(|v| v.as_str()), Some("value2"));
        }

        #[test]
        fn del_removes_and_reports() {
            let mut cache = cache(100);
            cache.put("key1".into(), "value1".into());
            assert!(cache.del(&"key1".into()));
            assert!(!cache.del(&"key1".into()));
            assert!(cache.get(&"key1".into()).is_none());
            assert_eq!(cache.len(), 0);
        }

        #[test]
        fn keys_snapshot_is_exact() {
            let mut cache = cache(100);
            cache.put("key1".into(), "value1".into());
            cache.put("key2".into(), "value2".into());
            let mut keys = cache.keys();
            keys.sort();
            assert_eq!(keys, vec!["key1".to_string(), "key2".to_string()]);
        }

        #[test]
        fn empty_cache_operations() {
            let mut cache = cache(100);
            assert_eq!(cache.len(), 0);
            assert!(cache.is_empty());
            assert_eq!(cache.size(), 0);
            assert!(cache.keys().is_empty());
            assert!(cache.get(&"key1".into()).is_none());
            assert!(cache.peek(&"key1".into()).is_none());
            assert!(!cache.del(&"key1".into()));
        }

        #[test]
        fn clear_discards_everything_silently() {
            let (mut cache, evicted) = recording_cache(100);
            cache.put("key1".into(), "value1".into());
            cache.put("key2".into(), "value2".into());
            cache.clear();
            assert_eq!(cache.len(), 0);
            assert_eq!(cache.size(), 0);
            assert!(evicted.lock().unwrap().is_empty());
        }

        #[test]
        fn put_arc_shares_the_value() {
            let mut cache = cache(100);
            let shared = Arc::new(String::from("value1"));
            cache.put_arc("key1".into(), Arc::clone(&shared));
            assert!(Arc::ptr_eq(cache.peek(&"key1".into()).unwrap(), &shared));
        }
    }

    mod byte_accounting {
        use super::*;

        #[test]
        fn size_sums_key_and_value_lengths() {
            let mut cache = cache(100);
            cache.put("key1".into(), "value1".into()); // 4 + 6
            cache.put("key2".into(), "v".into()); // 4 + 1
            assert_eq!(cache.size(), 15);
        }

        #[test]
        fn overwrite_adjusts_by_delta() {
            let mut cache = cache(100);
            cache.put("key1".into(), "value1".into());
            assert_eq!(cache.size(), 10);
            cache.put("key1".into(), "value-longer".into());
            assert_eq!(cache.size(), 16);
            cache.put("key1".into(), "v".into());
            assert_eq!(cache.size(), 5);
        }

        #[test]
        fn del_subtracts_entry_weight() {
            let mut cache = cache(100);
            cache.put("key1".into(), "value1".into());
            cache.put("key2".into(), "value2".into());
            cache.del(&"key1".into());
            assert_eq!(cache.size(), 10);
        }

        #[test]
        fn size_never_exceeds_budget() {
            let mut cache = cache(25);
            for i in 0..20 {
                cache.put(format!("key{i}"), format!("value{i}"));
                assert!(cache.size() <= 25);
            }
        }
    }

    mod eviction {
        use super::*;

        #[test]
        fn touched_entry_survives_pressure() {
            // capacity 30, three 10-byte entries, touch key1, insert key4:
            // key2 is the oldest untouched entry and must go.
            let (mut cache, evicted) = recording_cache(30);
            cache.put("key1".into(), "value1".into());
            cache.put("key2".into(), "value2".into());
            cache.put("key3".into(), "value3".into());

            assert!(cache.get(&"key1".into()).is_some());
            cache.put("key4".into(), "value4".into());

            assert_eq!(*evicted.lock().unwrap(), vec!["key2".to_string()]);
            assert!(cache.get(&"key1".into()).is_some());
            assert!(cache.get(&"key2".into()).is_none());
            assert!(cache.get(&"key3".into()).is_some());
            assert!(cache.get(&"key4".into()).is_some());
            assert_eq!(cache.size(), 30);
        }

        #[test]
        fn eviction_walks_back_to_front() {
            let (mut cache, evicted) = recording_cache(20);
            cache.put("key1".into(), "value1".into());
            cache.put("key2".into(), "value2".into());
            // 21 bytes: both existing entries must go before it fits.
            cache.put("key3".into(), "value3-longer".into());

            assert_eq!(
                *evicted.lock().unwrap(),
                vec!["key1".to_string(), "key2".to_string()]
            );
            assert_eq!(cache.len(), 1);
            assert!(cache.contains(&"key3".into()));
        }

        #[test]
        fn oversized_put_is_refused() {
            let (mut cache, evicted) = recording_cache(30);
            cache.put("key1".into(), "value1".into());

            let big = "x".repeat(40);
            assert!(!cache.put("huge".into(), big));

            // Nothing changed: no eviction, no insert.
            assert!(evicted.lock().unwrap().is_empty());
            assert_eq!(cache.len(), 1);
            assert_eq!(cache.size(), 10);
            assert!(!cache.contains(&"huge".into()));
        }

        #[test]
        fn oversized_overwrite_is_refused() {
            let mut cache = cache(30);
            cache.put("key1".into(), "value1".into());
            assert!(!cache.put("key1".into(), "x".repeat(40)));
            assert_eq!(cache.get(&"key1".into()).map(|v| v.as_str()), Some("value1"));
            assert_eq!(cache.size(), 10);
        }

        #[test]
        fn zero_budget_refuses_everything() {
            let mut cache = cache(0);
            assert!(!cache.put("key1".into(), "value1".into()));
            assert_eq!(cache.len(), 0);
            assert_eq!(cache.size(), 0);
        }

        #[test]
        fn overwrite_does_not_evict_its_own_entry() {
            let mut cache = cache(12);
            cache.put("key1".into(), "v1".into()); // 6 bytes
            cache.put("key2".into(), "v2".into()); // 6 bytes
            cache.put("key1".into(), "value123".into()); // grows to 12 bytes
            assert!(cache.contains(&"key1".into()));
            assert!(!cache.contains(&"key2".into()));
            assert_eq!(cache.size(), 12);
        }
    }

    mod callbacks {
        use super::*;

        #[test]
        fn del_fires_callback_once() {
            let (mut cache, evicted) = recording_cache(100);
            cache.put("key1".into(), "value1".into());
            cache.del(&"key1".into());
            assert_eq!(*evicted.lock().unwrap(), vec!["key1".to_string()]);
        }

        #[test]
        fn del_of_absent_key_is_silent() {
            let (mut cache, evicted) = recording_cache(100);
            cache.del(&"key1".into());
            assert!(evicted.lock().unwrap().is_empty());
        }

        #[test]
        fn callback_sees_the_evicted_value() {
            let seen = Arc::new(Mutex::new(Vec::new()));
            let log = Arc::clone(&seen);
            let mut cache: LruCore<String, String> = LruCore::with_on_evicted(
                10,
                Box::new(move |k, v| log.lock().unwrap().push((k.clone(), v.as_str().to_owned()))),
            );
            cache.put("key1".into(), "value1".into());
            cache.put("key2".into(), "value2".into());
            assert_eq!(
                *seen.lock().unwrap(),
                vec![("key1".to_string(), "value1".to_string())]
            );
        }
    }

    #[cfg(feature = "concurrency")]
    mod concurrent_wrapper {
        use super::*;

        #[test]
        fn shared_handle_round_trips() {
            let cache: ConcurrentLruCache<String, String> = ConcurrentLruCache::new(100);
            cache.put("key1".into(), "value1".into());
            assert_eq!(cache.get(&"key1".into()).map(|v| v.as_str().to_owned()),
                Some("value1".to_string()));
            assert_eq!(cache.size(), 10);
            assert!(cache.del(&"key1".into()));
            assert!(cache.is_empty());
        }

        #[test]
        fn peek_does_not_promote() {
            let cache: ConcurrentLruCache<String, String> = ConcurrentLruCache::new(20);
            cache.put("key1".into(), "value1".into());
            cache.put("key2".into(), "value2".into());
            cache.peek(&"key1".into());
            cache.put("key3".into(), "value3".into());
            // key1 stayed LRU despite the peek.
            assert!(!cache.contains(&"key1".into()));
            assert!(cache.contains(&"key2".into()));
        }

        #[test]
        fn clones_share_state() {
            let cache: ConcurrentLruCache<String, String> = ConcurrentLruCache::new(100);
            let other = cache.clone();
            cache.put("key1".into(), "value1".into());
            assert!(other.contains(&"key1".into()));
        }
    }
}
