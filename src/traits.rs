//! # Cache Contract
//!
//! This module defines the shared contract for the byte-bounded cache engines:
//! a single operation set every eviction policy implements, a weighting trait
//! values (and keys) use to report their byte length, and the eviction
//! callback hook.
//!
//! ## Architecture
//!
//! ```text
//!                  ┌───────────────────────────────────────────┐
//!                  │             ByteCache<K, V>               │
//!                  │                                           │
//!                  │  put(&mut, K, V) → bool                   │
//!                  │  get(&mut, &K) → Option<&Arc<V>>          │
//!                  │  del(&mut, &K) → bool                     │
//!                  │  len(&) / keys(&) / size(&)               │
//!                  └──────────────────┬────────────────────────┘
//!                                     │ implemented by
//!              ┌──────────────────────┼──────────────────────┐
//!              ▼                      ▼                      ▼
//!   ┌────────────────────┐ ┌────────────────────┐ ┌────────────────────┐
//!   │  LruCore<K, V>     │ │  LrukCore<K, V>    │ │ SampledLruCore<K,V>│
//!   │                    │ │                    │ │                    │
//!   │  recency list +    │ │  history tier +    │ │  idle timestamps + │
//!   │  hash index        │ │  main cache tier   │ │  eviction pool     │
//!   └────────────────────┘ └────────────────────┘ └────────────────────┘
//! ```
//!
//! Every engine accounts `key.byte_len() + value.byte_len()` bytes per live
//! entry and keeps the running total within the configured `max_bytes` by
//! evicting according to its policy. The concurrent wrappers
//! (`ConcurrentLruCache`, `ConcurrentLrukCache`, `ConcurrentSampledLruCache`)
//! expose the same operations with `&self` receivers behind a
//! `parking_lot::RwLock`.
//!
//! ## Operation Summary
//!
//! | Operation  | Effect on recency        | Effect on `size()`          |
//! |------------|--------------------------|-----------------------------|
//! | `put`      | entry becomes most recent| ± weight delta, may evict   |
//! | `get`      | entry becomes most recent| none                        |
//! | `peek`     | none                     | none                        |
//! | `del`      | entry removed            | − entry weight              |
//! | `keys`     | none                     | none                        |
//! | `clear`    | everything removed       | reset to 0                  |
//!
//! ## Eviction Callback
//!
//! A single optional hook supplied at construction, invoked once per entry the
//! policy destroys (byte-pressure eviction, explicit delete where the engine
//! fires it, sampled-LRU pool drains). It runs **with the engine lock held**:
//! the callback must not call back into the cache and must not block
//! indefinitely. `clear()` and dropping the cache do not fire it.

use std::sync::Arc;

/// Reports the logical byte length of a key or value.
///
/// The cache never inspects contents; it only charges
/// `key.byte_len() + value.byte_len()` against its byte budget. The query is
/// invoked under the engine lock and must be pure and cheap.
///
/// Implementations are provided for the common byte-carrying types and for
/// `&T` / `Box<T>` / `Arc<T>` wrappers around them.
///
/// # Example
///
/// ```
/// use bytecache::traits::ByteWeighted;
///
/// assert_eq!("value1".byte_len(), 6);
/// assert_eq!(vec![0u8; 32].byte_len(), 32);
/// ```
pub trait ByteWeighted {
    /// Logical length of this payload in bytes.
    fn byte_len(&self) -> usize;
}

impl ByteWeighted for str {
    #[inline]
    fn byte_len(&self) -> usize {
        self.len()
    }
}

impl ByteWeighted for String {
    #[inline]
    fn byte_len(&self) -> usize {
        self.len()
    }
}

impl ByteWeighted for [u8] {
    #[inline]
    fn byte_len(&self) -> usize {
        self.len()
    }
}

impl ByteWeighted for Vec<u8> {
    #[inline]
    fn byte_len(&self) -> usize {
        self.len()
    }
}

impl<const N: usize> ByteWeighted for [u8; N] {
    #[inline]
    fn byte_len(&self) -> usize {
        N
    }
}

impl<T: ByteWeighted + ?Sized> ByteWeighted for &T {
    #[inline]
    fn byte_len(&self) -> usize {
        (**self).byte_len()
    }
}

impl<T: ByteWeighted + ?Sized> ByteWeighted for Box<T> {
    #[inline]
    fn byte_len(&self) -> usize {
        (**self).byte_len()
    }
}

impl<T: ByteWeighted + ?Sized> ByteWeighted for Arc<T> {
    #[inline]
    fn byte_len(&self) -> usize {
        (**self).byte_len()
    }
}

/// User-supplied hook invoked once per entry the cache destroys.
///
/// Receives the evicted key and a shared reference to the evicted value.
/// Runs with the engine lock held; see the module docs for the re-entrancy
/// rule.
pub type EvictionCallback<K, V> = Box<dyn Fn(&K, &Arc<V>) + Send + Sync + 'static>;

/// Computes the byte weight charged for one entry.
#[inline]
pub(crate) fn entry_weight<K, V>(key: &K, value: &V) -> u64
where
    K: ByteWeighted,
    V: ByteWeighted,
{
    (key.byte_len() + value.byte_len()) as u64
}

/// Uniform operation contract implemented by every eviction engine.
///
/// The single-threaded cores implement this trait directly; the concurrent
/// wrappers mirror it with `&self` receivers. Values are stored as `Arc<V>`
/// so lookups hand out shared handles without cloning payloads.
///
/// # Example
///
/// ```
/// use bytecache::policy::lru::LruCore;
/// use bytecache::traits::ByteCache;
///
/// fn warm<C: ByteCache<String, String>>(cache: &mut C, pairs: &[(&str, &str)]) {
///     for (k, v) in pairs {
///         cache.put(k.to_string(), v.to_string());
///     }
/// }
///
/// let mut cache: LruCore<String, String> = LruCore::new(1024);
/// warm(&mut cache, &[("key1", "value1"), ("key2", "value2")]);
/// assert_eq!(cache.len(), 2);
/// assert_eq!(cache.size(), 20);
/// ```
pub trait ByteCache<K, V> {
    /// Inserts or overwrites an entry, wrapping the value in `Arc` internally.
    ///
    /// Returns `false` only when the entry can never fit: its own weight
    /// exceeds `max_bytes`. In that case nothing changes. Otherwise the engine
    /// evicts under byte pressure until the entry fits and returns `true`.
    fn put(&mut self, key: K, value: V) -> bool {
        self.put_arc(key, Arc::new(value))
    }

    /// Inserts or overwrites an entry from a pre-wrapped `Arc<V>`.
    ///
    /// Zero-copy variant of [`put`](Self::put) for values already shared.
    fn put_arc(&mut self, key: K, value: Arc<V>) -> bool;

    /// Looks up a value and marks the key as most recently used.
    ///
    /// A miss returns `None` and is not an error. Never changes `size()`.
    fn get(&mut self, key: &K) -> Option<&Arc<V>>;

    /// Looks up a value without any recency side effect.
    fn peek(&self, key: &K) -> Option<&Arc<V>>;

    /// Checks key existence without any recency side effect.
    fn contains(&self, key: &K) -> bool;

    /// Removes an entry if present, returning whether a key was removed.
    ///
    /// Decrements `size()` by the entry weight. Whether the eviction callback
    /// fires depends on the engine (LRU and sampled LRU fire it; LRU-K fires
    /// it for main-cache entries only).
    fn del(&mut self, key: &K) -> bool;

    /// Number of live entries (main cache only for LRU-K).
    fn len(&self) -> usize;

    /// Returns `true` if the cache holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the live key set. Order unspecified; no duplicates.
    fn keys(&self) -> Vec<K>;

    /// Current byte usage: the sum of entry weights over live entries.
    fn size(&self) -> u64;

    /// Configured byte ceiling.
    fn max_bytes(&self) -> u64;

    /// Discards every entry without firing the eviction callback.
    fn clear(&mut self);
}

/// Marker trait for cache handles that are safe to share across threads.
///
/// Implemented by the `Concurrent*` wrappers. Use as a bound when an API
/// requires a thread-safe cache:
///
/// ```
/// use bytecache::traits::ConcurrentByteCache;
///
/// fn spawn_workers<C: ConcurrentByteCache + Clone + 'static>(cache: C) {
///     // safe to move clones into threads
/// }
/// ```
pub trait ConcurrentByteCache: Send + Sync {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_weighted_strings_and_bytes() {
        assert_eq!("".byte_len(), 0);
        assert_eq!("key1".byte_len(), 4);
        assert_eq!(String::from("value1").byte_len(), 6);
        assert_eq!([0u8; 16].byte_len(), 16);
        assert_eq!(vec![1u8, 2, 3].byte_len(), 3);
    }

    #[test]
    fn byte_weighted_through_wrappers() {
        let s = String::from("shared");
        assert_eq!((&s).byte_len(), 6);
        assert_eq!(Box::new(s.clone()).byte_len(), 6);
        assert_eq!(Arc::new(s).byte_len(), 6);

        let boxed: Box<[u8]> = vec![0u8; 8].into_boxed_slice();
        assert_eq!(boxed.byte_len(), 8);
    }

    #[test]
    fn entry_weight_sums_key_and_value() {
        let key = String::from("key1");
        let value = String::from("value1");
        assert_eq!(entry_weight(&key, &value), 10);
    }
}
