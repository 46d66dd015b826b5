//! Unified cache builder for all eviction policies.
//!
//! Produces a policy-erased, thread-safe [`Cache`] handle so callers can pick
//! an eviction policy at runtime without naming the concrete engine type.
//!
//! ## Example
//!
//! ```rust
//! use bytecache::builder::{Cache, CacheBuilder, CachePolicy};
//!
//! let cache: Cache<String, String> = CacheBuilder::new(1024).build(CachePolicy::Lru);
//! cache.put("key1".into(), "value1".into());
//! assert_eq!(cache.get(&"key1".into()).map(|v| v.as_str().to_owned()),
//!     Some("value1".to_string()));
//! ```

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use crate::error::ConfigError;
use crate::policy::lru::{ConcurrentLruCache, LruCore};
use crate::policy::lru_k::{ConcurrentLrukCache, LrukCore};
use crate::policy::sampled::{ConcurrentSampledLruCache, SampledLruCore};
use crate::traits::{ByteWeighted, EvictionCallback};

/// Available eviction policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Least recently used eviction over a single recency list.
    Lru,
    /// LRU-K: keys are promoted to the main cache after `k` references.
    LruK { k: u32 },
    /// Redis-style approximated LRU with `max_samples` random draws per
    /// eviction round.
    SampledLru { max_samples: usize },
}

/// Policy-erased, thread-safe cache handle.
///
/// Every method takes `&self`; the handle is cheap to clone and clones share
/// the underlying engine. All operations follow the contract documented on
/// [`ByteCache`](crate::traits::ByteCache), with the per-policy differences
/// (LRU-K probation visibility, sampled-LRU approximation) described in the
/// respective policy modules.
pub struct Cache<K, V>
where
    K: Eq + Hash + Clone + ByteWeighted,
    V: ByteWeighted,
{
    inner: CacheInner<K, V>,
}

enum CacheInner<K, V>
where
    K: Eq + Hash + Clone + ByteWeighted,
    V: ByteWeighted,
{
    Lru(ConcurrentLruCache<K, V>),
    LruK(ConcurrentLrukCache<K, V>),
    Sampled(ConcurrentSampledLruCache<K, V>),
}

impl<K, V> fmt::Debug for Cache<K, V>
where
    K: Eq + Hash + Clone + ByteWeighted,
    V: ByteWeighted,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            CacheInner::Lru(lru) => lru.fmt(f),
            CacheInner::LruK(lruk) => lruk.fmt(f),
            CacheInner::Sampled(sampled) => sampled.fmt(f),
        }
    }
}

// Manual impl: cloning the handle must not require V: Clone.
impl<K, V> Clone for Cache<K, V>
where
    K: Eq + Hash + Clone + ByteWeighted,
    V: ByteWeighted,
{
    fn clone(&self) -> Self {
        let inner = match &self.inner {
            CacheInner::Lru(lru) => CacheInner::Lru(lru.clone()),
            CacheInner::LruK(lruk) => CacheInner::LruK(lruk.clone()),
            CacheInner::Sampled(sampled) => CacheInner::Sampled(sampled.clone()),
        };
        Cache { inner }
    }
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone + ByteWeighted + Send + Sync,
    V: ByteWeighted + Send + Sync,
{
    /// Inserts or overwrites an entry. Returns `false` only for entries that
    /// can never fit under the byte budget.
    pub fn put(&self, key: K, value: V) -> bool {
        match &self.inner {
            CacheInner::Lru(lru) => lru.put(key, value),
            CacheInner::LruK(lruk) => lruk.put(key, value),
            CacheInner::Sampled(sampled) => sampled.put(key, value),
        }
    }

    /// Inserts a pre-wrapped `Arc<V>` without re-wrapping.
    pub fn put_arc(&self, key: K, value: Arc<V>) -> bool {
        match &self.inner {
            CacheInner::Lru(lru) => lru.put_arc(key, value),
            CacheInner::LruK(lruk) => lruk.put_arc(key, value),
            CacheInner::Sampled(sampled) => sampled.put_arc(key, value),
        }
    }

    /// Looks up a value, marking the key recently used.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        match &self.inner {
            CacheInner::Lru(lru) => lru.get(key),
            CacheInner::LruK(lruk) => lruk.get(key),
            CacheInner::Sampled(sampled) => sampled.get(key),
        }
    }

    /// Looks up a value without any recency side effect.
    pub fn peek(&self, key: &K) -> Option<Arc<V>> {
        match &self.inner {
            CacheInner::Lru(lru) => lru.peek(key),
            CacheInner::LruK(lruk) => lruk.peek(key),
            CacheInner::Sampled(sampled) => sampled.peek(key),
        }
    }

    /// Checks key existence without any recency side effect.
    pub fn contains(&self, key: &K) -> bool {
        match &self.inner {
            CacheInner::Lru(lru) => lru.contains(key),
            CacheInner::LruK(lruk) => lruk.contains(key),
            CacheInner::Sampled(sampled) => sampled.contains(key),
        }
    }

    /// Removes an entry if present.
    pub fn del(&self, key: &K) -> bool {
        match &self.inner {
            CacheInner::Lru(lru) => lru.del(key),
            CacheInner::LruK(lruk) => lruk.del(key),
            CacheInner::Sampled(sampled) => sampled.del(key),
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        match &self.inner {
            CacheInner::Lru(lru) => lru.len(),
            CacheInner::LruK(lruk) => lruk.len(),
            CacheInner::Sampled(sampled) => sampled.len(),
        }
    }

    /// Returns `true` if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the live key set.
    pub fn keys(&self) -> Vec<K> {
        match &self.inner {
            CacheInner::Lru(lru) => lru.keys(),
            CacheInner::LruK(lruk) => lruk.keys(),
            CacheInner::Sampled(sampled) => sampled.keys(),
        }
    }

    /// Current byte usage.
    pub fn size(&self) -> u64 {
        match &self.inner {
            CacheInner::Lru(lru) => lru.size(),
            CacheInner::LruK(lruk) => lruk.size(),
            CacheInner::Sampled(sampled) => sampled.size(),
        }
    }

    /// Configured byte ceiling.
    pub fn max_bytes(&self) -> u64 {
        match &self.inner {
            CacheInner::Lru(lru) => lru.max_bytes(),
            CacheInner::LruK(lruk) => lruk.max_bytes(),
            CacheInner::Sampled(sampled) => sampled.max_bytes(),
        }
    }

    /// Discards every entry without firing the eviction callback.
    pub fn clear(&self) {
        match &self.inner {
            CacheInner::Lru(lru) => lru.clear(),
            CacheInner::LruK(lruk) => lruk.clear(),
            CacheInner::Sampled(sampled) => sampled.clear(),
        }
    }
}

/// Builder for cache instances.
pub struct CacheBuilder<K, V>
where
    K: Eq + Hash + Clone + ByteWeighted,
    V: ByteWeighted,
{
    max_bytes: u64,
    on_evicted: Option<EvictionCallback<K, V>>,
}

impl<K, V> CacheBuilder<K, V>
where
    K: Eq + Hash + Clone + ByteWeighted + Send + Sync,
    V: ByteWeighted + Send + Sync,
{
    /// Creates a builder for a cache bounded by `max_bytes`.
    pub fn new(max_bytes: u64) -> Self {
        Self {
            max_bytes,
            on_evicted: None,
        }
    }

    /// Registers an eviction callback, invoked once per destroyed entry with
    /// the engine lock held. See the policy modules for which removal paths
    /// fire it.
    ///
    /// ```
    /// use std::sync::{Arc, Mutex};
    /// use bytecache::builder::{CacheBuilder, CachePolicy};
    ///
    /// let evicted = Arc::new(Mutex::new(Vec::new()));
    /// let log = Arc::clone(&evicted);
    /// let cache = CacheBuilder::new(20)
    ///     .on_evicted(move |k: &String, _v| log.lock().unwrap().push(k.clone()))
    ///     .build(CachePolicy::Lru);
    ///
    /// cache.put("key1".into(), "value1".to_string());
    /// cache.put("key2".into(), "value2".to_string());
    /// cache.put("key3".into(), "value3".to_string());
    /// assert_eq!(*evicted.lock().unwrap(), vec!["key1".to_string()]);
    /// ```
    pub fn on_evicted<F>(mut self, callback: F) -> Self
    where
        F: Fn(&K, &Arc<V>) + Send + Sync + 'static,
    {
        self.on_evicted = Some(Box::new(callback));
        self
    }

    /// Builds a cache with the given policy.
    ///
    /// # Panics
    ///
    /// Panics on invalid policy parameters (`k < 2`, `max_samples == 0`);
    /// use [`try_build`](Self::try_build) to handle the error.
    pub fn build(self, policy: CachePolicy) -> Cache<K, V> {
        match self.try_build(policy) {
            Ok(cache) => cache,
            Err(err) => panic!("{err}"),
        }
    }

    /// Builds a cache with the given policy, surfacing configuration errors.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the policy parameters are invalid.
    pub fn try_build(self, policy: CachePolicy) -> Result<Cache<K, V>, ConfigError> {
        let inner = match policy {
            CachePolicy::Lru => {
                let mut core = LruCore::new(self.max_bytes);
                if let Some(cb) = self.on_evicted {
                    core.set_on_evicted(cb);
                }
                CacheInner::Lru(ConcurrentLruCache::from_core(core))
            }
            CachePolicy::LruK { k } => {
                let mut core = LrukCore::try_new(k, self.max_bytes)?;
                if let Some(cb) = self.on_evicted {
                    core.set_on_evicted(cb);
                }
                CacheInner::LruK(ConcurrentLrukCache::from_core(core))
            }
            CachePolicy::SampledLru { max_samples } => {
                let mut core = SampledLruCore::try_new(self.max_bytes, max_samples)?;
                if let Some(cb) = self.on_evicted {
                    core.set_on_evicted(cb);
                }
                CacheInner::Sampled(ConcurrentSampledLruCache::from_core(core))
            }
        };

        Ok(Cache { inner })
    }
}
