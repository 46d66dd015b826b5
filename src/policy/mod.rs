//! Eviction policy engines.
//!
//! | Module    | Policy                         | Recency structure             |
//! |-----------|--------------------------------|-------------------------------|
//! | `lru`     | least recently used            | doubly-linked recency list    |
//! | `lru_k`   | LRU-K (probation + main cache) | two tier lists                |
//! | `sampled` | Redis-style approximated LRU   | idle timestamps + sample pool |

pub mod lru;
pub mod lru_k;
pub mod sampled;

pub use lru::LruCore;
pub use lru_k::LrukCore;
pub use sampled::{SampledLruCore, DEFAULT_MAX_SAMPLES, EVICTION_POOL_SIZE};

#[cfg(feature = "concurrency")]
pub use lru::ConcurrentLruCache;
#[cfg(feature = "concurrency")]
pub use lru_k::ConcurrentLrukCache;
#[cfg(feature = "concurrency")]
pub use sampled::ConcurrentSampledLruCache;
