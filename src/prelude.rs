pub use crate::error::ConfigError;
pub use crate::policy::{LruCore, LrukCore, SampledLruCore, DEFAULT_MAX_SAMPLES, EVICTION_POOL_SIZE};
pub use crate::traits::{ByteCache, ByteWeighted, EvictionCallback};

#[cfg(feature = "concurrency")]
pub use crate::builder::{Cache, CacheBuilder, CachePolicy};
#[cfg(feature = "concurrency")]
pub use crate::policy::{ConcurrentLruCache, ConcurrentLrukCache, ConcurrentSampledLruCache};
