//! Error types for the bytecache library.
//!
//! ## Key Components
//!
//! - [`ConfigError`]: Returned when cache configuration parameters are invalid
//!   (e.g. `k < 2` for LRU-K, zero sample count for sampled LRU).
//!
//! ## Example Usage
//!
//! ```
//! use bytecache::error::ConfigError;
//! use bytecache::policy::lru_k::LrukCore;
//!
//! // Fallible constructor for user-configurable parameters
//! let cache: Result<LrukCore<String, String>, ConfigError> = LrukCore::try_new(2, 1024);
//! assert!(cache.is_ok());
//!
//! // Invalid K is caught without panicking
//! let bad = LrukCore::<String, String>::try_new(1, 1024);
//! assert!(bad.is_err());
//! ```

use std::fmt;

/// Error returned when cache configuration parameters are invalid.
///
/// Produced by fallible constructors such as
/// [`LrukCore::try_new`](crate::policy::lru_k::LrukCore::try_new),
/// [`SampledLruCore::try_new`](crate::policy::sampled::SampledLruCore::try_new)
/// and [`CacheBuilder::try_build`](crate::builder::CacheBuilder::try_build).
/// Carries a human-readable description of which parameter failed validation.
///
/// # Example
///
/// ```
/// use bytecache::policy::sampled::SampledLruCore;
///
/// let err = SampledLruCore::<String, String>::try_new(1024, 0).unwrap_err();
/// assert!(err.to_string().contains("max_samples"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(String);

impl ConfigError {
    /// Creates a new `ConfigError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ConfigError {}
