//! Cache read results.

/// Result of a cache read, carrying where the value came from.
///
/// Orders never change once created, so there is no staleness contract here;
/// the wrapper exists so callers can tell a cache hit from a backfill.
#[derive(Debug, Clone)]
pub struct CacheRead<T> {
    value: T,
    was_cache_hit: bool,
}

impl<T> CacheRead<T> {
    /// Create a new cache read from a cache hit.
    pub fn from_cache(value: T) -> Self {
        Self {
            value,
            was_cache_hit: true,
        }
    }

    /// Create a new cache read from a storage fetch (cache miss).
    pub fn from_storage(value: T) -> Self {
        Self {
            value,
            was_cache_hit: false,
        }
    }

    /// Consume the wrapper and return the underlying value.
    pub fn into_value(self) -> T {
        self.value
    }

    /// Get a reference to the underlying value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Returns true if the value was served from the cache.
    pub fn was_cache_hit(&self) -> bool {
        self.was_cache_hit
    }

    /// Returns true if the value had to be fetched from storage.
    pub fn was_cache_miss(&self) -> bool {
        !self.was_cache_hit
    }
}
