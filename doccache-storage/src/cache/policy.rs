//! Read policy and read provenance.
//!
//! Callers state per read whether the cache may answer it, and every read
//! reports back whether it did.

/// Whether a read may be answered from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadPolicy {
    /// Look up the cache first; populate it on a miss.
    #[default]
    UseCache,

    /// Skip the lookup and read the store.
    ///
    /// The fresh result still repopulates the cache, so the next
    /// `UseCache` read of the same query sees it.
    Bypass,
}

impl ReadPolicy {
    /// Map a legacy "skip cache" flag: `true` means bypass.
    pub fn from_flag(skip_cache: bool) -> Self {
        if skip_cache {
            Self::Bypass
        } else {
            Self::UseCache
        }
    }
}

/// Result of a read, tagged with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRead<T> {
    value: T,
    was_cache_hit: bool,
}

impl<T> CacheRead<T> {
    /// A result decoded from a cached payload.
    pub fn from_cache(value: T) -> Self {
        Self {
            value,
            was_cache_hit: true,
        }
    }

    /// A result read from the document store.
    pub fn from_store(value: T) -> Self {
        Self {
            value,
            was_cache_hit: false,
        }
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn was_cache_hit(&self) -> bool {
        self.was_cache_hit
    }

    pub fn was_cache_miss(&self) -> bool {
        !self.was_cache_hit
    }

    /// Map the inner value, keeping provenance.
    pub fn map<U, F>(self, f: F) -> CacheRead<U>
    where
        F: FnOnce(T) -> U,
    {
        CacheRead {
            value: f(self.value),
            was_cache_hit: self.was_cache_hit,
        }
    }
}

impl<T> AsRef<T> for CacheRead<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}
