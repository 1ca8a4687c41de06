//! Cache store trait and cache statistics.
//!
//! The cache store is an external collaborator: a hash-map-per-namespace
//! key-value store (Redis hashes in production). This module defines the
//! operations the cache layer needs from it and the counters the layer keeps.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use doccache_core::CacheError;

use super::key::FieldKey;

/// Cache store trait for pluggable cache implementations.
///
/// A namespace is a hash of field keys to string payloads. Expiry applies to
/// a whole namespace, never to a single field.
///
/// # Consistency
///
/// Implementations only need per-operation atomicity. The cache layer does
/// not rely on `hash_field_exists` agreeing with `hash_field_get`; a read
/// is a hit only when `hash_field_get` returns a payload.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Check whether a field is present in a namespace.
    async fn hash_field_exists(&self, namespace: &str, field: &FieldKey)
        -> Result<bool, CacheError>;

    /// Get the payload stored under a field, or None if absent or expired.
    async fn hash_field_get(
        &self,
        namespace: &str,
        field: &FieldKey,
    ) -> Result<Option<String>, CacheError>;

    /// Store a payload under a field, overwriting any previous value.
    async fn hash_field_set(
        &self,
        namespace: &str,
        field: &FieldKey,
        value: String,
    ) -> Result<(), CacheError>;

    /// (Re)set the expiry of a whole namespace.
    async fn expire_namespace(&self, namespace: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Delete a namespace and every field in it.
    async fn delete_namespace(&self, namespace: &str) -> Result<(), CacheError>;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads answered from the cache.
    pub hits: u64,
    /// Cache lookups that fell through to the store.
    pub misses: u64,
    /// Reads that skipped the lookup on request.
    pub bypasses: u64,
    /// Cache operations that failed and were degraded.
    pub cache_errors: u64,
    /// Namespaces deleted by invalidation.
    pub invalidations: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0) over looked-up reads.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Shared atomic counters behind [`CacheStats`].
#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    hits: AtomicU64,
    misses: AtomicU64,
    bypasses: AtomicU64,
    cache_errors: AtomicU64,
    invalidations: AtomicU64,
}

impl StatsRecorder {
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_bypass(&self) {
        self.bypasses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_error(&self) {
        self.cache_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_invalidation(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            bypasses: self.bypasses.load(Ordering::Relaxed),
            cache_errors: self.cache_errors.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stats_hit_rate() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.8).abs() < 0.001);

        let empty_stats = CacheStats::default();
        assert!((empty_stats.hit_rate() - 0.0).abs() < 0.001);
    }

    #[test]
    fn test_bypasses_do_not_affect_hit_rate() {
        let stats = CacheStats {
            hits: 1,
            misses: 1,
            bypasses: 50,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_recorder_snapshot() {
        let recorder = StatsRecorder::default();
        recorder.record_hit();
        recorder.record_hit();
        recorder.record_miss();
        recorder.record_bypass();
        recorder.record_cache_error();
        recorder.record_invalidation();
        recorder.record_invalidation();

        let stats = recorder.snapshot();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.bypasses, 1);
        assert_eq!(stats.cache_errors, 1);
        assert_eq!(stats.invalidations, 2);
    }
}
