//! Read-through router.
//!
//! Routes a [`ReadQuery`] to the cache or the document store. On a miss the
//! store result is written back under the query's field key and the
//! namespace TTL is refreshed.
//!
//! # Failure handling
//!
//! - Store failures propagate and nothing is cached.
//! - Cache failures (lookup, write-back, expiry) are logged, counted and
//!   degrade the read to a plain store read.
//! - A cached payload that does not decode is a miss; the repopulation
//!   overwrites it.
//! - A filter or options value that cannot be encoded fails the read before
//!   any cache or store traffic.

use std::sync::Arc;

use doccache_core::{CacheConfig, CacheError, CollectionName, DocCacheResult};
use tracing::{debug, warn};

use super::key::FieldKey;
use super::namespace::Namespaces;
use super::policy::{CacheRead, ReadPolicy};
use super::query::{QueryResult, ReadMode, ReadQuery};
use super::traits::{CacheStats, CacheStore, StatsRecorder};
use crate::document_store::DocumentStore;

/// Read-through router over a document store and a cache store.
///
/// # Type Parameters
///
/// - `D`: the document store answering misses
/// - `C`: the cache store holding encoded results
pub struct ReadThroughRouter<D, C>
where
    D: DocumentStore,
    C: CacheStore,
{
    store: Arc<D>,
    cache: Arc<C>,
    config: Arc<CacheConfig>,
    stats: Arc<StatsRecorder>,
}

impl<D, C> ReadThroughRouter<D, C>
where
    D: DocumentStore,
    C: CacheStore,
{
    pub fn new(store: Arc<D>, cache: Arc<C>, config: CacheConfig) -> Self {
        Self::with_shared(
            store,
            cache,
            Arc::new(config),
            Arc::new(StatsRecorder::default()),
        )
    }

    pub(crate) fn with_shared(
        store: Arc<D>,
        cache: Arc<C>,
        config: Arc<CacheConfig>,
        stats: Arc<StatsRecorder>,
    ) -> Self {
        Self {
            store,
            cache,
            config,
            stats,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn store(&self) -> &D {
        &self.store
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// Answer `query`, from the cache when allowed and present.
    pub async fn read(
        &self,
        namespaces: &Namespaces,
        collection: &CollectionName,
        query: &ReadQuery,
        policy: ReadPolicy,
    ) -> DocCacheResult<CacheRead<QueryResult>> {
        if !self.config.enabled {
            let result = self.execute(collection, query).await?;
            return Ok(CacheRead::from_store(result));
        }

        let mode = query.mode();
        let namespace = namespaces.get(mode.namespace());
        let field = query.field_key(collection)?;

        match policy {
            ReadPolicy::UseCache => {
                if let Some(result) = self.lookup(namespace, &field, mode).await {
                    self.stats.record_hit();
                    debug!(namespace, mode = mode.as_str(), field = %field, "cache hit");
                    return Ok(CacheRead::from_cache(result));
                }
                self.stats.record_miss();
                debug!(namespace, mode = mode.as_str(), field = %field, "cache miss");
            }
            ReadPolicy::Bypass => {
                self.stats.record_bypass();
                debug!(namespace, mode = mode.as_str(), "cache bypassed");
            }
        }

        let result = self.execute(collection, query).await?;
        self.populate(namespace, &field, mode, &result).await;
        Ok(CacheRead::from_store(result))
    }

    /// Whether the cache currently holds a result for `query`.
    ///
    /// Diagnostic only: reads never consult this.
    pub async fn is_cached(
        &self,
        namespaces: &Namespaces,
        collection: &CollectionName,
        query: &ReadQuery,
    ) -> DocCacheResult<bool> {
        let namespace = namespaces.get(query.mode().namespace());
        let field = query.field_key(collection)?;
        Ok(self.cache.hash_field_exists(namespace, &field).await?)
    }

    /// Decoded cached payload, or `None` on absence, cache failure or a
    /// payload that does not decode.
    async fn lookup(&self, namespace: &str, field: &FieldKey, mode: ReadMode) -> Option<QueryResult> {
        let payload = match self.cache.hash_field_get(namespace, field).await {
            Ok(payload) => payload?,
            Err(e) => {
                self.stats.record_cache_error();
                warn!(namespace, mode = mode.as_str(), error = %e, "cache lookup failed, reading store");
                return None;
            }
        };

        match decode_cached(namespace, field, mode, &payload) {
            Ok(result) => Some(result),
            Err(e) => {
                self.stats.record_cache_error();
                warn!(namespace, mode = mode.as_str(), error = %e, "discarding undecodable cache payload");
                None
            }
        }
    }

    /// Run the store call matching the query variant.
    async fn execute(
        &self,
        collection: &CollectionName,
        query: &ReadQuery,
    ) -> DocCacheResult<QueryResult> {
        match query {
            ReadQuery::Row { filter, options } => {
                let options = options.clone().with_limit(1);
                let docs = self.store.fetch_all(collection, filter, &options).await?;
                Ok(QueryResult::Row(docs.into_iter().next()))
            }
            ReadQuery::Count { filter } => {
                let count = self.store.count(collection, filter).await?;
                Ok(QueryResult::Count(count))
            }
            ReadQuery::AllList { filter, options } => {
                let docs = self.store.fetch_all(collection, filter, options).await?;
                Ok(QueryResult::Documents(docs))
            }
            ReadQuery::PageList {
                filter,
                options,
                page,
            } => {
                let docs = self
                    .store
                    .fetch_pagination(collection, page.limit(), page.offset(), filter, options)
                    .await?;
                Ok(QueryResult::Documents(docs))
            }
            ReadQuery::Command { command } => {
                let docs = self.store.command(collection, command).await?;
                Ok(QueryResult::Documents(docs))
            }
        }
    }

    /// Write a fresh result back and refresh the namespace TTL.
    ///
    /// Best effort: the caller already has the result.
    async fn populate(&self, namespace: &str, field: &FieldKey, mode: ReadMode, result: &QueryResult) {
        let payload = match result.encode() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(namespace, mode = mode.as_str(), error = %e, "result not cacheable, skipping write-back");
                return;
            }
        };

        if let Err(e) = self.cache.hash_field_set(namespace, field, payload).await {
            self.stats.record_cache_error();
            warn!(namespace, mode = mode.as_str(), error = %e, "cache write-back failed");
            return;
        }

        if let Err(e) = self.cache.expire_namespace(namespace, self.config.ttl).await {
            self.stats.record_cache_error();
            warn!(namespace, error = %e, "failed to refresh namespace ttl");
        }
    }
}

/// Decode a cached payload; one that does not match `mode` is corrupted.
fn decode_cached(
    namespace: &str,
    field: &FieldKey,
    mode: ReadMode,
    payload: &str,
) -> Result<QueryResult, CacheError> {
    QueryResult::decode(mode, payload).map_err(|e| CacheError::Corrupted {
        namespace: namespace.to_string(),
        field: field.to_string(),
        reason: e.to_string(),
    })
}

impl<D, C> Clone for ReadThroughRouter<D, C>
where
    D: DocumentStore,
    C: CacheStore,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: Arc::clone(&self.cache),
            config: Arc::clone(&self.config),
            stats: Arc::clone(&self.stats),
        }
    }
}
