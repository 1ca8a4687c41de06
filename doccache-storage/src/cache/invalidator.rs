//! Write invalidator.
//!
//! Every successful mutation deletes both namespaces of the mutated entity.
//! Invalidation is coarse on purpose: nothing tracks which cached query a
//! write could affect.
//!
//! Deletion failures are logged and counted but never returned. A failed
//! invalidation leaves stale entries behind until the namespace TTL runs
//! out, which bounds the staleness.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use doccache_core::{
    CacheConfig, CollectionName, DeleteLimit, DocCacheResult, Document, DocumentId, EntityName,
    Filter,
};
use tracing::{debug, warn};

use super::namespace::Namespaces;
use super::traits::{CacheStore, StatsRecorder};
use crate::document_store::DocumentStore;

/// A write against the document store.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    InsertOne { document: Document },
    InsertMany { documents: Vec<Document> },
    Update { filter: Filter, update: Document },
    Delete { filter: Filter, limit: DeleteLimit },
}

impl Mutation {
    pub fn name(&self) -> &'static str {
        match self {
            Mutation::InsertOne { .. } => "insert_one",
            Mutation::InsertMany { .. } => "insert_many",
            Mutation::Update { .. } => "update",
            Mutation::Delete { .. } => "delete",
        }
    }
}

/// Store outcome of a [`Mutation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    Inserted(DocumentId),
    InsertedMany(u64),
    Updated(u64),
    Deleted(u64),
}

impl MutationOutcome {
    /// Documents written, for logging.
    pub fn affected(&self) -> u64 {
        match self {
            MutationOutcome::Inserted(_) => 1,
            MutationOutcome::InsertedMany(n)
            | MutationOutcome::Updated(n)
            | MutationOutcome::Deleted(n) => *n,
        }
    }
}

/// Hook run after an entity's namespaces were invalidated.
///
/// Used to clear caches that derive from the entity's data.
#[async_trait]
pub trait InvalidationListener: Send + Sync {
    async fn on_invalidated(&self, entity: &EntityName);
}

/// Applies mutations and deletes the namespaces they make stale.
pub struct WriteInvalidator<D, C>
where
    D: DocumentStore,
    C: CacheStore,
{
    store: Arc<D>,
    cache: Arc<C>,
    config: Arc<CacheConfig>,
    stats: Arc<StatsRecorder>,
}

impl<D, C> WriteInvalidator<D, C>
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

    /// Run the store call for `mutation` without touching the cache.
    pub async fn apply(
        &self,
        collection: &CollectionName,
        mutation: Mutation,
    ) -> DocCacheResult<MutationOutcome> {
        match mutation {
            Mutation::InsertOne { document } => self
                .store
                .insert(collection, document)
                .await
                .map(MutationOutcome::Inserted),
            Mutation::InsertMany { documents } => self
                .store
                .insert_all(collection, documents)
                .await
                .map(MutationOutcome::InsertedMany),
            Mutation::Update { filter, update } => self
                .store
                .update_row(collection, &filter, update)
                .await
                .map(MutationOutcome::Updated),
            Mutation::Delete { filter, limit } => self
                .store
                .delete(collection, &filter, limit)
                .await
                .map(MutationOutcome::Deleted),
        }
    }

    /// Apply `mutation`, then invalidate on success.
    ///
    /// A failed mutation skips invalidation: the store is unchanged.
    pub async fn mutate(
        &self,
        namespaces: &Namespaces,
        collection: &CollectionName,
        mutation: Mutation,
    ) -> DocCacheResult<MutationOutcome> {
        let operation = mutation.name();
        let outcome = self.apply(collection, mutation).await?;
        debug!(
            collection = %collection,
            operation,
            affected = outcome.affected(),
            "mutation applied"
        );
        self.invalidate(namespaces).await;
        Ok(outcome)
    }

    /// Delete both namespaces. Returns false if any deletion failed.
    ///
    /// Runs even when caching is disabled, so entries written before the
    /// switch cannot outlive a write.
    pub async fn invalidate(&self, namespaces: &Namespaces) -> bool {
        let mut clean = true;
        for namespace in namespaces.both() {
            match self.cache.delete_namespace(namespace).await {
                Ok(()) => {
                    self.stats.record_invalidation();
                    debug!(namespace, "namespace invalidated");
                }
                Err(e) => {
                    clean = false;
                    self.stats.record_cache_error();
                    warn!(
                        namespace,
                        error = %e,
                        ttl_secs = self.config.ttl.as_secs(),
                        "invalidation failed, entries stay stale until ttl"
                    );
                }
            }
        }
        clean
    }

    /// Invalidate each distinct namespace pair once.
    ///
    /// Returns how many pairs were invalidated cleanly.
    pub async fn invalidate_many<'a, I>(&self, namespaces: I) -> usize
    where
        I: IntoIterator<Item = &'a Namespaces>,
    {
        let mut seen = HashSet::new();
        let mut clean = 0;
        for pair in namespaces {
            if seen.insert(pair) && self.invalidate(pair).await {
                clean += 1;
            }
        }
        clean
    }
}

impl<D, C> Clone for WriteInvalidator<D, C>
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
