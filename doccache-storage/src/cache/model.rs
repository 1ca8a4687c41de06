//! Entity-level cache facade.
//!
//! [`CacheContext`] is the process-wide handle: one document store, one
//! cache store, one config, shared statistics. It is created once at startup
//! and cloned freely. [`ModelCache`] binds the context to one entity and
//! exposes the read and write operations of a cached model.
//!
//! ```ignore
//! let ctx = CacheContext::new(store, cache, CacheConfig::from_env())?;
//! let users = ctx.model(EntityName::new("user")?);
//! let coll = CollectionName::new("user")?;
//!
//! let n = users.get_count(&coll, Filter::all(), ReadPolicy::UseCache).await?;
//! users.insert_one_get_id(&coll, doc).await?; // invalidates `user`
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use doccache_core::{
    CacheConfig, CollectionName, DeleteLimit, DocCacheError, DocCacheResult, Document, DocumentId,
    EntityName, Filter, MutationError, Pagination, QueryOptions,
};
use tracing::debug;

use super::invalidator::{InvalidationListener, Mutation, MutationOutcome, WriteInvalidator};
use super::namespace::Namespaces;
use super::policy::{CacheRead, ReadPolicy};
use super::query::{QueryResult, ReadQuery};
use super::read_through::ReadThroughRouter;
use super::traits::{CacheStats, CacheStore, StatsRecorder};
use crate::document_store::DocumentStore;

/// Shared handle to the store, the cache and the cache policy.
pub struct CacheContext<D, C>
where
    D: DocumentStore,
    C: CacheStore,
{
    store: Arc<D>,
    cache: Arc<C>,
    config: Arc<CacheConfig>,
    stats: Arc<StatsRecorder>,
}

impl<D, C> CacheContext<D, C>
where
    D: DocumentStore,
    C: CacheStore,
{
    /// Create a context. Fails if `config` does not validate.
    pub fn new(store: Arc<D>, cache: Arc<C>, config: CacheConfig) -> DocCacheResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            cache,
            config: Arc::new(config),
            stats: Arc::new(StatsRecorder::default()),
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<D> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<C> {
        &self.cache
    }

    /// Counters accumulated by every model of this context.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// Cache facade for one entity.
    pub fn model(&self, entity: EntityName) -> ModelCache<D, C> {
        let namespaces = Namespaces::for_entity(&self.config, &entity);
        ModelCache {
            entity,
            namespaces,
            router: ReadThroughRouter::with_shared(
                Arc::clone(&self.store),
                Arc::clone(&self.cache),
                Arc::clone(&self.config),
                Arc::clone(&self.stats),
            ),
            invalidator: self.invalidator(),
            listeners: Vec::new(),
        }
    }

    /// Cache facade for the entity named after `collection`.
    pub fn model_for(&self, collection: &CollectionName) -> ModelCache<D, C> {
        self.model(EntityName::from(collection))
    }

    /// Invalidate several models, each distinct entity once.
    ///
    /// Returns how many entities were invalidated cleanly.
    pub async fn invalidate_many<'a, I>(&self, models: I) -> usize
    where
        I: IntoIterator<Item = &'a ModelCache<D, C>>,
        D: 'a,
        C: 'a,
    {
        let mut distinct: BTreeMap<&EntityName, &ModelCache<D, C>> = BTreeMap::new();
        for model in models {
            distinct.entry(&model.entity).or_insert(model);
        }

        let mut clean = 0;
        for model in distinct.into_values() {
            if model.invalidate().await {
                clean += 1;
            }
        }
        clean
    }

    fn invalidator(&self) -> WriteInvalidator<D, C> {
        WriteInvalidator::with_shared(
            Arc::clone(&self.store),
            Arc::clone(&self.cache),
            Arc::clone(&self.config),
            Arc::clone(&self.stats),
        )
    }
}

impl<D, C> Clone for CacheContext<D, C>
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

impl<D, C> fmt::Debug for CacheContext<D, C>
where
    D: DocumentStore,
    C: CacheStore,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheContext")
            .field("config", &self.config)
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}

/// Read-through, write-invalidate operations for one entity.
pub struct ModelCache<D, C>
where
    D: DocumentStore,
    C: CacheStore,
{
    entity: EntityName,
    namespaces: Namespaces,
    router: ReadThroughRouter<D, C>,
    invalidator: WriteInvalidator<D, C>,
    listeners: Vec<Arc<dyn InvalidationListener>>,
}

impl<D, C> ModelCache<D, C>
where
    D: DocumentStore,
    C: CacheStore,
{
    pub fn entity(&self) -> &EntityName {
        &self.entity
    }

    pub fn namespaces(&self) -> &Namespaces {
        &self.namespaces
    }

    /// Register a hook run after every invalidation of this entity.
    pub fn with_listener(mut self, listener: Arc<dyn InvalidationListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Insert one document and return its id.
    pub async fn insert_one_get_id(
        &self,
        collection: &CollectionName,
        document: Document,
    ) -> DocCacheResult<DocumentId> {
        match self
            .mutate(collection, Mutation::InsertOne { document })
            .await?
        {
            MutationOutcome::Inserted(id) => Ok(id),
            other => Err(unexpected_outcome(collection, "insert_one", &other)),
        }
    }

    /// Insert many documents and return how many were inserted.
    pub async fn insert_more(
        &self,
        collection: &CollectionName,
        documents: Vec<Document>,
    ) -> DocCacheResult<u64> {
        match self
            .mutate(collection, Mutation::InsertMany { documents })
            .await?
        {
            MutationOutcome::InsertedMany(n) => Ok(n),
            other => Err(unexpected_outcome(collection, "insert_many", &other)),
        }
    }

    /// Update matching documents and return how many matched.
    pub async fn update_info(
        &self,
        collection: &CollectionName,
        filter: Filter,
        update: Document,
    ) -> DocCacheResult<u64> {
        match self
            .mutate(collection, Mutation::Update { filter, update })
            .await?
        {
            MutationOutcome::Updated(n) => Ok(n),
            other => Err(unexpected_outcome(collection, "update", &other)),
        }
    }

    /// Delete matching documents and return how many were removed.
    pub async fn soft_delete(
        &self,
        collection: &CollectionName,
        filter: Filter,
        limit: DeleteLimit,
    ) -> DocCacheResult<u64> {
        match self
            .mutate(collection, Mutation::Delete { filter, limit })
            .await?
        {
            MutationOutcome::Deleted(n) => Ok(n),
            other => Err(unexpected_outcome(collection, "delete", &other)),
        }
    }

    /// Apply a mutation, then invalidate this entity and run its listeners.
    pub async fn mutate(
        &self,
        collection: &CollectionName,
        mutation: Mutation,
    ) -> DocCacheResult<MutationOutcome> {
        let outcome = self
            .invalidator
            .mutate(&self.namespaces, collection, mutation)
            .await?;
        self.notify().await;
        Ok(outcome)
    }

    /// Apply a mutation inside a logical transaction.
    ///
    /// Invalidation waits for [`InvalidationBatch::commit`].
    pub async fn mutate_deferred(
        &self,
        batch: &mut InvalidationBatch<D, C>,
        collection: &CollectionName,
        mutation: Mutation,
    ) -> DocCacheResult<MutationOutcome> {
        let outcome = self.invalidator.apply(collection, mutation).await?;
        batch.record(self);
        Ok(outcome)
    }

    /// Delete both namespaces of this entity and run its listeners.
    ///
    /// Returns false if a deletion failed; the failure is logged.
    pub async fn invalidate(&self) -> bool {
        let clean = self.invalidator.invalidate(&self.namespaces).await;
        self.notify().await;
        clean
    }

    async fn notify(&self) {
        for listener in &self.listeners {
            listener.on_invalidated(&self.entity).await;
        }
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// Answer any read query, reporting whether the cache served it.
    pub async fn read(
        &self,
        collection: &CollectionName,
        query: &ReadQuery,
        policy: ReadPolicy,
    ) -> DocCacheResult<CacheRead<QueryResult>> {
        self.router
            .read(&self.namespaces, collection, query, policy)
            .await
    }

    /// Whether a result for `query` is currently cached.
    pub async fn is_cached(
        &self,
        collection: &CollectionName,
        query: &ReadQuery,
    ) -> DocCacheResult<bool> {
        self.router
            .is_cached(&self.namespaces, collection, query)
            .await
    }

    /// First matching document, if any.
    pub async fn get_row(
        &self,
        collection: &CollectionName,
        filter: Filter,
        options: QueryOptions,
        policy: ReadPolicy,
    ) -> DocCacheResult<Option<Document>> {
        let query = ReadQuery::Row { filter, options };
        self.read(collection, &query, policy)
            .await?
            .into_value()
            .into_row()
    }

    /// Number of matching documents.
    pub async fn get_count(
        &self,
        collection: &CollectionName,
        filter: Filter,
        policy: ReadPolicy,
    ) -> DocCacheResult<u64> {
        let query = ReadQuery::Count { filter };
        self.read(collection, &query, policy)
            .await?
            .into_value()
            .into_count()
    }

    /// One page of matching documents.
    pub async fn get_page_list(
        &self,
        collection: &CollectionName,
        filter: Filter,
        options: QueryOptions,
        page: Pagination,
        policy: ReadPolicy,
    ) -> DocCacheResult<Vec<Document>> {
        let query = ReadQuery::PageList {
            filter,
            options,
            page,
        };
        self.read(collection, &query, policy)
            .await?
            .into_value()
            .into_documents()
    }

    /// Every matching document.
    pub async fn get_all_list(
        &self,
        collection: &CollectionName,
        filter: Filter,
        options: QueryOptions,
        policy: ReadPolicy,
    ) -> DocCacheResult<Vec<Document>> {
        let query = ReadQuery::AllList { filter, options };
        self.read(collection, &query, policy)
            .await?
            .into_value()
            .into_documents()
    }

    /// Result documents of a store command.
    pub async fn command(
        &self,
        collection: &CollectionName,
        command: Document,
        policy: ReadPolicy,
    ) -> DocCacheResult<Vec<Document>> {
        let query = ReadQuery::Command { command };
        self.read(collection, &query, policy)
            .await?
            .into_value()
            .into_documents()
    }
}

impl<D, C> Clone for ModelCache<D, C>
where
    D: DocumentStore,
    C: CacheStore,
{
    fn clone(&self) -> Self {
        Self {
            entity: self.entity.clone(),
            namespaces: self.namespaces.clone(),
            router: self.router.clone(),
            invalidator: self.invalidator.clone(),
            listeners: self.listeners.clone(),
        }
    }
}

impl<D, C> fmt::Debug for ModelCache<D, C>
where
    D: DocumentStore,
    C: CacheStore,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelCache")
            .field("entity", &self.entity)
            .field("namespaces", &self.namespaces)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

fn unexpected_outcome(
    collection: &CollectionName,
    operation: &str,
    outcome: &MutationOutcome,
) -> DocCacheError {
    MutationError::Rejected {
        collection: collection.to_string(),
        operation: operation.to_string(),
        reason: format!("store reported {outcome:?}"),
    }
    .into()
}

/// Entities touched inside a logical transaction.
///
/// Mutations run through [`ModelCache::mutate_deferred`] record their entity
/// here. [`commit`](Self::commit) invalidates each recorded entity once;
/// [`discard`](Self::discard) or dropping the batch invalidates nothing,
/// matching a rolled-back transaction.
pub struct InvalidationBatch<D, C>
where
    D: DocumentStore,
    C: CacheStore,
{
    pending: BTreeMap<EntityName, ModelCache<D, C>>,
}

impl<D, C> InvalidationBatch<D, C>
where
    D: DocumentStore,
    C: CacheStore,
{
    pub fn new() -> Self {
        Self {
            pending: BTreeMap::new(),
        }
    }

    /// Record an entity for invalidation at commit.
    pub fn record(&mut self, model: &ModelCache<D, C>) {
        self.pending
            .entry(model.entity.clone())
            .or_insert_with(|| model.clone());
    }

    /// Number of distinct entities awaiting invalidation.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Invalidate every recorded entity once. Returns how many were
    /// invalidated cleanly.
    pub async fn commit(self) -> usize {
        let mut clean = 0;
        for (entity, model) in self.pending {
            debug!(entity = %entity, "committing deferred invalidation");
            if model.invalidate().await {
                clean += 1;
            }
        }
        clean
    }

    /// Drop every recorded entity without invalidating.
    pub fn discard(self) {
        if !self.pending.is_empty() {
            debug!(entities = self.pending.len(), "discarding deferred invalidation");
        }
    }
}

impl<D, C> Default for InvalidationBatch<D, C>
where
    D: DocumentStore,
    C: CacheStore,
{
    fn default() -> Self {
        Self::new()
    }
}
