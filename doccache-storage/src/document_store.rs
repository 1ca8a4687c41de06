//! Async document store trait.
//!
//! The document store is the system of record: a collection-oriented
//! database (MongoDB in production). The cache layer only ever talks to it
//! through this trait, and every error it returns reaches the caller.

use async_trait::async_trait;
use doccache_core::{
    CollectionName, DeleteLimit, DocCacheResult, Document, DocumentId, Filter, QueryOptions,
};

/// Async document store operations used by the cache layer.
///
/// Implementations own cancellation and timeouts; a cancelled call returns
/// `StoreError::Cancelled` like any other store failure.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    // ========================================================================
    // WRITES
    // ========================================================================

    /// Insert one document and return its id.
    async fn insert(&self, collection: &CollectionName, document: Document)
        -> DocCacheResult<DocumentId>;

    /// Insert many documents and return how many were inserted.
    async fn insert_all(
        &self,
        collection: &CollectionName,
        documents: Vec<Document>,
    ) -> DocCacheResult<u64>;

    /// Update every matching document and return how many matched.
    async fn update_row(
        &self,
        collection: &CollectionName,
        filter: &Filter,
        update: Document,
    ) -> DocCacheResult<u64>;

    /// Delete matching documents and return how many were removed.
    async fn delete(
        &self,
        collection: &CollectionName,
        filter: &Filter,
        limit: DeleteLimit,
    ) -> DocCacheResult<u64>;

    // ========================================================================
    // READS
    // ========================================================================

    /// Every matching document, honoring `sort`, `skip` and `limit` options.
    async fn fetch_all(
        &self,
        collection: &CollectionName,
        filter: &Filter,
        options: &QueryOptions,
    ) -> DocCacheResult<Vec<Document>>;

    /// At most `limit` matching documents after skipping `offset`.
    async fn fetch_pagination(
        &self,
        collection: &CollectionName,
        limit: u64,
        offset: u64,
        filter: &Filter,
        options: &QueryOptions,
    ) -> DocCacheResult<Vec<Document>>;

    /// Number of matching documents.
    async fn count(&self, collection: &CollectionName, filter: &Filter) -> DocCacheResult<u64>;

    /// Run a store-level command and return its result documents.
    async fn command(
        &self,
        collection: &CollectionName,
        command: &Document,
    ) -> DocCacheResult<Vec<Document>>;
}
