//! doccache Storage - Collaborator Traits and Cache Layer
//!
//! Defines the document store and cache store abstractions, in-memory
//! implementations of both, and the read-through / write-invalidate cache
//! that sits between them.

pub mod cache;
pub mod document_store;
pub mod memory_store;

pub use document_store::DocumentStore;
pub use memory_store::InMemoryDocumentStore;

// Re-export cache types for model integration
pub use cache::{
    derive_field_key, CacheContext, CacheRead, CacheStats, CacheStore, FieldKey,
    InMemoryCacheStore, InvalidationBatch, InvalidationListener, ModelCache, Mutation,
    MutationOutcome, NamespaceKind, Namespaces, QueryResult, ReadMode, ReadPolicy, ReadQuery,
    ReadThroughRouter, WriteInvalidator, FIELD_KEY_LEN,
};
