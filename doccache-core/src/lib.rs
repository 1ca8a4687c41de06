//! doccache Core - Data Types
//!
//! Pure data structures shared by the cache layer and its collaborators:
//! collection and entity identities, filters and options with their canonical
//! encoding, pagination, configuration and the error hierarchy.
//! No I/O lives here.

pub mod config;
pub mod error;
pub mod filter;
pub mod identity;

pub use config::CacheConfig;
pub use error::{
    CacheError, ConfigError, DocCacheError, DocCacheResult, MutationError, SerializationError,
    StoreError, ValidationError,
};
pub use filter::{
    canonical_document, canonical_json, to_document, DeleteLimit, Document, Filter, Pagination,
    QueryOptions, SortDirection,
};
pub use identity::{CollectionName, DocumentId, EntityName};
