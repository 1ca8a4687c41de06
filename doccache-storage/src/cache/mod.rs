//! Read-through, write-invalidate cache layer.
//!
//! Reads are answered from a key-value cache when possible and from the
//! document store otherwise, with the store result written back. Writes go
//! to the store and then delete every cached result of the written entity.
//!
//! # Namespaces
//!
//! Each entity owns two namespaces: `list` for multi-document results and
//! `info` for single rows and counts. A namespace expires as a whole; its
//! TTL is refreshed by every write-back, so a namespace under steady read
//! traffic can outlive the TTL until a mutation deletes it.
//!
//! # Staleness
//!
//! A read that misses can race a concurrent write: it may fetch the old
//! data, the write invalidates, and the read then writes the old data back.
//! That entry stays stale until the next mutation of the entity or until
//! the namespace expires. Callers needing the latest data use
//! [`ReadPolicy::Bypass`].
//!
//! # Example
//!
//! ```ignore
//! let ctx = CacheContext::new(store, cache, CacheConfig::default())?;
//! let coll = CollectionName::new("user")?;
//! let users = ctx.model_for(&coll);
//!
//! let read = users
//!     .read(&coll, &ReadQuery::Count { filter: Filter::all() }, ReadPolicy::UseCache)
//!     .await?;
//! if read.was_cache_hit() {
//!     tracing::debug!("served from cache");
//! }
//! ```

pub mod invalidator;
pub mod key;
pub mod memory;
pub mod model;
pub mod namespace;
pub mod policy;
pub mod query;
pub mod read_through;
pub mod traits;

pub use invalidator::{
    InvalidationListener, Mutation, MutationOutcome, WriteInvalidator,
};
pub use key::{derive_field_key, FieldKey, FIELD_KEY_LEN};
pub use memory::InMemoryCacheStore;
pub use model::{CacheContext, InvalidationBatch, ModelCache};
pub use namespace::{NamespaceKind, Namespaces};
pub use policy::{CacheRead, ReadPolicy};
pub use query::{QueryResult, ReadMode, ReadQuery};
pub use read_through::ReadThroughRouter;
pub use traits::{CacheStats, CacheStore};
