//! doccache Test Utilities
//!
//! Centralized test infrastructure for the doccache workspace:
//! - Spy and fault-injecting wrappers around the store traits
//! - Proptest generators for filters, options and read queries
//! - Test fixtures for common scenarios
//! - Custom assertions for doccache-specific validation
//! - Tracing initialisation for tests

// Re-export in-memory stores from their source crate
pub use doccache_storage::{InMemoryCacheStore, InMemoryDocumentStore};

// Re-export core and storage types for convenience
pub use doccache_core::{
    CacheConfig, CacheError, CollectionName, DeleteLimit, DocCacheError, DocCacheResult,
    Document, DocumentId, EntityName, Filter, MutationError, Pagination, QueryOptions,
    SerializationError, SortDirection, StoreError, ValidationError,
};
pub use doccache_storage::{
    CacheContext, CacheRead, CacheStats, CacheStore, DocumentStore, FieldKey, ModelCache,
    QueryResult, ReadMode, ReadPolicy, ReadQuery,
};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;

// ============================================================================
// SPY DOCUMENT STORE
// ============================================================================

/// Document store method, for call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreMethod {
    Insert,
    InsertAll,
    UpdateRow,
    Delete,
    FetchAll,
    FetchPagination,
    Count,
    Command,
}

impl StoreMethod {
    pub fn is_read(self) -> bool {
        matches!(
            self,
            StoreMethod::FetchAll
                | StoreMethod::FetchPagination
                | StoreMethod::Count
                | StoreMethod::Command
        )
    }
}

/// Document store wrapper that counts calls and can be told to fail.
///
/// A failing spy still counts the call, then returns the injected error
/// without reaching the inner store.
#[derive(Debug, Default)]
pub struct SpyStore<D> {
    inner: D,
    calls: Mutex<HashMap<StoreMethod, usize>>,
    pages: Mutex<Vec<(u64, u64)>>,
    failure: Mutex<Option<DocCacheError>>,
}

impl<D: DocumentStore> SpyStore<D> {
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            calls: Mutex::new(HashMap::new()),
            pages: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
        }
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    /// Calls made to one method.
    pub fn calls(&self, method: StoreMethod) -> usize {
        self.calls
            .lock()
            .expect("spy lock")
            .get(&method)
            .copied()
            .unwrap_or(0)
    }

    /// Calls made to every read method.
    pub fn read_calls(&self) -> usize {
        self.calls
            .lock()
            .expect("spy lock")
            .iter()
            .filter(|(method, _)| method.is_read())
            .map(|(_, n)| n)
            .sum()
    }

    /// `(limit, offset)` of every `fetch_pagination` call, in order.
    pub fn pagination_args(&self) -> Vec<(u64, u64)> {
        self.pages.lock().expect("spy lock").clone()
    }

    pub fn reset_counts(&self) {
        self.calls.lock().expect("spy lock").clear();
        self.pages.lock().expect("spy lock").clear();
    }

    /// Make every following call fail with `error`.
    pub fn fail_with(&self, error: impl Into<DocCacheError>) {
        *self.failure.lock().expect("spy lock") = Some(error.into());
    }

    /// Stop injecting failures.
    pub fn recover(&self) {
        *self.failure.lock().expect("spy lock") = None;
    }

    fn record(&self, method: StoreMethod) -> DocCacheResult<()> {
        *self
            .calls
            .lock()
            .expect("spy lock")
            .entry(method)
            .or_insert(0) += 1;
        match self.failure.lock().expect("spy lock").clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl<D: DocumentStore> DocumentStore for SpyStore<D> {
    async fn insert(&self, c: &CollectionName, d: Document) -> DocCacheResult<DocumentId> {
        self.record(StoreMethod::Insert)?;
        self.inner.insert(c, d).await
    }

    async fn insert_all(&self, c: &CollectionName, d: Vec<Document>) -> DocCacheResult<u64> {
        self.record(StoreMethod::InsertAll)?;
        self.inner.insert_all(c, d).await
    }

    async fn update_row(
        &self,
        c: &CollectionName,
        f: &Filter,
        u: Document,
    ) -> DocCacheResult<u64> {
        self.record(StoreMethod::UpdateRow)?;
        self.inner.update_row(c, f, u).await
    }

    async fn delete(&self, c: &CollectionName, f: &Filter, l: DeleteLimit) -> DocCacheResult<u64> {
        self.record(StoreMethod::Delete)?;
        self.inner.delete(c, f, l).await
    }

    async fn fetch_all(
        &self,
        c: &CollectionName,
        f: &Filter,
        o: &QueryOptions,
    ) -> DocCacheResult<Vec<Document>> {
        self.record(StoreMethod::FetchAll)?;
        self.inner.fetch_all(c, f, o).await
    }

    async fn fetch_pagination(
        &self,
        c: &CollectionName,
        limit: u64,
        offset: u64,
        f: &Filter,
        o: &QueryOptions,
    ) -> DocCacheResult<Vec<Document>> {
        self.pages.lock().expect("spy lock").push((limit, offset));
        self.record(StoreMethod::FetchPagination)?;
        self.inner.fetch_pagination(c, limit, offset, f, o).await
    }

    async fn count(&self, c: &CollectionName, f: &Filter) -> DocCacheResult<u64> {
        self.record(StoreMethod::Count)?;
        self.inner.count(c, f).await
    }

    async fn command(&self, c: &CollectionName, cmd: &Document) -> DocCacheResult<Vec<Document>> {
        self.record(StoreMethod::Command)?;
        self.inner.command(c, cmd).await
    }
}

// ============================================================================
// FLAKY CACHE STORE
// ============================================================================

/// Cache store method, for call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheMethod {
    Exists,
    Get,
    Set,
    Expire,
    DeleteNamespace,
}

/// Cache store wrapper simulating outages and inconsistent replies.
#[derive(Debug)]
pub struct FlakyCache<C> {
    inner: C,
    available: AtomicBool,
    stale_exists: AtomicBool,
    calls: Mutex<HashMap<CacheMethod, usize>>,
}

impl<C: CacheStore> FlakyCache<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            available: AtomicBool::new(true),
            stale_exists: AtomicBool::new(false),
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// When false, every operation fails with `CacheError::Unavailable`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// When true, `hash_field_exists` reports every field as present,
    /// like a store whose existence check lags behind expiry.
    pub fn report_stale_exists(&self, stale: bool) {
        self.stale_exists.store(stale, Ordering::SeqCst);
    }

    pub fn calls(&self, method: CacheMethod) -> usize {
        self.calls
            .lock()
            .expect("flaky lock")
            .get(&method)
            .copied()
            .unwrap_or(0)
    }

    pub fn reset_counts(&self) {
        self.calls.lock().expect("flaky lock").clear();
    }

    fn record(&self, method: CacheMethod) -> Result<(), CacheError> {
        *self
            .calls
            .lock()
            .expect("flaky lock")
            .entry(method)
            .or_insert(0) += 1;
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CacheError::Unavailable {
                reason: "simulated outage".to_string(),
            })
        }
    }
}

#[async_trait]
impl<C: CacheStore> CacheStore for FlakyCache<C> {
    async fn hash_field_exists(&self, ns: &str, f: &FieldKey) -> Result<bool, CacheError> {
        self.record(CacheMethod::Exists)?;
        if self.stale_exists.load(Ordering::SeqCst) {
            return Ok(true);
        }
        self.inner.hash_field_exists(ns, f).await
    }

    async fn hash_field_get(&self, ns: &str, f: &FieldKey) -> Result<Option<String>, CacheError> {
        self.record(CacheMethod::Get)?;
        self.inner.hash_field_get(ns, f).await
    }

    async fn hash_field_set(&self, ns: &str, f: &FieldKey, v: String) -> Result<(), CacheError> {
        self.record(CacheMethod::Set)?;
        self.inner.hash_field_set(ns, f, v).await
    }

    async fn expire_namespace(&self, ns: &str, ttl: Duration) -> Result<(), CacheError> {
        self.record(CacheMethod::Expire)?;
        self.inner.expire_namespace(ns, ttl).await
    }

    async fn delete_namespace(&self, ns: &str) -> Result<(), CacheError> {
        self.record(CacheMethod::DeleteNamespace)?;
        self.inner.delete_namespace(ns).await
    }
}

// ============================================================================
// TRACING
// ============================================================================

static TRACING: Once = Once::new();

/// Install a fmt subscriber once per test binary.
///
/// Honors `RUST_LOG`; defaults to debug output for the doccache crates.
pub fn init_test_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    TRACING.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("doccache_storage=debug,warn"));
        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .try_init();
    });
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for doccache types.

    use super::*;
    use proptest::prelude::*;
    use serde_json::{Map, Value};

    pub fn arb_collection_name() -> impl Strategy<Value = CollectionName> {
        "[a-z][a-z0-9_]{0,15}".prop_map(|s| CollectionName::new(s).expect("non-empty"))
    }

    pub fn arb_scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            "[a-zA-Z0-9 ]{0,12}".prop_map(Value::from),
        ]
    }

    /// Nested JSON values, up to three levels deep.
    pub fn arb_value() -> impl Strategy<Value = Value> {
        arb_scalar().prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    pub fn arb_document() -> impl Strategy<Value = Document> {
        prop::collection::btree_map("[a-z_]{1,8}", arb_value(), 0..6)
            .prop_map(|m| m.into_iter().collect::<Map<String, Value>>())
    }

    pub fn arb_filter() -> impl Strategy<Value = Filter> {
        arb_document().prop_map(Filter::from_document)
    }

    pub fn arb_options() -> impl Strategy<Value = QueryOptions> {
        (
            prop::option::of(0u64..100),
            prop::option::of(1u64..100),
            prop::option::of(("[a-z]{1,6}", any::<bool>())),
        )
            .prop_map(|(skip, limit, sort)| {
                let mut options = QueryOptions::new();
                if let Some(skip) = skip {
                    options = options.with_skip(skip);
                }
                if let Some(limit) = limit {
                    options = options.with_limit(limit);
                }
                if let Some((field, asc)) = sort {
                    let dir = if asc {
                        SortDirection::Ascending
                    } else {
                        SortDirection::Descending
                    };
                    options = options.with_sort(field, dir);
                }
                options
            })
    }

    pub fn arb_pagination() -> impl Strategy<Value = Pagination> {
        (1u64..1000, 1u64..200).prop_map(|(p, l)| Pagination::new(p, l).expect("valid page"))
    }

    pub fn arb_read_query() -> impl Strategy<Value = ReadQuery> {
        prop_oneof![
            (arb_filter(), arb_options())
                .prop_map(|(filter, options)| ReadQuery::Row { filter, options }),
            arb_filter().prop_map(|filter| ReadQuery::Count { filter }),
            (arb_filter(), arb_options())
                .prop_map(|(filter, options)| ReadQuery::AllList { filter, options }),
            (arb_filter(), arb_options(), arb_pagination()).prop_map(|(filter, options, page)| {
                ReadQuery::PageList {
                    filter,
                    options,
                    page,
                }
            }),
            arb_document().prop_map(|command| ReadQuery::Command { command }),
        ]
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test data and wiring.

    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    pub type SpiedStore = SpyStore<InMemoryDocumentStore>;
    pub type FlakyMemoryCache = FlakyCache<InMemoryCacheStore>;

    /// The collection used by most tests.
    pub fn test_collection() -> CollectionName {
        CollectionName::new("test").expect("non-empty")
    }

    /// A JSON object literal as a [`Document`].
    pub fn doc(value: serde_json::Value) -> Document {
        match value {
            serde_json::Value::Object(map) => map,
            other => panic!("fixture is not an object: {other}"),
        }
    }

    pub fn user_document(id: i64, name: &str) -> Document {
        doc(json!({"_id": id, "name": name, "status": "active"}))
    }

    /// Spied store, flaky cache and a context wired over both.
    pub struct Harness {
        pub store: Arc<SpiedStore>,
        pub cache: Arc<FlakyMemoryCache>,
        pub ctx: CacheContext<SpiedStore, FlakyMemoryCache>,
    }

    impl Harness {
        pub fn new() -> Self {
            Self::with_config(CacheConfig::default())
        }

        pub fn with_config(config: CacheConfig) -> Self {
            init_test_tracing();
            let store = Arc::new(SpyStore::new(InMemoryDocumentStore::new()));
            let cache = Arc::new(FlakyCache::new(InMemoryCacheStore::new()));
            let ctx = CacheContext::new(Arc::clone(&store), Arc::clone(&cache), config)
                .expect("valid test config");
            Self { store, cache, ctx }
        }

        /// Model for [`test_collection`].
        pub fn model(&self) -> ModelCache<SpiedStore, FlakyMemoryCache> {
            self.ctx.model_for(&test_collection())
        }
    }

    impl Default for Harness {
        fn default() -> Self {
            Self::new()
        }
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Custom assertion functions for doccache-specific validation.

    use super::*;

    /// Assert that a DocCacheResult is a Store error.
    #[track_caller]
    pub fn assert_store_error<T: std::fmt::Debug>(result: &DocCacheResult<T>) {
        match result {
            Err(DocCacheError::Store(_)) => {}
            other => panic!("Expected Store error, got: {:?}", other),
        }
    }

    /// Assert that a DocCacheResult is a Mutation error.
    #[track_caller]
    pub fn assert_mutation_error<T: std::fmt::Debug>(result: &DocCacheResult<T>) {
        match result {
            Err(DocCacheError::Mutation(_)) => {}
            other => panic!("Expected Mutation error, got: {:?}", other),
        }
    }

    /// Assert that a DocCacheResult is a Validation error.
    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &DocCacheResult<T>) {
        match result {
            Err(DocCacheError::Validation(_)) => {}
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }

    /// Assert that a DocCacheResult is a Config error.
    #[track_caller]
    pub fn assert_config_error<T: std::fmt::Debug>(result: &DocCacheResult<T>) {
        match result {
            Err(DocCacheError::Config(_)) => {}
            other => panic!("Expected Config error, got: {:?}", other),
        }
    }

    /// Assert that a read was served from the cache.
    #[track_caller]
    pub fn assert_hit<T: std::fmt::Debug>(read: &CacheRead<T>) {
        assert!(read.was_cache_hit(), "Expected cache hit, got miss: {:?}", read);
    }

    /// Assert that a read went to the store.
    #[track_caller]
    pub fn assert_miss<T: std::fmt::Debug>(read: &CacheRead<T>) {
        assert!(read.was_cache_miss(), "Expected cache miss, got hit: {:?}", read);
    }
}
