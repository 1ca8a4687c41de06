//! Write-invalidate behaviour.
//!
//! Every successful write must make the next read of the same entity a miss,
//! for every read mode, and failed writes must leave the cache alone.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use doccache_storage::{InvalidationBatch, InvalidationListener, Mutation, ReadQuery};
use doccache_test_utils::assertions::{assert_hit, assert_miss, assert_mutation_error, assert_store_error};
use doccache_test_utils::fixtures::{doc, test_collection, user_document, Harness};
use doccache_test_utils::{
    CacheConfig, CacheMethod, CollectionName, DeleteLimit, DocumentStore, EntityName, Filter,
    Pagination, QueryOptions, ReadPolicy, StoreError, StoreMethod,
};
use serde_json::json;

fn all_queries() -> Vec<ReadQuery> {
    vec![
        ReadQuery::Row {
            filter: Filter::all(),
            options: QueryOptions::new(),
        },
        ReadQuery::Count {
            filter: Filter::all(),
        },
        ReadQuery::AllList {
            filter: Filter::all(),
            options: QueryOptions::new(),
        },
        ReadQuery::PageList {
            filter: Filter::all(),
            options: QueryOptions::new(),
            page: Pagination::default(),
        },
        ReadQuery::Command {
            command: doc(json!({"pipeline": [{"$match": {"status": "active"}}]})),
        },
    ]
}

fn mutations() -> Vec<Mutation> {
    vec![
        Mutation::InsertOne {
            document: user_document(100, "new"),
        },
        Mutation::InsertMany {
            documents: vec![user_document(101, "a"), user_document(102, "b")],
        },
        Mutation::Update {
            filter: Filter::all().eq("_id", 1),
            update: doc(json!({"$set": {"name": "renamed"}})),
        },
        Mutation::Delete {
            filter: Filter::all().eq("_id", 2),
            limit: DeleteLimit::One,
        },
    ]
}

#[derive(Default)]
struct RecordingListener {
    seen: Mutex<Vec<String>>,
}

impl RecordingListener {
    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl InvalidationListener for RecordingListener {
    async fn on_invalidated(&self, entity: &EntityName) {
        self.seen.lock().unwrap().push(entity.as_str().to_string());
    }
}

// ============================================================================
// READ-AFTER-WRITE
// ============================================================================

#[tokio::test]
async fn every_mutation_invalidates_every_read_mode() {
    for mutation in mutations() {
        let h = Harness::new();
        let model = h.model();
        let c = test_collection();
        for i in 1..=3 {
            h.store.inner().insert(&c, user_document(i, "u")).await.unwrap();
        }

        for query in &all_queries() {
            model.read(&c, query, ReadPolicy::UseCache).await.unwrap();
            assert_hit(&model.read(&c, query, ReadPolicy::UseCache).await.unwrap());
        }

        let name = mutation.name();
        model.mutate(&c, mutation).await.unwrap();

        for query in &all_queries() {
            let read = model.read(&c, query, ReadPolicy::UseCache).await.unwrap();
            assert!(read.was_cache_miss(), "{name} left {:?} cached", query.mode());
        }
    }
}

#[tokio::test]
async fn reads_after_a_write_see_the_write() {
    let h = Harness::new();
    let model = h.model();
    let c = test_collection();
    model.insert_one_get_id(&c, user_document(1, "ann")).await.unwrap();

    let before = model
        .get_row(&c, Filter::all().eq("_id", 1), QueryOptions::new(), ReadPolicy::UseCache)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(before["name"], json!("ann"));

    let updated = model
        .update_info(
            &c,
            Filter::all().eq("_id", 1),
            doc(json!({"$set": {"name": "anne"}})),
        )
        .await
        .unwrap();
    assert_eq!(updated, 1);

    let after = model
        .get_row(&c, Filter::all().eq("_id", 1), QueryOptions::new(), ReadPolicy::UseCache)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after["name"], json!("anne"));

    model
        .soft_delete(&c, Filter::all().eq("_id", 1), DeleteLimit::All)
        .await
        .unwrap();
    assert_eq!(
        model
            .get_row(&c, Filter::all().eq("_id", 1), QueryOptions::new(), ReadPolicy::UseCache)
            .await
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn write_deletes_both_namespaces() {
    let h = Harness::new();
    let model = h.model();
    let c = test_collection();

    model.insert_one_get_id(&c, user_document(1, "ann")).await.unwrap();
    assert_eq!(h.cache.calls(CacheMethod::DeleteNamespace), 2);

    model.insert_more(&c, vec![user_document(2, "bob")]).await.unwrap();
    assert_eq!(h.cache.calls(CacheMethod::DeleteNamespace), 4);
}

#[tokio::test]
async fn writes_only_invalidate_their_own_entity() {
    let h = Harness::new();
    let users = CollectionName::new("users").unwrap();
    let orders = CollectionName::new("orders").unwrap();
    let user_model = h.ctx.model_for(&users);
    let order_model = h.ctx.model_for(&orders);

    user_model.get_count(&users, Filter::all(), ReadPolicy::UseCache).await.unwrap();
    order_model.get_count(&orders, Filter::all(), ReadPolicy::UseCache).await.unwrap();

    user_model.insert_one_get_id(&users, user_document(1, "ann")).await.unwrap();

    let count = ReadQuery::Count {
        filter: Filter::all(),
    };
    assert_miss(&user_model.read(&users, &count, ReadPolicy::UseCache).await.unwrap());
    assert_hit(&order_model.read(&orders, &count, ReadPolicy::UseCache).await.unwrap());
}

// ============================================================================
// FAILED WRITES
// ============================================================================

#[tokio::test]
async fn failed_store_write_does_not_invalidate() {
    let h = Harness::new();
    let model = h.model();
    let c = test_collection();
    model.get_count(&c, Filter::all(), ReadPolicy::UseCache).await.unwrap();

    h.store.fail_with(StoreError::Unavailable {
        reason: "primary stepped down".to_string(),
    });
    let result = model.insert_one_get_id(&c, user_document(1, "ann")).await;
    assert_store_error(&result);
    h.store.recover();

    assert_eq!(h.cache.calls(CacheMethod::DeleteNamespace), 0);
    let read = model
        .read(&c, &ReadQuery::Count { filter: Filter::all() }, ReadPolicy::UseCache)
        .await
        .unwrap();
    assert_hit(&read);
}

#[tokio::test]
async fn rejected_write_does_not_invalidate_or_notify() {
    let h = Harness::new();
    let listener = Arc::new(RecordingListener::default());
    let model = h.model().with_listener(listener.clone());
    let c = test_collection();
    model.insert_one_get_id(&c, user_document(1, "ann")).await.unwrap();
    model.get_count(&c, Filter::all(), ReadPolicy::UseCache).await.unwrap();

    let duplicate = model.insert_one_get_id(&c, user_document(1, "again")).await;
    assert_mutation_error(&duplicate);

    assert_eq!(listener.seen(), vec!["test".to_string()]);
    assert_eq!(
        model.get_count(&c, Filter::all(), ReadPolicy::UseCache).await.unwrap(),
        1
    );
    assert_eq!(h.store.calls(StoreMethod::Count), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_invalidation_is_bounded_by_ttl() {
    let ttl = Duration::from_secs(20);
    let h = Harness::with_config(CacheConfig::default().with_ttl(ttl));
    let model = h.model();
    let c = test_collection();
    assert_eq!(
        model.get_count(&c, Filter::all(), ReadPolicy::UseCache).await.unwrap(),
        0
    );

    h.cache.set_available(false);
    model.insert_one_get_id(&c, user_document(1, "ann")).await.unwrap();
    h.cache.set_available(true);
    assert!(h.ctx.stats().cache_errors >= 1);

    // Stale until the namespace expires.
    assert_eq!(
        model.get_count(&c, Filter::all(), ReadPolicy::UseCache).await.unwrap(),
        0
    );
    tokio::time::advance(ttl).await;
    assert_eq!(
        model.get_count(&c, Filter::all(), ReadPolicy::UseCache).await.unwrap(),
        1
    );
}

// ============================================================================
// LISTENERS
// ============================================================================

#[tokio::test]
async fn listeners_hear_every_invalidation() {
    let h = Harness::new();
    let listener = Arc::new(RecordingListener::default());
    let model = h.model().with_listener(listener.clone());
    let c = test_collection();

    model.insert_one_get_id(&c, user_document(1, "ann")).await.unwrap();
    model
        .soft_delete(&c, Filter::all(), DeleteLimit::All)
        .await
        .unwrap();
    assert!(model.invalidate().await);

    assert_eq!(listener.seen(), vec!["test"; 3]);
}

// ============================================================================
// DEFERRED INVALIDATION
// ============================================================================

#[tokio::test]
async fn batch_invalidates_on_commit_only() {
    let h = Harness::new();
    let model = h.model();
    let c = test_collection();
    let count = ReadQuery::Count {
        filter: Filter::all(),
    };
    model.read(&c, &count, ReadPolicy::UseCache).await.unwrap();

    let mut batch = InvalidationBatch::new();
    model
        .mutate_deferred(&mut batch, &c, Mutation::InsertOne {
            document: user_document(1, "ann"),
        })
        .await
        .unwrap();
    model
        .mutate_deferred(&mut batch, &c, Mutation::InsertOne {
            document: user_document(2, "bob"),
        })
        .await
        .unwrap();
    assert_eq!(batch.len(), 1);

    // Not yet committed: the old count is still served.
    assert_hit(&model.read(&c, &count, ReadPolicy::UseCache).await.unwrap());

    assert_eq!(batch.commit().await, 1);
    assert_eq!(h.cache.calls(CacheMethod::DeleteNamespace), 2);
    assert_eq!(
        model.get_count(&c, Filter::all(), ReadPolicy::UseCache).await.unwrap(),
        2
    );
}

#[tokio::test]
async fn discarded_batch_leaves_the_cache_alone() {
    let h = Harness::new();
    let model = h.model();
    let c = test_collection();
    model.get_count(&c, Filter::all(), ReadPolicy::UseCache).await.unwrap();

    let mut batch = InvalidationBatch::new();
    model
        .mutate_deferred(&mut batch, &c, Mutation::InsertOne {
            document: user_document(1, "ann"),
        })
        .await
        .unwrap();
    batch.discard();

    assert_eq!(h.cache.calls(CacheMethod::DeleteNamespace), 0);
    assert_hit(
        &model
            .read(&c, &ReadQuery::Count { filter: Filter::all() }, ReadPolicy::UseCache)
            .await
            .unwrap(),
    );
}

#[tokio::test]
async fn invalidate_many_deletes_each_entity_once() {
    let h = Harness::new();
    let users = h.ctx.model(EntityName::new("users").unwrap());
    let orders = h.ctx.model(EntityName::new("orders").unwrap());
    let users_again = users.clone();

    let clean = h.ctx.invalidate_many([&users, &orders, &users_again]).await;
    assert_eq!(clean, 2);
    assert_eq!(h.cache.calls(CacheMethod::DeleteNamespace), 4);
}
