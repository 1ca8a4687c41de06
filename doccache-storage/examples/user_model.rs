//! User Model Example
//!
//! Demonstrates the read-through, write-invalidate workflow:
//! 1. Wire a cache context over a document store and a cache store
//! 2. Read through the cache (miss, then hit)
//! 3. Write, which invalidates the entity's namespaces
//! 4. Read again and see the write
//!
//! This example uses the in-memory stores for simplicity.

use std::sync::Arc;
use std::time::Duration;

use doccache_core::{
    to_document, CacheConfig, CollectionName, DocCacheResult, Filter, Pagination, QueryOptions,
    SortDirection,
};
use doccache_storage::{CacheContext, InMemoryCacheStore, InMemoryDocumentStore, ReadPolicy, ReadQuery};
use serde_json::json;

#[tokio::main(flavor = "current_thread")]
async fn main() -> DocCacheResult<()> {
    println!("=== doccache User Model Example ===\n");

    let config = CacheConfig::from_env().with_ttl(Duration::from_secs(300));
    let ctx = CacheContext::new(
        Arc::new(InMemoryDocumentStore::new()),
        Arc::new(InMemoryCacheStore::new()),
        config,
    )?;
    let users = CollectionName::new("users")?;
    let model = ctx.model_for(&users);
    println!("✓ Context created");
    println!("  List namespace: {}", model.namespaces().list());
    println!("  Info namespace: {}", model.namespaces().info());

    for (id, name) in [(1, "ann"), (2, "bob"), (3, "cy")] {
        let user = to_document("user", &json!({"_id": id, "name": name, "status": "active"}))?;
        model.insert_one_get_id(&users, user).await?;
    }
    println!("\n✓ Inserted 3 users");

    let query = ReadQuery::PageList {
        filter: Filter::all().eq("status", "active"),
        options: QueryOptions::new().with_sort("name", SortDirection::Ascending),
        page: Pagination::new(1, 2)?,
    };
    for attempt in 1..=2 {
        let read = model.read(&users, &query, ReadPolicy::UseCache).await?;
        let hit = if read.was_cache_hit() { "hit" } else { "miss" };
        let page = read.into_value().into_documents()?;
        println!("\n✓ Page read #{attempt} ({hit}): {} users", page.len());
    }

    model
        .update_info(
            &users,
            Filter::all().eq("_id", 1),
            to_document("update", &json!({"$set": {"status": "inactive"}}))?,
        )
        .await?;
    println!("\n✓ Deactivated user 1 (namespaces invalidated)");

    let read = model.read(&users, &query, ReadPolicy::UseCache).await?;
    println!("  Cache hit after write: {}", read.was_cache_hit());
    println!("  Active users on page: {}", read.into_value().into_documents()?.len());

    let count = model
        .get_count(&users, Filter::all(), ReadPolicy::Bypass)
        .await?;
    println!("\n✓ Total users (bypassing cache): {count}");

    let stats = ctx.stats();
    println!("\n=== Cache stats ===");
    println!("  Hits: {}", stats.hits);
    println!("  Misses: {}", stats.misses);
    println!("  Bypasses: {}", stats.bypasses);
    println!("  Invalidations: {}", stats.invalidations);
    println!("  Hit rate: {:.2}", stats.hit_rate());

    Ok(())
}
