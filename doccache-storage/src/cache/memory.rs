//! In-memory cache store.
//!
//! Hash-map-per-namespace implementation of [`CacheStore`] with
//! namespace-wide expiry. Time comes from `tokio::time::Instant`, so tests
//! running with paused time control expiry through `tokio::time::advance`.
//! Expired namespaces behave as absent and are dropped on the next access.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use doccache_core::CacheError;
use tokio::time::Instant;

use super::key::FieldKey;
use super::traits::CacheStore;

#[derive(Debug, Default)]
struct NamespaceEntry {
    fields: HashMap<FieldKey, String>,
    expires_at: Option<Instant>,
}

impl NamespaceEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

type Namespaces = HashMap<String, NamespaceEntry>;

/// In-memory cache store.
#[derive(Debug, Default)]
pub struct InMemoryCacheStore {
    namespaces: RwLock<Namespaces>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live fields in a namespace.
    pub fn namespace_len(&self, namespace: &str) -> Result<usize, CacheError> {
        let mut namespaces = self.write()?;
        Ok(live_entry(&mut namespaces, namespace)
            .map(|entry| entry.fields.len())
            .unwrap_or(0))
    }

    /// Time left before a namespace expires; `None` if absent or without expiry.
    pub fn ttl_remaining(&self, namespace: &str) -> Result<Option<Duration>, CacheError> {
        let now = Instant::now();
        let mut namespaces = self.write()?;
        Ok(live_entry(&mut namespaces, namespace)
            .and_then(|entry| entry.expires_at)
            .map(|at| at.saturating_duration_since(now)))
    }

    // Lookups take the write lock as well, since they may evict.
    fn write(&self) -> Result<RwLockWriteGuard<'_, Namespaces>, CacheError> {
        self.namespaces.write().map_err(|_| CacheError::Unavailable {
            reason: "cache store lock poisoned".to_string(),
        })
    }
}

/// The namespace if present and not expired; expired ones are removed.
fn live_entry<'a>(namespaces: &'a mut Namespaces, namespace: &str) -> Option<&'a mut NamespaceEntry> {
    let now = Instant::now();
    if namespaces
        .get(namespace)
        .is_some_and(|entry| entry.is_expired(now))
    {
        namespaces.remove(namespace);
    }
    namespaces.get_mut(namespace)
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn hash_field_exists(
        &self,
        namespace: &str,
        field: &FieldKey,
    ) -> Result<bool, CacheError> {
        let mut namespaces = self.write()?;
        Ok(live_entry(&mut namespaces, namespace)
            .is_some_and(|entry| entry.fields.contains_key(field)))
    }

    async fn hash_field_get(
        &self,
        namespace: &str,
        field: &FieldKey,
    ) -> Result<Option<String>, CacheError> {
        let mut namespaces = self.write()?;
        Ok(live_entry(&mut namespaces, namespace)
            .and_then(|entry| entry.fields.get(field).cloned()))
    }

    async fn hash_field_set(
        &self,
        namespace: &str,
        field: &FieldKey,
        value: String,
    ) -> Result<(), CacheError> {
        let mut namespaces = self.write()?;
        if live_entry(&mut namespaces, namespace).is_none() {
            namespaces.insert(namespace.to_string(), NamespaceEntry::default());
        }
        if let Some(entry) = namespaces.get_mut(namespace) {
            entry.fields.insert(field.clone(), value);
        }
        Ok(())
    }

    async fn expire_namespace(&self, namespace: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut namespaces = self.write()?;
        if let Some(entry) = live_entry(&mut namespaces, namespace) {
            entry.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<(), CacheError> {
        self.write()?.remove(namespace);
        Ok(())
    }
}
