//! In-memory document store.
//!
//! Reference [`DocumentStore`] for tests and embedding. Collections are kept
//! in insertion order. Filters support top-level equality plus the `$eq`,
//! `$ne`, `$in`, `$gt`, `$gte`, `$lt` and `$lte` operators. Commands run an
//! aggregation `pipeline` of `$match`, `$sort`, `$skip`, `$limit` and
//! `$count` stages.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use doccache_core::{
    CollectionName, DeleteLimit, DocCacheResult, Document, DocumentId, Filter, MutationError,
    QueryOptions, SortDirection, StoreError,
};
use serde_json::{Map, Value};

use crate::document_store::DocumentStore;

const ID_FIELD: &str = "_id";

type Collections = HashMap<String, Vec<Document>>;

/// In-memory document store.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<Collections>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection, bypassing any cache.
    pub fn document_count(&self, collection: &CollectionName) -> DocCacheResult<usize> {
        Ok(self
            .read()?
            .get(collection.as_str())
            .map(Vec::len)
            .unwrap_or(0))
    }

    fn read(&self) -> DocCacheResult<RwLockReadGuard<'_, Collections>> {
        self.collections
            .read()
            .map_err(|_| lock_poisoned().into())
    }

    fn write(&self) -> DocCacheResult<RwLockWriteGuard<'_, Collections>> {
        self.collections
            .write()
            .map_err(|_| lock_poisoned().into())
    }

    fn matching(
        &self,
        collection: &CollectionName,
        filter: &Filter,
    ) -> DocCacheResult<Vec<Document>> {
        let collections = self.read()?;
        let docs = collections
            .get(collection.as_str())
            .map(|docs| {
                docs.iter()
                    .filter(|doc| matches_filter(doc, filter.as_document()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(docs)
    }
}

fn lock_poisoned() -> StoreError {
    StoreError::Unavailable {
        reason: "document store lock poisoned".to_string(),
    }
}

fn query_failed(collection: &CollectionName, reason: impl Into<String>) -> StoreError {
    StoreError::QueryFailed {
        collection: collection.to_string(),
        reason: reason.into(),
    }
}

fn rejected(collection: &CollectionName, operation: &str, reason: impl Into<String>) -> MutationError {
    MutationError::Rejected {
        collection: collection.to_string(),
        operation: operation.to_string(),
        reason: reason.into(),
    }
}

/// Ensure a document carries an `_id`, generating one if absent.
fn assign_id(collection: &CollectionName, document: &mut Document) -> DocCacheResult<DocumentId> {
    match document.get(ID_FIELD) {
        None | Some(Value::Null) => {
            let id = DocumentId::generate();
            document.insert(ID_FIELD.to_string(), Value::String(id.as_str().to_string()));
            Ok(id)
        }
        Some(Value::String(s)) => Ok(DocumentId::new(s.clone())),
        Some(Value::Number(n)) => Ok(DocumentId::new(n.to_string())),
        Some(other) => Err(rejected(
            collection,
            "insert",
            format!("unsupported _id value {other}"),
        )
        .into()),
    }
}

fn insert_into(
    docs: &mut Vec<Document>,
    collection: &CollectionName,
    mut document: Document,
) -> DocCacheResult<DocumentId> {
    let id = assign_id(collection, &mut document)?;
    let id_value = document.get(ID_FIELD).cloned();
    if docs.iter().any(|d| d.get(ID_FIELD) == id_value.as_ref()) {
        return Err(rejected(collection, "insert", format!("duplicate _id {id}")).into());
    }
    docs.push(document);
    Ok(id)
}

// ============================================================================
// FILTER EVALUATION
// ============================================================================

fn matches_filter(doc: &Document, filter: &Document) -> bool {
    filter
        .iter()
        .all(|(field, predicate)| matches_predicate(doc.get(field), predicate))
}

fn matches_predicate(actual: Option<&Value>, predicate: &Value) -> bool {
    match predicate {
        Value::Object(ops) if !ops.is_empty() && ops.keys().all(|k| k.starts_with('$')) => ops
            .iter()
            .all(|(op, operand)| matches_operator(actual, op, operand)),
        expected => actual.unwrap_or(&Value::Null) == expected,
    }
}

fn matches_operator(actual: Option<&Value>, op: &str, operand: &Value) -> bool {
    let value = actual.unwrap_or(&Value::Null);
    match op {
        "$eq" => value == operand,
        "$ne" => value != operand,
        "$in" => operand
            .as_array()
            .map(|candidates| candidates.contains(value))
            .unwrap_or(false),
        "$gt" => actual.is_some() && compare_values(value, operand) == Ordering::Greater,
        "$gte" => actual.is_some() && compare_values(value, operand) != Ordering::Less,
        "$lt" => actual.is_some() && compare_values(value, operand) == Ordering::Less,
        "$lte" => actual.is_some() && compare_values(value, operand) != Ordering::Greater,
        _ => false,
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values: null < bool < number < string < array < object.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn sort_documents(docs: &mut [Document], sort: &[(String, SortDirection)]) {
    if sort.is_empty() {
        return;
    }
    docs.sort_by(|a, b| {
        for (field, direction) in sort {
            let ord = compare_values(
                a.get(field).unwrap_or(&Value::Null),
                b.get(field).unwrap_or(&Value::Null),
            );
            let ord = match direction {
                SortDirection::Ascending => ord,
                SortDirection::Descending => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

fn window(docs: Vec<Document>, skip: u64, limit: Option<u64>) -> Vec<Document> {
    let skip = usize::try_from(skip).unwrap_or(usize::MAX);
    let limit = limit
        .map(|l| usize::try_from(l).unwrap_or(usize::MAX))
        .unwrap_or(usize::MAX);
    docs.into_iter().skip(skip).take(limit).collect()
}

/// `{"field": 1 | -1}` pairs; negative values sort descending.
fn parse_sort_spec(spec: &Map<String, Value>) -> Vec<(String, SortDirection)> {
    spec.iter()
        .map(|(field, dir)| (field.clone(), SortDirection::from_value(dir)))
        .collect()
}

// ============================================================================
// UPDATE APPLICATION
// ============================================================================

/// Fields an update sets: the `$set` object when present, otherwise the
/// update document itself.
fn update_fields<'a>(
    collection: &CollectionName,
    update: &'a Document,
) -> DocCacheResult<&'a Document> {
    match update.get("$set") {
        Some(Value::Object(fields)) => Ok(fields),
        Some(other) => Err(rejected(collection, "update", format!("$set must be an object, got {other}")).into()),
        None => {
            if let Some(op) = update.keys().find(|k| k.starts_with('$')) {
                return Err(rejected(collection, "update", format!("unsupported operator {op}")).into());
            }
            Ok(update)
        }
    }
}

// ============================================================================
// COMMANDS
// ============================================================================

fn run_pipeline(
    collection: &CollectionName,
    mut docs: Vec<Document>,
    pipeline: &[Value],
) -> DocCacheResult<Vec<Document>> {
    for stage in pipeline {
        let stage = stage
            .as_object()
            .filter(|s| s.len() == 1)
            .ok_or_else(|| query_failed(collection, "pipeline stage must be a single-key object"))?;
        let Some((name, arg)) = stage.iter().next() else {
            continue;
        };

        docs = match name.as_str() {
            "$match" => {
                let filter = arg
                    .as_object()
                    .ok_or_else(|| query_failed(collection, "$match expects an object"))?;
                docs.into_iter()
                    .filter(|d| matches_filter(d, filter))
                    .collect()
            }
            "$sort" => {
                let spec = arg
                    .as_object()
                    .ok_or_else(|| query_failed(collection, "$sort expects an object"))?;
                sort_documents(&mut docs, &parse_sort_spec(spec));
                docs
            }
            "$skip" => {
                let n = arg
                    .as_u64()
                    .ok_or_else(|| query_failed(collection, "$skip expects a non-negative integer"))?;
                window(docs, n, None)
            }
            "$limit" => {
                let n = arg
                    .as_u64()
                    .ok_or_else(|| query_failed(collection, "$limit expects a non-negative integer"))?;
                window(docs, 0, Some(n))
            }
            "$count" => {
                let field = arg
                    .as_str()
                    .filter(|f| !f.is_empty())
                    .ok_or_else(|| query_failed(collection, "$count expects a field name"))?;
                let mut out = Map::new();
                out.insert(field.to_string(), Value::from(docs.len() as u64));
                vec![out]
            }
            other => {
                return Err(query_failed(collection, format!("unsupported stage {other}")).into())
            }
        };
    }
    Ok(docs)
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn insert(
        &self,
        collection: &CollectionName,
        document: Document,
    ) -> DocCacheResult<DocumentId> {
        let mut collections = self.write()?;
        let docs = collections.entry(collection.to_string()).or_default();
        insert_into(docs, collection, document)
    }

    async fn insert_all(
        &self,
        collection: &CollectionName,
        documents: Vec<Document>,
    ) -> DocCacheResult<u64> {
        let mut collections = self.write()?;
        let docs = collections.entry(collection.to_string()).or_default();

        // All or nothing: stage into a copy so a rejected document leaves the
        // collection untouched.
        let mut staged = docs.clone();
        let mut inserted = 0u64;
        for document in documents {
            insert_into(&mut staged, collection, document)?;
            inserted += 1;
        }
        *docs = staged;
        Ok(inserted)
    }

    async fn update_row(
        &self,
        collection: &CollectionName,
        filter: &Filter,
        update: Document,
    ) -> DocCacheResult<u64> {
        let fields = update_fields(collection, &update)?;
        let mut collections = self.write()?;
        let Some(docs) = collections.get_mut(collection.as_str()) else {
            return Ok(0);
        };

        if let Some(new_id) = fields.get(ID_FIELD) {
            let changes_id = docs
                .iter()
                .filter(|d| matches_filter(d, filter.as_document()))
                .any(|d| d.get(ID_FIELD) != Some(new_id));
            if changes_id {
                return Err(rejected(collection, "update", "_id is immutable").into());
            }
        }

        let mut matched = 0u64;
        for doc in docs
            .iter_mut()
            .filter(|d| matches_filter(d, filter.as_document()))
        {
            for (field, value) in fields {
                doc.insert(field.clone(), value.clone());
            }
            matched += 1;
        }
        Ok(matched)
    }

    async fn delete(
        &self,
        collection: &CollectionName,
        filter: &Filter,
        limit: DeleteLimit,
    ) -> DocCacheResult<u64> {
        let mut collections = self.write()?;
        let Some(docs) = collections.get_mut(collection.as_str()) else {
            return Ok(0);
        };

        match limit {
            DeleteLimit::One => {
                match docs
                    .iter()
                    .position(|d| matches_filter(d, filter.as_document()))
                {
                    Some(index) => {
                        docs.remove(index);
                        Ok(1)
                    }
                    None => Ok(0),
                }
            }
            DeleteLimit::All => {
                let before = docs.len();
                docs.retain(|d| !matches_filter(d, filter.as_document()));
                Ok((before - docs.len()) as u64)
            }
        }
    }

    async fn fetch_all(
        &self,
        collection: &CollectionName,
        filter: &Filter,
        options: &QueryOptions,
    ) -> DocCacheResult<Vec<Document>> {
        let mut docs = self.matching(collection, filter)?;
        sort_documents(&mut docs, &options.sort());
        Ok(window(docs, options.skip().unwrap_or(0), options.limit()))
    }

    async fn fetch_pagination(
        &self,
        collection: &CollectionName,
        limit: u64,
        offset: u64,
        filter: &Filter,
        options: &QueryOptions,
    ) -> DocCacheResult<Vec<Document>> {
        let mut docs = self.matching(collection, filter)?;
        sort_documents(&mut docs, &options.sort());
        Ok(window(docs, offset, Some(limit)))
    }

    async fn count(&self, collection: &CollectionName, filter: &Filter) -> DocCacheResult<u64> {
        Ok(self.matching(collection, filter)?.len() as u64)
    }

    async fn command(
        &self,
        collection: &CollectionName,
        command: &Document,
    ) -> DocCacheResult<Vec<Document>> {
        let pipeline = command
            .get("pipeline")
            .and_then(Value::as_array)
            .ok_or_else(|| query_failed(collection, "command requires a pipeline array"))?;
        let docs = self.matching(collection, &Filter::all())?;
        run_pipeline(collection, docs, pipeline)
    }
}
