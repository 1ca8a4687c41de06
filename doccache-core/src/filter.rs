//! Filters, query options and their canonical encoding
//!
//! Filters and options are opaque to the cache beyond one requirement: equal
//! logical values must encode to identical bytes, because the encoding feeds
//! the cache key. [`canonical_json`] sorts object keys at every depth and
//! emits compact JSON, independent of how the underlying map orders keys.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{DocCacheResult, SerializationError, ValidationError};

/// A JSON object as stored in a collection.
pub type Document = Map<String, Value>;

/// Encode a JSON value canonically (sorted keys, no whitespace).
pub fn canonical_json(value: &Value) -> DocCacheResult<String> {
    let mut out = String::new();
    write_canonical(value, &mut out)?;
    Ok(out)
}

/// Canonical encoding of a document.
pub fn canonical_document(doc: &Document) -> DocCacheResult<String> {
    let mut out = String::new();
    write_object(doc, &mut out)?;
    Ok(out)
}

fn write_canonical(value: &Value, out: &mut String) -> DocCacheResult<()> {
    match value {
        Value::Object(map) => write_object(map, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out)?;
            }
            out.push(']');
            Ok(())
        }
        Value::String(s) => write_string(s, out),
        Value::Number(n) => write!(out, "{}", n).map_err(|e| encode_error("number", e)),
        Value::Bool(b) => {
            out.push_str(if *b { "true" } else { "false" });
            Ok(())
        }
        Value::Null => {
            out.push_str("null");
            Ok(())
        }
    }
}

fn write_object(map: &Document, out: &mut String) -> DocCacheResult<()> {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();

    out.push('{');
    for (i, key) in keys.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_string(key, out)?;
        out.push(':');
        if let Some(value) = map.get(key) {
            write_canonical(value, out)?;
        }
    }
    out.push('}');
    Ok(())
}

fn write_string(s: &str, out: &mut String) -> DocCacheResult<()> {
    let escaped = serde_json::to_string(s).map_err(|e| encode_error("string", e))?;
    out.push_str(&escaped);
    Ok(())
}

fn encode_error(what: &str, e: impl std::fmt::Display) -> crate::DocCacheError {
    SerializationError::Encode {
        what: what.to_string(),
        reason: e.to_string(),
    }
    .into()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Object(_) => "object",
        Value::Array(_) => "array",
        Value::String(_) => "string",
        Value::Number(_) => "number",
        Value::Bool(_) => "bool",
        Value::Null => "null",
    }
}

/// Convert any serializable value into a document.
///
/// Fails with [`SerializationError::NotAnObject`] if it does not serialize
/// to a JSON object.
pub fn to_document<T: Serialize + ?Sized>(what: &str, value: &T) -> DocCacheResult<Document> {
    let value = serde_json::to_value(value).map_err(|e| encode_error(what, e))?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(SerializationError::NotAnObject {
            what: what.to_string(),
            found: json_kind(&other).to_string(),
        }
        .into()),
    }
}

// ============================================================================
// FILTER
// ============================================================================

/// Field predicates selecting documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filter(Document);

impl Filter {
    /// Empty filter, matching every document.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn from_document(doc: Document) -> Self {
        Self(doc)
    }

    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> DocCacheResult<Self> {
        to_document("filter", value).map(Self)
    }

    /// Add an equality predicate.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn as_document(&self) -> &Document {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn canonical(&self) -> DocCacheResult<String> {
        canonical_document(&self.0)
    }
}

// ============================================================================
// QUERY OPTIONS
// ============================================================================

/// Sort direction of one sort field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    /// Read a sort spec value: negative numbers sort descending, anything
    /// else ascending.
    pub fn from_value(value: &Value) -> Self {
        if value.as_i64().unwrap_or(1) < 0 {
            Self::Descending
        } else {
            Self::Ascending
        }
    }

    fn as_value(self) -> Value {
        match self {
            Self::Ascending => Value::from(1),
            Self::Descending => Value::from(-1),
        }
    }
}

/// Query modifiers: `skip`, `limit`, `sort` and anything else the store
/// understands.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryOptions(Document);

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_document(doc: Document) -> Self {
        Self(doc)
    }

    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> DocCacheResult<Self> {
        to_document("options", value).map(Self)
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.0.insert("limit".to_string(), Value::from(limit));
        self
    }

    pub fn with_skip(mut self, skip: u64) -> Self {
        self.0.insert("skip".to_string(), Value::from(skip));
        self
    }

    /// Append a sort field.
    pub fn with_sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        let sort = self
            .0
            .entry("sort".to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !sort.is_object() {
            *sort = Value::Object(Map::new());
        }
        if let Value::Object(fields) = sort {
            fields.insert(field.into(), direction.as_value());
        }
        self
    }

    pub fn limit(&self) -> Option<u64> {
        self.0.get("limit").and_then(Value::as_u64)
    }

    pub fn skip(&self) -> Option<u64> {
        self.0.get("skip").and_then(Value::as_u64)
    }

    /// Sort fields in map order. Non-negative values sort ascending.
    pub fn sort(&self) -> Vec<(String, SortDirection)> {
        match self.0.get("sort") {
            Some(Value::Object(fields)) => fields
                .iter()
                .map(|(field, dir)| (field.clone(), SortDirection::from_value(dir)))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn as_document(&self) -> &Document {
        &self.0
    }

    pub fn canonical(&self) -> DocCacheResult<String> {
        canonical_document(&self.0)
    }
}

// ============================================================================
// PAGINATION / DELETE LIMIT
// ============================================================================

/// One-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pagination {
    page: u64,
    limit: u64,
}

impl Pagination {
    pub fn new(page: u64, limit: u64) -> DocCacheResult<Self> {
        if page == 0 {
            return Err(ValidationError::InvalidPagination {
                page,
                limit,
                reason: "page numbers start at 1".to_string(),
            }
            .into());
        }
        if limit == 0 {
            return Err(ValidationError::InvalidPagination {
                page,
                limit,
                reason: "limit must be greater than 0".to_string(),
            }
            .into());
        }
        Ok(Self { page, limit })
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Number of documents skipped before this page: `(page - 1) * limit`.
    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: 1, limit: 10 }
    }
}

/// How many matching documents a delete removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DeleteLimit {
    #[default]
    All,
    One,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DocCacheError;
    use serde_json::json;

    #[test]
    fn test_canonical_json_sorts_nested_keys() {
        let a = json!({"b": 1, "a": {"y": [1, {"k": 2, "j": 1}], "x": null}});
        let encoded = canonical_json(&a).unwrap();
        assert_eq!(encoded, r#"{"a":{"x":null,"y":[1,{"j":1,"k":2}]},"b":1}"#);
    }

    #[test]
    fn test_canonical_json_escapes_strings() {
        let encoded = canonical_json(&json!({"q\"uote": "line\nbreak"})).unwrap();
        assert_eq!(encoded, r#"{"q\"uote":"line\nbreak"}"#);
    }

    #[test]
    fn test_canonical_json_keeps_array_order() {
        let a = canonical_json(&json!([1, 2])).unwrap();
        let b = canonical_json(&json!([2, 1])).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_filter_insertion_order_is_irrelevant() {
        let a = Filter::all().eq("status", "active").eq("age", 30);
        let b = Filter::all().eq("age", 30).eq("status", "active");
        assert_eq!(a.canonical().unwrap(), b.canonical().unwrap());
    }

    #[test]
    fn test_filter_from_serialize_rejects_non_object() {
        let err = Filter::from_serialize(&vec![1, 2, 3]).unwrap_err();
        assert!(matches!(
            err,
            DocCacheError::Serialization(SerializationError::NotAnObject { .. })
        ));
    }

    #[test]
    fn test_options_accessors() {
        let options = QueryOptions::new()
            .with_skip(5)
            .with_limit(20)
            .with_sort("_id", SortDirection::Descending);
        assert_eq!(options.skip(), Some(5));
        assert_eq!(options.limit(), Some(20));
        assert_eq!(
            options.sort(),
            vec![("_id".to_string(), SortDirection::Descending)]
        );
    }

    #[test]
    fn test_options_sort_from_raw_document() {
        let options = QueryOptions::from_serialize(&json!({"sort": {"_id": 1}})).unwrap();
        assert_eq!(options.sort(), vec![("_id".to_string(), SortDirection::Ascending)]);
        assert_eq!(options.limit(), None);
    }

    #[test]
    fn test_sort_direction_from_value() {
        assert_eq!(SortDirection::from_value(&json!(-1)), SortDirection::Descending);
        assert_eq!(SortDirection::from_value(&json!(1)), SortDirection::Ascending);
        assert_eq!(SortDirection::from_value(&json!("desc")), SortDirection::Ascending);
        assert_eq!(
            SortDirection::from_value(&SortDirection::Descending.as_value()),
            SortDirection::Descending
        );
    }

    #[test]
    fn test_pagination_offset() {
        assert_eq!(Pagination::new(1, 10).unwrap().offset(), 0);
        assert_eq!(Pagination::new(2, 10).unwrap().offset(), 10);
        assert_eq!(Pagination::new(5, 3).unwrap().offset(), 12);
    }

    #[test]
    fn test_pagination_rejects_zero() {
        assert!(Pagination::new(0, 10).is_err());
        assert!(Pagination::new(1, 0).is_err());
    }
}
