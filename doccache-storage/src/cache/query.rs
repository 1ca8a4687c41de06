//! Read queries, their modes and their results.
//!
//! [`ReadQuery`] is a closed set of variants, each carrying the arguments its
//! store call needs. Everything mode-specific (namespace, key inputs, store
//! call, payload shape) is decided by an exhaustive `match`, so adding a
//! mode without handling it everywhere does not compile.

use doccache_core::{
    canonical_document, canonical_json, CollectionName, DocCacheResult, Document, Filter,
    Pagination, QueryOptions, SerializationError,
};
use serde_json::{json, Value};

use super::key::{derive_field_key, FieldKey};
use super::namespace::NamespaceKind;

/// Payload-free discriminant of a [`ReadQuery`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReadMode {
    GetRow,
    GetCount,
    GetAllList,
    GetPageList,
    Command,
}

impl ReadMode {
    pub const ALL: [ReadMode; 5] = [
        ReadMode::GetRow,
        ReadMode::GetCount,
        ReadMode::GetAllList,
        ReadMode::GetPageList,
        ReadMode::Command,
    ];

    /// Name hashed into the field key.
    pub fn as_str(self) -> &'static str {
        match self {
            ReadMode::GetRow => "getRow",
            ReadMode::GetCount => "getCount",
            ReadMode::GetAllList => "getAllList",
            ReadMode::GetPageList => "getPageList",
            ReadMode::Command => "command",
        }
    }

    /// Namespace holding results of this mode.
    pub fn namespace(self) -> NamespaceKind {
        match self {
            ReadMode::GetRow | ReadMode::GetCount => NamespaceKind::Info,
            ReadMode::GetAllList | ReadMode::GetPageList | ReadMode::Command => {
                NamespaceKind::List
            }
        }
    }
}

/// A logical read against one collection.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadQuery {
    /// First matching document; `limit` is forced to 1.
    Row { filter: Filter, options: QueryOptions },
    /// Number of matching documents.
    Count { filter: Filter },
    /// Every matching document.
    AllList { filter: Filter, options: QueryOptions },
    /// One page of matching documents.
    PageList {
        filter: Filter,
        options: QueryOptions,
        page: Pagination,
    },
    /// Store-level command such as an aggregation pipeline.
    Command { command: Document },
}

impl ReadQuery {
    pub fn mode(&self) -> ReadMode {
        match self {
            ReadQuery::Row { .. } => ReadMode::GetRow,
            ReadQuery::Count { .. } => ReadMode::GetCount,
            ReadQuery::AllList { .. } => ReadMode::GetAllList,
            ReadQuery::PageList { .. } => ReadMode::GetPageList,
            ReadQuery::Command { .. } => ReadMode::Command,
        }
    }

    /// Canonical (filter, options) strings fed to the key deriver.
    ///
    /// | mode        | filter part | options part                        |
    /// |-------------|-------------|-------------------------------------|
    /// | getRow      | filter      | options with `limit` = 1            |
    /// | getCount    | filter      | `{}`                                |
    /// | getAllList  | filter      | options                             |
    /// | getPageList | filter      | `{"limit":l,"options":o,"page":p}`  |
    /// | command     | command     | `{}`                                |
    pub fn key_parts(&self) -> DocCacheResult<(String, String)> {
        const NO_OPTIONS: &str = "{}";

        match self {
            ReadQuery::Row { filter, options } => Ok((
                filter.canonical()?,
                options.clone().with_limit(1).canonical()?,
            )),
            ReadQuery::Count { filter } => Ok((filter.canonical()?, NO_OPTIONS.to_string())),
            ReadQuery::AllList { filter, options } => {
                Ok((filter.canonical()?, options.canonical()?))
            }
            ReadQuery::PageList {
                filter,
                options,
                page,
            } => {
                let folded = json!({
                    "limit": page.limit(),
                    "options": Value::Object(options.as_document().clone()),
                    "page": page.page(),
                });
                Ok((filter.canonical()?, canonical_json(&folded)?))
            }
            ReadQuery::Command { command } => {
                Ok((canonical_document(command)?, NO_OPTIONS.to_string()))
            }
        }
    }

    /// Field key identifying this query's cached result.
    pub fn field_key(&self, collection: &CollectionName) -> DocCacheResult<FieldKey> {
        let (filter, options) = self.key_parts()?;
        Ok(derive_field_key(collection, &filter, &options, self.mode()))
    }
}

/// Typed result of a read.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Row(Option<Document>),
    Count(u64),
    Documents(Vec<Document>),
}

impl QueryResult {
    /// Encode as the cached payload: a document or `null`, an integer, or
    /// an array of documents.
    pub fn encode(&self) -> DocCacheResult<String> {
        let encoded = match self {
            QueryResult::Row(row) => serde_json::to_string(row),
            QueryResult::Count(count) => Ok(count.to_string()),
            QueryResult::Documents(docs) => serde_json::to_string(docs),
        };
        encoded.map_err(|e| {
            SerializationError::Encode {
                what: "query result".to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Decode a cached payload written for `mode`.
    pub fn decode(mode: ReadMode, payload: &str) -> DocCacheResult<Self> {
        let decode_error = |e: serde_json::Error| SerializationError::Decode {
            what: format!("{} payload", mode.as_str()),
            reason: e.to_string(),
        };

        match mode {
            ReadMode::GetRow => serde_json::from_str::<Option<Document>>(payload)
                .map(QueryResult::Row)
                .map_err(|e| decode_error(e).into()),
            ReadMode::GetCount => serde_json::from_str::<u64>(payload)
                .map(QueryResult::Count)
                .map_err(|e| decode_error(e).into()),
            ReadMode::GetAllList | ReadMode::GetPageList | ReadMode::Command => {
                serde_json::from_str::<Vec<Document>>(payload)
                    .map(QueryResult::Documents)
                    .map_err(|e| decode_error(e).into())
            }
        }
    }

    pub fn into_row(self) -> DocCacheResult<Option<Document>> {
        match self {
            QueryResult::Row(row) => Ok(row),
            other => Err(shape_mismatch("row", &other)),
        }
    }

    pub fn into_count(self) -> DocCacheResult<u64> {
        match self {
            QueryResult::Count(count) => Ok(count),
            other => Err(shape_mismatch("count", &other)),
        }
    }

    pub fn into_documents(self) -> DocCacheResult<Vec<Document>> {
        match self {
            QueryResult::Documents(docs) => Ok(docs),
            other => Err(shape_mismatch("documents", &other)),
        }
    }

    fn shape(&self) -> &'static str {
        match self {
            QueryResult::Row(_) => "row",
            QueryResult::Count(_) => "count",
            QueryResult::Documents(_) => "documents",
        }
    }
}

fn shape_mismatch(expected: &str, found: &QueryResult) -> doccache_core::DocCacheError {
    SerializationError::Decode {
        what: expected.to_string(),
        reason: format!("read returned a {} result", found.shape()),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use doccache_core::SortDirection;
    use serde_json::json;

    fn coll() -> CollectionName {
        CollectionName::new("test").unwrap()
    }

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_mode_namespaces() {
        assert_eq!(ReadMode::GetRow.namespace(), NamespaceKind::Info);
        assert_eq!(ReadMode::GetCount.namespace(), NamespaceKind::Info);
        assert_eq!(ReadMode::GetAllList.namespace(), NamespaceKind::List);
        assert_eq!(ReadMode::GetPageList.namespace(), NamespaceKind::List);
        assert_eq!(ReadMode::Command.namespace(), NamespaceKind::List);
    }

    #[test]
    fn test_mode_names() {
        let names: Vec<_> = ReadMode::ALL.iter().map(|m| m.as_str()).collect();
        assert_eq!(
            names,
            vec!["getRow", "getCount", "getAllList", "getPageList", "command"]
        );
    }

    #[test]
    fn test_row_key_forces_limit_one() {
        let explicit = ReadQuery::Row {
            filter: Filter::all(),
            options: QueryOptions::new().with_limit(1),
        };
        let implicit = ReadQuery::Row {
            filter: Filter::all(),
            options: QueryOptions::new().with_limit(50),
        };
        assert_eq!(
            explicit.field_key(&coll()).unwrap(),
            implicit.field_key(&coll()).unwrap()
        );
    }

    #[test]
    fn test_page_is_part_of_the_key() {
        let page = |p| ReadQuery::PageList {
            filter: Filter::all(),
            options: QueryOptions::new().with_sort("_id", SortDirection::Ascending),
            page: Pagination::new(p, 10).unwrap(),
        };
        assert_ne!(
            page(1).field_key(&coll()).unwrap(),
            page(2).field_key(&coll()).unwrap()
        );
    }

    #[test]
    fn test_same_arguments_different_modes_differ() {
        let filter = Filter::all().eq("status", "active");
        let all = ReadQuery::AllList {
            filter: filter.clone(),
            options: QueryOptions::new(),
        };
        let count = ReadQuery::Count { filter };
        assert_ne!(
            all.field_key(&coll()).unwrap(),
            count.field_key(&coll()).unwrap()
        );
    }

    #[test]
    fn test_command_key_uses_canonical_payload() {
        let a = ReadQuery::Command {
            command: doc(json!({"aggregate": "test", "pipeline": [{"$match": {"a": 1, "b": 2}}]})),
        };
        let b = ReadQuery::Command {
            command: doc(json!({"pipeline": [{"$match": {"b": 2, "a": 1}}], "aggregate": "test"})),
        };
        assert_eq!(a.field_key(&coll()).unwrap(), b.field_key(&coll()).unwrap());
    }

    #[test]
    fn test_result_payload_shapes() {
        assert_eq!(QueryResult::Count(7).encode().unwrap(), "7");
        assert_eq!(QueryResult::Row(None).encode().unwrap(), "null");
        assert_eq!(
            QueryResult::Documents(vec![doc(json!({"id": 1}))])
                .encode()
                .unwrap(),
            r#"[{"id":1}]"#
        );
    }

    #[test]
    fn test_result_decode_matches_encode() {
        let row = QueryResult::Row(Some(doc(json!({"id": 1, "name": "a"}))));
        let payload = row.encode().unwrap();
        assert_eq!(QueryResult::decode(ReadMode::GetRow, &payload).unwrap(), row);

        let count = QueryResult::Count(42);
        assert_eq!(
            QueryResult::decode(ReadMode::GetCount, &count.encode().unwrap()).unwrap(),
            count
        );
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        assert!(QueryResult::decode(ReadMode::GetCount, "[1,2]").is_err());
        assert!(QueryResult::decode(ReadMode::GetAllList, "3").is_err());
        assert!(QueryResult::decode(ReadMode::GetRow, "{not json").is_err());
    }

    #[test]
    fn test_typed_accessors() {
        assert_eq!(QueryResult::Count(3).into_count().unwrap(), 3);
        assert!(QueryResult::Count(3).into_documents().is_err());
        assert_eq!(QueryResult::Row(None).into_row().unwrap(), None);
        assert!(QueryResult::Documents(vec![]).into_row().is_err());
    }
}
