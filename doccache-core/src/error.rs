//! Error types for doccache operations

use thiserror::Error;

/// Document store errors.
///
/// Always surfaced to the caller. The cache layer never retries or masks them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Document store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Query on {collection} failed: {reason}")]
    QueryFailed { collection: String, reason: String },

    #[error("Operation on {collection} was cancelled: {reason}")]
    Cancelled { collection: String, reason: String },
}

/// Cache store errors.
///
/// Recovered locally wherever recovery preserves correctness.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Corrupted cache entry {namespace}/{field}: {reason}")]
    Corrupted {
        namespace: String,
        field: String,
        reason: String,
    },
}

/// Serialization errors for filters, options and results.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SerializationError {
    #[error("Expected a JSON object for {what}, got {found}")]
    NotAnObject { what: String, found: String },

    #[error("Failed to encode {what}: {reason}")]
    Encode { what: String, reason: String },

    #[error("Failed to decode {what}: {reason}")]
    Decode { what: String, reason: String },
}

/// Write rejections from the document store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MutationError {
    #[error("{operation} on {collection} rejected: {reason}")]
    Rejected {
        collection: String,
        operation: String,
        reason: String,
    },
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Collection name must not be empty")]
    EmptyCollectionName,

    #[error("Entity name must not be empty")]
    EmptyEntityName,

    #[error("Invalid pagination: page {page}, limit {limit} - {reason}")]
    InvalidPagination { page: u64, limit: u64, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Incompatible options: {option_a} and {option_b}")]
    IncompatibleOptions { option_a: String, option_b: String },
}

/// Master error type for all doccache errors.
#[derive(Debug, Clone, Error)]
pub enum DocCacheError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    #[error("Mutation error: {0}")]
    Mutation(#[from] MutationError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl DocCacheError {
    /// True for failures that originate in the document store.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Mutation(_))
    }
}

/// Result type alias for doccache operations.
pub type DocCacheResult<T> = Result<T, DocCacheError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display_query_failed() {
        let err = StoreError::QueryFailed {
            collection: "users".to_string(),
            reason: "socket closed".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("users"));
        assert!(msg.contains("socket closed"));
    }

    #[test]
    fn test_cache_error_display_corrupted() {
        let err = CacheError::Corrupted {
            namespace: "doccache:info:users".to_string(),
            field: "abc".to_string(),
            reason: "trailing characters".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("doccache:info:users/abc"));
        assert!(msg.contains("trailing characters"));
    }

    #[test]
    fn test_mutation_error_display_rejected() {
        let err = MutationError::Rejected {
            collection: "orders".to_string(),
            operation: "insert".to_string(),
            reason: "duplicate key".to_string(),
        };
        assert_eq!(
            format!("{}", err),
            "insert on orders rejected: duplicate key"
        );
    }

    #[test]
    fn test_validation_error_display_pagination() {
        let err = ValidationError::InvalidPagination {
            page: 0,
            limit: 10,
            reason: "page starts at 1".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("page 0"));
        assert!(msg.contains("page starts at 1"));
    }

    #[test]
    fn test_doccache_error_from_variants() {
        let store = DocCacheError::from(StoreError::Unavailable {
            reason: "down".to_string(),
        });
        assert!(matches!(store, DocCacheError::Store(_)));
        assert!(store.is_store_failure());

        let cache = DocCacheError::from(CacheError::Unavailable {
            reason: "down".to_string(),
        });
        assert!(matches!(cache, DocCacheError::Cache(_)));
        assert!(!cache.is_store_failure());

        let ser = DocCacheError::from(SerializationError::NotAnObject {
            what: "filter".to_string(),
            found: "array".to_string(),
        });
        assert!(matches!(ser, DocCacheError::Serialization(_)));

        let mutation = DocCacheError::from(MutationError::Rejected {
            collection: "c".to_string(),
            operation: "update".to_string(),
            reason: "r".to_string(),
        });
        assert!(mutation.is_store_failure());

        let validation = DocCacheError::from(ValidationError::EmptyCollectionName);
        assert!(matches!(validation, DocCacheError::Validation(_)));

        let config = DocCacheError::from(ConfigError::IncompatibleOptions {
            option_a: "list_prefix".to_string(),
            option_b: "info_prefix".to_string(),
        });
        assert!(matches!(config, DocCacheError::Config(_)));
    }
}
