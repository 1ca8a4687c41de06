//! Identity types for collections, entities and documents

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DocCacheResult, ValidationError};

/// Name of a logical document collection.
///
/// Always non-empty; the only constructor validates it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CollectionName(String);

impl CollectionName {
    pub fn new(name: impl Into<String>) -> DocCacheResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyCollectionName.into());
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CollectionName {
    type Error = crate::DocCacheError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CollectionName> for String {
    fn from(value: CollectionName) -> Self {
        value.0
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Owner of a pair of cache namespaces.
///
/// Usually one per model type. Mutations through a model invalidate every
/// cached read of that entity, whatever collection the read targeted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityName(String);

impl EntityName {
    pub fn new(name: impl Into<String>) -> DocCacheResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyEntityName.into());
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&CollectionName> for EntityName {
    fn from(collection: &CollectionName) -> Self {
        Self(collection.as_str().to_string())
    }
}

impl TryFrom<String> for EntityName {
    type Error = crate::DocCacheError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EntityName> for String {
    fn from(value: EntityName) -> Self {
        value.0
    }
}

impl fmt::Display for EntityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of an inserted document, as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a new UUIDv7 id (timestamp-sortable).
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DocCacheError;

    #[test]
    fn test_collection_name_rejects_empty() {
        assert!(matches!(
            CollectionName::new(""),
            Err(DocCacheError::Validation(ValidationError::EmptyCollectionName))
        ));
        assert!(CollectionName::new("   ").is_err());
        assert_eq!(CollectionName::new("test").unwrap().as_str(), "test");
    }

    #[test]
    fn test_entity_name_from_collection() {
        let collection = CollectionName::new("users").unwrap();
        let entity = EntityName::from(&collection);
        assert_eq!(entity.as_str(), "users");
        assert!(EntityName::new("").is_err());
    }

    #[test]
    fn test_collection_name_serde_validates() {
        let ok: CollectionName = serde_json::from_str("\"orders\"").unwrap();
        assert_eq!(ok.to_string(), "orders");
        assert!(serde_json::from_str::<CollectionName>("\"\"").is_err());
    }

    #[test]
    fn test_generated_document_ids_are_distinct() {
        let a = DocumentId::generate();
        let b = DocumentId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }
}
