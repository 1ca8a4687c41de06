//! Per-entity cache namespaces.

use std::fmt;

use doccache_core::{CacheConfig, EntityName};

/// Which of an entity's two namespaces a result lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamespaceKind {
    /// Multi-document results: all-list, page-list, command.
    List,
    /// Single rows and counts.
    Info,
}

impl fmt::Display for NamespaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamespaceKind::List => write!(f, "list"),
            NamespaceKind::Info => write!(f, "info"),
        }
    }
}

/// The pair of namespace names owned by one entity.
///
/// Names are fixed for the entity's lifetime: `prefix + entity name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespaces {
    list: String,
    info: String,
}

impl Namespaces {
    pub fn for_entity(config: &CacheConfig, entity: &EntityName) -> Self {
        Self {
            list: format!("{}{}", config.list_prefix, entity),
            info: format!("{}{}", config.info_prefix, entity),
        }
    }

    pub fn get(&self, kind: NamespaceKind) -> &str {
        match kind {
            NamespaceKind::List => &self.list,
            NamespaceKind::Info => &self.info,
        }
    }

    pub fn list(&self) -> &str {
        &self.list
    }

    pub fn info(&self) -> &str {
        &self.info
    }

    /// Both names, list first.
    pub fn both(&self) -> [&str; 2] {
        [&self.list, &self.info]
    }
}
