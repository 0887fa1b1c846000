//! Record-storage collaborator.
//!
//! The relay consumes a generic record API (create/get/list/update) over
//! logical collections and treats it as the single source of truth. The
//! in-memory implementation backs tests and local development; production
//! deployments plug the marketplace data platform in behind the same trait.

use crate::error::AppResult;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

pub mod memory;

pub use memory::InMemoryStore;

pub mod collections {
    pub const CONVERSATIONS: &str = "conversations";
    pub const MESSAGES: &str = "messages";
    /// One row per (message, reader) pair.
    pub const MESSAGE_READS: &str = "message_reads";
}

/// Top-level field equality filter.
#[derive(Debug, Clone, Default)]
pub struct Filter(Vec<(String, Value)>);

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq<V: Serialize>(mut self, field: &str, value: V) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.0.push((field.to_string(), value));
        self
    }

    pub fn matches(&self, record: &Value) -> bool {
        self.0
            .iter()
            .all(|(field, expected)| record.get(field) == Some(expected))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Sort {
    Unsorted,
    Asc(&'static str),
    Desc(&'static str),
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist a new record. The stored record (with any store-assigned
    /// fields) is returned.
    async fn create(&self, collection: &str, record: Value) -> AppResult<Value>;

    async fn get(&self, collection: &str, id: Uuid) -> AppResult<Option<Value>>;

    async fn list(
        &self,
        collection: &str,
        filter: &Filter,
        sort: Sort,
        limit: Option<usize>,
        offset: usize,
    ) -> AppResult<Vec<Value>>;

    /// Shallow-merge `patch` into the record with the given id and return
    /// the updated record.
    async fn update(&self, collection: &str, id: Uuid, patch: Value) -> AppResult<Value>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_matches_top_level_fields() {
        let record = json!({"a": 1, "b": "x"});
        assert!(Filter::new().eq("a", 1).matches(&record));
        assert!(Filter::new().eq("a", 1).eq("b", "x").matches(&record));
        assert!(!Filter::new().eq("a", 2).matches(&record));
        assert!(!Filter::new().eq("missing", 1).matches(&record));
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(Filter::new().matches(&json!({"anything": true})));
    }
}
