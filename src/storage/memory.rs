use super::{Filter, RecordStore, Sort};
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use chrono::DateTime;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Rebuildable in-memory record store. Records are JSON objects keyed by
/// their `id` field.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    inner: Arc<RwLock<HashMap<String, Vec<Value>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self, collection: &str) -> usize {
        let guard = self.inner.read().await;
        guard.get(collection).map(|v| v.len()).unwrap_or(0)
    }
}

fn record_id_matches(record: &Value, id: Uuid) -> bool {
    record.get("id").and_then(|v| v.as_str()) == Some(id.to_string().as_str())
}

/// Orders RFC 3339 timestamps chronologically, everything else by its
/// natural JSON ordering.
fn cmp_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::String(x), Value::String(y)) => {
            match (DateTime::parse_from_rfc3339(x), DateTime::parse_from_rfc3339(y)) {
                (Ok(dx), Ok(dy)) => dx.cmp(&dy),
                _ => x.cmp(y),
            }
        }
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .unwrap_or(0.0)
            .total_cmp(&y.as_f64().unwrap_or(0.0)),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn create(&self, collection: &str, mut record: Value) -> AppResult<Value> {
        let obj = record
            .as_object_mut()
            .ok_or_else(|| AppError::Storage("record must be a JSON object".into()))?;
        if !obj.contains_key("id") {
            obj.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
        }

        let mut guard = self.inner.write().await;
        guard.entry(collection.to_string()).or_default().push(record.clone());
        Ok(record)
    }

    async fn get(&self, collection: &str, id: Uuid) -> AppResult<Option<Value>> {
        let guard = self.inner.read().await;
        Ok(guard
            .get(collection)
            .and_then(|records| records.iter().find(|r| record_id_matches(r, id)))
            .cloned())
    }

    async fn list(
        &self,
        collection: &str,
        filter: &Filter,
        sort: Sort,
        limit: Option<usize>,
        offset: usize,
    ) -> AppResult<Vec<Value>> {
        let guard = self.inner.read().await;
        let mut rows: Vec<Value> = guard
            .get(collection)
            .map(|records| records.iter().filter(|r| filter.matches(r)).cloned().collect())
            .unwrap_or_default();

        match sort {
            Sort::Unsorted => {}
            Sort::Asc(field) => rows.sort_by(|a, b| {
                cmp_values(a.get(field).unwrap_or(&Value::Null), b.get(field).unwrap_or(&Value::Null))
            }),
            Sort::Desc(field) => rows.sort_by(|a, b| {
                cmp_values(b.get(field).unwrap_or(&Value::Null), a.get(field).unwrap_or(&Value::Null))
            }),
        }

        let rows = rows.into_iter().skip(offset);
        Ok(match limit {
            Some(n) => rows.take(n).collect(),
            None => rows.collect(),
        })
    }

    async fn update(&self, collection: &str, id: Uuid, patch: Value) -> AppResult<Value> {
        let patch_obj = match patch {
            Value::Object(map) => map,
            _ => return Err(AppError::Storage("patch must be a JSON object".into())),
        };

        let mut guard = self.inner.write().await;
        let records = guard.get_mut(collection).ok_or(AppError::NotFound)?;
        let record = records
            .iter_mut()
            .find(|r| record_id_matches(r, id))
            .ok_or(AppError::NotFound)?;

        if let Some(obj) = record.as_object_mut() {
            for (key, value) in patch_obj {
                obj.insert(key, value);
            }
        }
        Ok(record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::collections;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_assigns_id_when_missing() {
        let store = InMemoryStore::new();
        let created = store
            .create(collections::MESSAGES, json!({"content": "hi"}))
            .await
            .unwrap();
        let id = created["id"].as_str().unwrap();
        assert!(Uuid::parse_str(id).is_ok());
    }

    #[tokio::test]
    async fn test_get_and_update_round_trip() {
        let store = InMemoryStore::new();
        let id = Uuid::new_v4();
        store
            .create(collections::MESSAGES, json!({"id": id, "content": "hi", "edit_count": 0}))
            .await
            .unwrap();

        let updated = store
            .update(collections::MESSAGES, id, json!({"content": "edited", "edit_count": 1}))
            .await
            .unwrap();
        assert_eq!(updated["content"], "edited");

        let fetched = store.get(collections::MESSAGES, id).await.unwrap().unwrap();
        assert_eq!(fetched["edit_count"], 1);
    }

    #[tokio::test]
    async fn test_update_missing_record_is_not_found() {
        let store = InMemoryStore::new();
        let err = store
            .update(collections::MESSAGES, Uuid::new_v4(), json!({"x": 1}))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn test_list_filters_sorts_and_pages() {
        let store = InMemoryStore::new();
        let convo = Uuid::new_v4();
        for i in 0..5 {
            store
                .create(
                    collections::MESSAGES,
                    json!({
                        "conversation_id": convo,
                        "created_at": format!("2026-08-01T00:00:0{}Z", i),
                        "n": i,
                    }),
                )
                .await
                .unwrap();
        }
        store
            .create(collections::MESSAGES, json!({"conversation_id": Uuid::new_v4(), "n": 99}))
            .await
            .unwrap();

        let rows = store
            .list(
                collections::MESSAGES,
                &Filter::new().eq("conversation_id", convo),
                Sort::Desc("created_at"),
                Some(2),
                1,
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["n"], 3);
        assert_eq!(rows[1]["n"], 2);
    }
}
