use async_trait::async_trait;
use chrono::Utc;
use rl_core::config::AppConfig;
use rl_core::storage::{apply_patch, field, resolve_server_timestamps, MAX_IN_QUERY_VALUES};
use rl_core::{Document, DocumentStore, Error, Result, Scope, WriteBatch, WriteOp};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use crate::StorageBackend;

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: HashMap<Scope, BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn documents(&self, scope: &Scope) -> impl Iterator<Item = Document> + '_ {
        self.collections
            .get(scope)
            .into_iter()
            .flat_map(|docs| docs.iter())
            .map(|(id, data)| Document { id: id.clone(), data: data.clone() })
    }

    pub fn get(&self, scope: &Scope, id: &str) -> Option<Document> {
        self.collections
            .get(scope)
            .and_then(|docs| docs.get(id))
            .map(|data| Document { id: id.to_string(), data: data.clone() })
    }

    pub fn set(&mut self, scope: &Scope, id: &str, mut data: Value) {
        resolve_server_timestamps(&mut data, Utc::now());
        self.collections
            .entry(scope.clone())
            .or_default()
            .insert(id.to_string(), data);
    }

    pub fn update(&mut self, scope: &Scope, id: &str, patch: &Map<String, Value>) -> Result<()> {
        let existing = self
            .collections
            .get_mut(scope)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| Error::NotFound(format!("{}/{}", scope, id)))?;
        let mut patch = Value::Object(patch.clone());
        resolve_server_timestamps(&mut patch, Utc::now());
        if let Value::Object(patch) = patch {
            apply_patch(existing, &patch);
        }
        Ok(())
    }

    pub fn delete(&mut self, scope: &Scope, id: &str) {
        if let Some(docs) = self.collections.get_mut(scope) {
            docs.remove(id);
        }
    }

    pub fn list(&self, scope: &Scope) -> Vec<Document> {
        self.documents(scope).collect()
    }

    pub fn find_eq(&self, scope: &Scope, path: &str, value: &Value) -> Vec<Document> {
        self.documents(scope)
            .filter(|doc| field(&doc.data, path) == Some(value))
            .collect()
    }

    pub fn find_in(&self, scope: &Scope, path: &str, values: &[String]) -> Vec<Document> {
        self.documents(scope)
            .filter(|doc| {
                field(&doc.data, path)
                    .and_then(Value::as_str)
                    .map_or(false, |v| values.iter().any(|candidate| candidate == v))
            })
            .collect()
    }

    /// Applies all ops to a copy and swaps it in only when every op succeeded.
    pub fn apply(&mut self, ops: Vec<WriteOp>) -> Result<()> {
        let mut staged = self.clone();
        for op in ops {
            match op {
                WriteOp::Set { scope, id, data } => staged.set(&scope, &id, data),
                WriteOp::Update { scope, id, patch } => staged.update(&scope, &id, &patch)?,
                WriteOp::Delete { scope, id } => staged.delete(&scope, &id),
            }
        }
        *self = staged;
        Ok(())
    }
}

pub struct MemoryStorage {
    store: Arc<RwLock<MemoryStore>>,
}

impl MemoryStorage {
    pub fn empty() -> Self {
        Self {
            store: Arc::new(RwLock::new(MemoryStore::new())),
        }
    }

    pub async fn new(_config: &AppConfig) -> Result<Self> {
        Ok(Self::empty())
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::empty()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    fn get_error_message() -> &'static str {
        "Memory storage should be available"
    }

    async fn new(config: &AppConfig) -> Result<Self> where Self: Sized {
        MemoryStorage::new(config).await
    }
}

#[async_trait]
impl DocumentStore for MemoryStorage {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, scope: &Scope, id: &str) -> Result<Option<Document>> {
        Ok(self.store.read().await.get(scope, id))
    }

    async fn set(&self, scope: &Scope, id: &str, data: Value) -> Result<()> {
        self.store.write().await.set(scope, id, data);
        Ok(())
    }

    async fn update(&self, scope: &Scope, id: &str, patch: Map<String, Value>) -> Result<()> {
        self.store.write().await.update(scope, id, &patch)
    }

    async fn delete(&self, scope: &Scope, id: &str) -> Result<()> {
        self.store.write().await.delete(scope, id);
        Ok(())
    }

    async fn list(&self, scope: &Scope) -> Result<Vec<Document>> {
        Ok(self.store.read().await.list(scope))
    }

    async fn find_eq(&self, scope: &Scope, field: &str, value: &Value) -> Result<Vec<Document>> {
        Ok(self.store.read().await.find_eq(scope, field, value))
    }

    async fn find_in(&self, scope: &Scope, field: &str, values: &[String]) -> Result<Vec<Document>> {
        if values.len() > MAX_IN_QUERY_VALUES {
            return Err(Error::QueryTooLarge(values.len(), MAX_IN_QUERY_VALUES));
        }
        Ok(self.store.read().await.find_in(scope, field, values))
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        self.store.write().await.apply(batch.into_ops())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rl_core::storage::server_timestamp;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_storage() {
        let storage = MemoryStorage::empty();
        let scope = Scope::articles("alice");

        storage
            .set(&scope, "a1", json!({"originalUrl": "https://a.dev", "createdAt": server_timestamp()}))
            .await
            .unwrap();

        let doc = storage.get(&scope, "a1").await.unwrap().unwrap();
        assert!(doc.data["createdAt"].is_string());
        assert!(storage.get(&Scope::articles("bob"), "a1").await.unwrap().is_none());

        let mut patch = Map::new();
        patch.insert("readLater".to_string(), json!(true));
        storage.update(&scope, "a1", patch.clone()).await.unwrap();
        let found = storage.find_eq(&scope, "readLater", &json!(true)).await.unwrap();
        assert_eq!(found.len(), 1);

        assert!(matches!(storage.update(&scope, "missing", patch).await, Err(Error::NotFound(_))));

        storage.delete(&scope, "a1").await.unwrap();
        assert!(storage.list(&scope).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_find_in_limit() {
        let storage = MemoryStorage::empty();
        let scope = Scope::articles("alice");
        storage.set(&scope, "a1", json!({"originalUrl": "u1"})).await.unwrap();
        storage.set(&scope, "a2", json!({"originalUrl": "u2"})).await.unwrap();

        let found = storage
            .find_in(&scope, "originalUrl", &["u2".to_string(), "u3".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "a2");

        let too_many: Vec<String> = (0..31).map(|i| format!("u{}", i)).collect();
        assert!(matches!(
            storage.find_in(&scope, "originalUrl", &too_many).await,
            Err(Error::QueryTooLarge(31, 30))
        ));
    }

    #[tokio::test]
    async fn test_failed_batch_leaves_no_partial_writes() {
        let storage = MemoryStorage::empty();
        let scope = Scope::articles("alice");

        let mut batch = WriteBatch::new();
        batch.set(scope.clone(), "new-1", json!({"originalUrl": "u1"}));
        batch.update(scope.clone(), "does-not-exist", Map::new());
        assert!(storage.commit(batch).await.is_err());
        assert!(storage.list(&scope).await.unwrap().is_empty());

        let mut batch = WriteBatch::new();
        batch.set(scope.clone(), "new-1", json!({"originalUrl": "u1"}));
        batch.set(scope.clone(), "new-2", json!({"originalUrl": "u2"}));
        storage.commit(batch).await.unwrap();
        assert_eq!(storage.list(&scope).await.unwrap().len(), 2);
    }
}
