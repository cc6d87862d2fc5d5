use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::{ColdStorage, CreateOutcome, DocumentCursor, DocumentQuery, DocumentStore};

const FIRST_KEY: u64 = 100001;

/// Document store kept in process memory, for tests and local runs.
pub struct MemoryDocumentStore {
    database: String,
    collection: String,
    documents: RwLock<Vec<Value>>,
    next_key: AtomicU64,
}

impl MemoryDocumentStore {
    pub fn new(database: &str, collection: &str) -> Self {
        MemoryDocumentStore {
            database: database.to_string(),
            collection: collection.to_string(),
            documents: RwLock::new(vec![]),
            next_key: AtomicU64::new(FIRST_KEY),
        }
    }

    /// Stores `document` as is, bypassing key assignment and conflict checks.
    pub async fn insert_raw(&self, document: Value) {
        self.documents.write().await.push(document);
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

fn key_exists(documents: &[Value], key: &str) -> bool {
    documents
        .iter()
        .any(|existing| existing.get("_key").and_then(Value::as_str) == Some(key))
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn query(&self, query: &DocumentQuery) -> anyhow::Result<Box<dyn DocumentCursor>> {
        let documents = self.documents.read().await;
        let matching: VecDeque<Value> = documents
            .iter()
            .filter(|document| query.matches(document))
            .cloned()
            .collect();
        Ok(Box::new(MemoryCursor::new(matching)))
    }

    async fn create_document(&self, document: &Value) -> anyhow::Result<CreateOutcome> {
        let mut stored = match document {
            Value::Object(map) => map.clone(),
            _ => return Err(anyhow::anyhow!("Document must be a JSON object")),
        };

        let mut documents = self.documents.write().await;

        let key = match stored.get("_key").and_then(Value::as_str) {
            Some(key) if !key.is_empty() => {
                if key_exists(&documents, key) {
                    return Ok(CreateOutcome::AlreadyExists);
                }
                key.to_string()
            }
            // Skip keys a client already claimed explicitly
            _ => loop {
                let candidate = self.next_key.fetch_add(1, Ordering::SeqCst).to_string();
                if !key_exists(&documents, &candidate) {
                    break candidate;
                }
            },
        };

        stored.insert("_key".to_string(), Value::String(key.clone()));
        documents.push(Value::Object(stored));
        Ok(CreateOutcome::Created(key))
    }

    fn database_name(&self) -> &str {
        &self.database
    }

    fn collection_name(&self) -> &str {
        &self.collection
    }
}

pub struct MemoryCursor {
    documents: VecDeque<Value>,
}

impl MemoryCursor {
    pub fn new(documents: VecDeque<Value>) -> Self {
        MemoryCursor { documents }
    }
}

#[async_trait]
impl DocumentCursor for MemoryCursor {
    async fn read_document(&mut self) -> Option<anyhow::Result<Value>> {
        self.documents.pop_front().map(Ok)
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.documents.clear();
        Ok(())
    }
}

/// Cold storage kept in process memory. Starts empty.
#[derive(Default)]
pub struct MemoryColdStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryColdStorage {
    pub fn new() -> Self {
        MemoryColdStorage::default()
    }

    pub async fn insert(&self, identifier: &str, json: &str) {
        self.entries
            .write()
            .await
            .insert(identifier.to_string(), json.to_string());
    }
}

#[async_trait]
impl ColdStorage for MemoryColdStorage {
    async fn lookup(&self, identifier: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.read().await.get(identifier).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    async fn drain(mut cursor: Box<dyn DocumentCursor>) -> Vec<Value> {
        let mut documents = vec![];
        while let Some(document) = cursor.read_document().await {
            documents.push(document.unwrap());
        }
        documents
    }

    #[tokio::test]
    async fn test_create_assigns_sequential_keys() {
        let store = MemoryDocumentStore::new("ortelius", "evidence");

        let first = store
            .create_document(&json!({"name": "a", "objtype": "Deployment"}))
            .await
            .unwrap();
        let second = store
            .create_document(&json!({"name": "b", "objtype": "Deployment"}))
            .await
            .unwrap();

        assert_eq!(first, CreateOutcome::Created("100001".to_string()));
        assert_eq!(second, CreateOutcome::Created("100002".to_string()));
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_create_with_existing_key_conflicts() {
        let store = MemoryDocumentStore::new("ortelius", "evidence");
        let document = json!({"_key": "fixed", "name": "a", "objtype": "Deployment"});

        assert_eq!(
            store.create_document(&document).await.unwrap(),
            CreateOutcome::Created("fixed".to_string())
        );
        assert_eq!(
            store.create_document(&document).await.unwrap(),
            CreateOutcome::AlreadyExists
        );
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_assigned_key_skips_client_supplied_key() {
        let store = MemoryDocumentStore::new("ortelius", "evidence");

        let first = store
            .create_document(&json!({"_key": "100001", "name": "client-keyed", "objtype": "Deployment"}))
            .await
            .unwrap();
        let second = store
            .create_document(&json!({"name": "auto-keyed", "objtype": "Deployment"}))
            .await
            .unwrap();

        assert_eq!(first, CreateOutcome::Created("100001".to_string()));
        assert_eq!(second, CreateOutcome::Created("100002".to_string()));

        let matches = drain(
            store
                .query(&DocumentQuery::by_name_or_key("Deployment", "100001"))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0]["name"], "client-keyed");
    }

    #[tokio::test]
    async fn test_create_rejects_non_object() {
        let store = MemoryDocumentStore::new("ortelius", "evidence");
        assert!(store.create_document(&json!(["a"])).await.is_err());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_query_filters_by_objtype_and_identifier() {
        let store = MemoryDocumentStore::new("ortelius", "evidence");
        store
            .insert_raw(json!({"_key": "1", "name": "svc-a", "objtype": "Deployment"}))
            .await;
        store
            .insert_raw(json!({"_key": "2", "name": "svc-a", "objtype": "Component"}))
            .await;
        store
            .insert_raw(json!({"_key": "3", "name": "svc-b", "objtype": "Deployment"}))
            .await;

        let all = drain(store.query(&DocumentQuery::by_objtype("Deployment")).await.unwrap()).await;
        assert_eq!(all.len(), 2);

        let by_name = drain(
            store
                .query(&DocumentQuery::by_name_or_key("Deployment", "svc-a"))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(by_name, vec![json!({"_key": "1", "name": "svc-a", "objtype": "Deployment"})]);

        let by_key = drain(
            store
                .query(&DocumentQuery::by_name_or_key("Deployment", "3"))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(by_key[0]["name"], "svc-b");
    }

    #[tokio::test]
    async fn test_cold_storage_lookup() {
        let storage = MemoryColdStorage::new();
        assert_eq!(storage.lookup("svc-a").await.unwrap(), None);

        storage.insert("svc-a", r#"{"name":"svc-a"}"#).await;
        assert_eq!(
            storage.lookup("svc-a").await.unwrap().as_deref(),
            Some(r#"{"name":"svc-a"}"#)
        );
    }

    #[test]
    fn test_cold_storage_normalize_is_stable() {
        let storage = MemoryColdStorage::new();
        let first = storage.normalize(&json!({"objtype": "Deployment", "name": "svc-a"})).unwrap();
        let second = storage.normalize(&json!({"name": "svc-a", "objtype": "Deployment"})).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.json, r#"{"name":"svc-a","objtype":"Deployment"}"#);
        assert!(first.cid.starts_with("sha256-"));
    }
}
