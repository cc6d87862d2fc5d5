use async_trait::async_trait;
use deployment_utils::ContentAddress;
use serde_json::Value;

use crate::DocumentQuery;

/// Result of writing a new document.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    /// Stored under the key assigned by the database.
    Created(String),
    /// A document with the same unique key is already stored; nothing was written.
    AlreadyExists,
}

/// Finite, single pass sequence of documents produced by a query.
#[async_trait]
pub trait DocumentCursor: Send {
    /// Next document, `None` once the cursor is exhausted.
    async fn read_document(&mut self) -> Option<anyhow::Result<Value>>;
    /// Releases server side resources held by an unfinished cursor.
    async fn close(&mut self) -> anyhow::Result<()>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn query(&self, query: &DocumentQuery) -> anyhow::Result<Box<dyn DocumentCursor>>;
    async fn create_document(&self, document: &Value) -> anyhow::Result<CreateOutcome>;
    fn database_name(&self) -> &str;
    fn collection_name(&self) -> &str;
}

#[async_trait]
pub trait ColdStorage: Send + Sync {
    /// JSON stored under `identifier`, `None` when cold storage has nothing for it.
    async fn lookup(&self, identifier: &str) -> anyhow::Result<Option<String>>;

    fn normalize(&self, document: &Value) -> anyhow::Result<ContentAddress> {
        ContentAddress::from_value(document)
    }
}
