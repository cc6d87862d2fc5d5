use std::collections::VecDeque;

use anyhow::Context;
use async_trait::async_trait;
use deployment_defs::StoreError;
use log::{debug, info};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{CreateOutcome, DocumentCursor, DocumentQuery, DocumentStore};

#[derive(Debug, Clone)]
pub struct ArangoConfig {
    pub url: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub collection: String,
    pub batch_size: u32,
}

#[derive(Debug, Deserialize)]
struct CursorResponse {
    #[serde(default)]
    result: Vec<Value>,
    #[serde(rename = "hasMore", default)]
    has_more: bool,
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DocumentMeta {
    #[serde(rename = "_key")]
    key: String,
}

#[derive(Debug, Deserialize)]
struct ArangoErrorBody {
    #[serde(rename = "errorMessage", default)]
    error_message: String,
}

/// Turns a non-success response into a `StoreError::Database` carrying the server's message.
async fn error_from_response(response: reqwest::Response) -> StoreError {
    let status = response.status().as_u16();
    let text = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ArangoErrorBody>(&text) {
        Ok(body) if !body.error_message.is_empty() => body.error_message,
        _ => text,
    };
    StoreError::Database { status, message }
}

#[derive(Clone)]
struct Connection {
    client: reqwest::Client,
    url: String,
    user: String,
    password: String,
}

impl Connection {
    fn request(&self, method: Method, database: &str, path: &str) -> RequestBuilder {
        let url = format!(
            "{}/_db/{}/_api/{}",
            self.url.trim_end_matches('/'),
            database,
            path
        );
        self.client
            .request(method, url)
            .basic_auth(&self.user, Some(&self.password))
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, StoreError> {
        request
            .send()
            .await
            .map_err(|e| StoreError::Transport(self.url.clone(), e.to_string()))
    }
}

/// Document store backed by the ArangoDB HTTP API.
pub struct ArangoStore {
    connection: Connection,
    config: ArangoConfig,
}

impl ArangoStore {
    pub fn new(config: ArangoConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to build the database http client")?;
        let connection = Connection {
            client,
            url: config.url.clone(),
            user: config.user.clone(),
            password: config.password.clone(),
        };
        Ok(ArangoStore { connection, config })
    }

    /// Creates the database and the collection unless they already exist.
    pub async fn ensure_collection(&self) -> anyhow::Result<()> {
        let request = self
            .connection
            .request(Method::POST, "_system", "database")
            .json(&json!({ "name": self.config.database }));
        let response = self.connection.send(request).await?;
        match response.status() {
            StatusCode::CONFLICT => debug!("Database '{}' already exists", self.config.database),
            status if status.is_success() => info!("Created database '{}'", self.config.database),
            _ => {
                return Err(error_from_response(response).await)
                    .context(format!("Failed to create database '{}'", self.config.database))
            }
        }

        let request = self
            .connection
            .request(Method::POST, &self.config.database, "collection")
            .json(&json!({ "name": self.config.collection }));
        let response = self.connection.send(request).await?;
        match response.status() {
            StatusCode::CONFLICT => {
                debug!("Collection '{}' already exists", self.config.collection)
            }
            status if status.is_success() => {
                info!("Created collection '{}'", self.config.collection)
            }
            _ => {
                return Err(error_from_response(response).await).context(format!(
                    "Failed to create collection '{}'",
                    self.config.collection
                ))
            }
        }

        Ok(())
    }
}

#[async_trait]
impl DocumentStore for ArangoStore {
    async fn query(&self, query: &DocumentQuery) -> anyhow::Result<Box<dyn DocumentCursor>> {
        let (aql, bind_vars) = query.to_aql(&self.config.collection);
        let request = self
            .connection
            .request(Method::POST, &self.config.database, "cursor")
            .json(&json!({
                "query": aql,
                "bindVars": bind_vars,
                "batchSize": self.config.batch_size,
            }));
        let response = self.connection.send(request).await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await).context("Failed to run query");
        }
        let body: CursorResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        Ok(Box::new(ArangoCursor::new(
            self.connection.clone(),
            self.config.database.clone(),
            body,
        )))
    }

    async fn create_document(&self, document: &Value) -> anyhow::Result<CreateOutcome> {
        let request = self
            .connection
            .request(
                Method::POST,
                &self.config.database,
                &format!("document/{}", self.config.collection),
            )
            .json(document);
        let response = self.connection.send(request).await?;
        if response.status() == StatusCode::CONFLICT {
            return Ok(CreateOutcome::AlreadyExists);
        }
        if !response.status().is_success() {
            return Err(error_from_response(response).await).context("Failed to create document");
        }
        let meta: DocumentMeta = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(CreateOutcome::Created(meta.key))
    }

    fn database_name(&self) -> &str {
        &self.config.database
    }

    fn collection_name(&self) -> &str {
        &self.config.collection
    }
}

/// Server side cursor; further batches are fetched as the current one drains.
pub struct ArangoCursor {
    connection: Connection,
    database: String,
    id: Option<String>,
    batch: VecDeque<Value>,
    has_more: bool,
}

impl ArangoCursor {
    fn new(connection: Connection, database: String, response: CursorResponse) -> Self {
        ArangoCursor {
            connection,
            database,
            id: response.id,
            batch: response.result.into(),
            has_more: response.has_more,
        }
    }

    async fn fetch_next_batch(&mut self, id: &str) -> anyhow::Result<()> {
        let request =
            self.connection
                .request(Method::PUT, &self.database, &format!("cursor/{}", id));
        let response = self.connection.send(request).await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await)
                .context(format!("Failed to read next batch of cursor {}", id));
        }
        let body: CursorResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        self.batch = body.result.into();
        self.has_more = body.has_more;
        Ok(())
    }
}

#[async_trait]
impl DocumentCursor for ArangoCursor {
    async fn read_document(&mut self) -> Option<anyhow::Result<Value>> {
        loop {
            if let Some(document) = self.batch.pop_front() {
                return Some(Ok(document));
            }
            if !self.has_more {
                return None;
            }
            let Some(id) = self.id.clone() else {
                self.has_more = false;
                return Some(Err(StoreError::MissingPayload().into()));
            };
            if let Err(e) = self.fetch_next_batch(&id).await {
                self.has_more = false;
                return Some(Err(e));
            }
        }
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        // The server drops exhausted cursors on its own
        if !self.has_more {
            return Ok(());
        }
        self.has_more = false;
        self.batch.clear();
        let Some(id) = self.id.take() else {
            return Ok(());
        };
        let request =
            self.connection
                .request(Method::DELETE, &self.database, &format!("cursor/{}", id));
        let response = self.connection.send(request).await?;
        if !response.status().is_success() && response.status() != StatusCode::NOT_FOUND {
            return Err(error_from_response(response).await)
                .context(format!("Failed to close cursor {}", id));
        }
        Ok(())
    }
}
