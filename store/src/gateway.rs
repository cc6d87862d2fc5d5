use anyhow::{anyhow, Context};
use async_trait::async_trait;
use deployment_defs::StoreError;
use log::debug;
use reqwest::{StatusCode, Url};

use crate::ColdStorage;

/// Cold storage reached through an HTTP gateway serving `GET {base_url}/{cid}`.
pub struct GatewayColdStorage {
    client: reqwest::Client,
    base_url: Url,
}

impl GatewayColdStorage {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid cold storage url '{}'", base_url))?;
        if base_url.cannot_be_a_base() {
            return Err(anyhow!("Cold storage url '{}' cannot be a base", base_url));
        }
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to build the cold storage http client")?;
        Ok(GatewayColdStorage { client, base_url })
    }

    fn object_url(&self, identifier: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(identifier);
        }
        url
    }
}

#[async_trait]
impl ColdStorage for GatewayColdStorage {
    async fn lookup(&self, identifier: &str) -> anyhow::Result<Option<String>> {
        let url = self.object_url(identifier);
        debug!("Looking up '{}' in cold storage at {}", identifier, url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| StoreError::Transport(url.to_string(), e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body = response
                    .text()
                    .await
                    .map_err(|e| StoreError::Decode(e.to_string()))?;
                Ok(Some(body))
            }
            status => Err(StoreError::ColdStorage(status.as_u16(), identifier.to_string()).into()),
        }
    }
}
