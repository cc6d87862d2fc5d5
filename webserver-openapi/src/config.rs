use std::str::FromStr;

use anyhow::{anyhow, Context};
use deployment_store::ArangoConfig;

const DEFAULT_PORT: &str = "8080";
const DEFAULT_BATCH_SIZE: u32 = 1000;

/// What a handler does when the database fails underneath it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Log the failure and answer 200 with whatever could be read.
    #[default]
    Degrade,
    /// Answer 500 with the error message.
    Strict,
}

impl FromStr for ErrorPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "degrade" => Ok(ErrorPolicy::Degrade),
            "strict" => Ok(ErrorPolicy::Strict),
            other => Err(anyhow!(
                "Unknown error policy '{}', expected 'degrade' or 'strict'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseBackend {
    ArangoDb,
    Memory,
}

impl FromStr for DatabaseBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "arangodb" | "arango" => Ok(DatabaseBackend::ArangoDb),
            "memory" => Ok(DatabaseBackend::Memory),
            other => Err(anyhow!(
                "Unknown database backend '{}', expected 'arangodb' or 'memory'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub port: u16,
    pub database: DatabaseBackend,
    pub error_policy: ErrorPolicy,
    pub arango: ArangoConfig,
    pub cold_storage_url: Option<String>,
}

impl ServiceConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        ServiceConfig::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any variable source; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| -> String {
            lookup(key)
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let port = var("MS_PORT", DEFAULT_PORT);
        let port = port
            .parse::<u16>()
            .with_context(|| format!("Invalid port number '{}' in MS_PORT", port))?;

        let database: DatabaseBackend = var("MS_DATABASE", "arangodb").parse()?;
        let error_policy: ErrorPolicy = var("MS_ERROR_POLICY", "degrade").parse()?;

        let url = match lookup("ARANGO_URL").filter(|value| !value.is_empty()) {
            Some(url) => url,
            None => format!(
                "http://{}:{}",
                var("ARANGO_HOST", "localhost"),
                var("ARANGO_PORT", "8529")
            ),
        };

        let arango = ArangoConfig {
            url,
            user: var("ARANGO_USER", "root"),
            password: lookup("ARANGO_PASS").unwrap_or_default(),
            database: var("ARANGO_DATABASE", "ortelius"),
            collection: var("ARANGO_COLLECTION", "evidence"),
            batch_size: DEFAULT_BATCH_SIZE,
        };

        let cold_storage_url = lookup("COLD_STORAGE_URL").filter(|value| !value.is_empty());

        Ok(ServiceConfig {
            port,
            database,
            error_policy,
            arango,
            cold_storage_url,
        })
    }
}
