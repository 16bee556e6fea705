//! SurrealDB Handle - Connection and Schema
//!
//! Supports in-memory (`mem://`), embedded file (`surrealkv://<dir>`) and
//! remote (`ws://` / `wss://`) connections through `engine::any`.

use std::path::Path;

use surrealdb::engine::any::Any;
use surrealdb::opt::auth::{Database, Root};
use surrealdb::Surreal;
use tracing::{info, instrument};

use crate::error::StateError;
use crate::migrations;
use crate::Result;

/// Connection settings for the relationship store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Endpoint URL (`mem://`, `surrealkv://path`, `wss://host`)
    pub url: String,
    /// Namespace (default: "ripple")
    pub namespace: String,
    /// Database name (default: "main")
    pub database: String,
    /// Username for remote servers
    pub username: Option<String>,
    /// Password for remote servers
    pub password: Option<String>,
    /// Whether the credentials belong to a root user
    pub is_root: bool,
}

impl StoreConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            namespace: "ripple".to_string(),
            database: "main".to_string(),
            username: None,
            password: None,
            is_root: false,
        }
    }

    /// Volatile store, mainly for tests.
    pub fn in_memory() -> Self {
        Self::new("mem://")
    }

    /// Embedded on-disk store rooted at `dir`.
    pub fn local(dir: impl AsRef<Path>) -> Self {
        Self::new(format!("surrealkv://{}", dir.as_ref().display()))
    }

    /// Set custom namespace
    pub fn with_namespace(mut self, ns: impl Into<String>) -> Self {
        self.namespace = ns.into();
        self
    }

    /// Set custom database
    pub fn with_database(mut self, db: impl Into<String>) -> Self {
        self.database = db.into();
        self
    }

    /// Attach credentials for a remote server
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
        is_root: bool,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self.is_root = is_root;
        self
    }

    /// Apply environment overrides.
    ///
    /// Reads:
    /// - RIPPLE_STORE_URL
    /// - RIPPLE_STORE_NAMESPACE
    /// - RIPPLE_STORE_DATABASE
    /// - RIPPLE_STORE_USERNAME / RIPPLE_STORE_PASSWORD
    /// - RIPPLE_STORE_ROOT ("true" for root users)
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("RIPPLE_STORE_URL") {
            self.url = url;
        }
        if let Ok(ns) = std::env::var("RIPPLE_STORE_NAMESPACE") {
            self.namespace = ns;
        }
        if let Ok(db) = std::env::var("RIPPLE_STORE_DATABASE") {
            self.database = db;
        }
        if let (Ok(user), Ok(pass)) = (
            std::env::var("RIPPLE_STORE_USERNAME"),
            std::env::var("RIPPLE_STORE_PASSWORD"),
        ) {
            let is_root = std::env::var("RIPPLE_STORE_ROOT")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false);
            self = self.with_credentials(user, pass, is_root);
        }
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::local(".ripple/db")
    }
}

/// SurrealDB connection handle shared by the store implementations.
#[derive(Clone)]
pub struct SurrealHandle {
    db: Surreal<Any>,
}

impl std::fmt::Debug for SurrealHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurrealHandle").finish_non_exhaustive()
    }
}

impl SurrealHandle {
    /// Connect, authenticate if credentials are present, select the
    /// namespace/database and initialize the schema.
    #[instrument(
        skip(config),
        fields(url = %config.url, namespace = %config.namespace, database = %config.database)
    )]
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        if let Some(dir) = config.url.strip_prefix("surrealkv://") {
            std::fs::create_dir_all(dir).map_err(|e| {
                StateError::Connection(format!(
                    "Failed to create database directory {}: {}",
                    dir, e
                ))
            })?;
        }

        let db = surrealdb::engine::any::connect(config.url.as_str())
            .await
            .map_err(|e| {
                StateError::Connection(format!("Failed to connect to {}: {}", config.url, e))
            })?;

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            if config.is_root {
                db.signin(Root {
                    username: username.as_str(),
                    password: password.as_str(),
                })
                .await
                .map_err(|e| StateError::Authentication(format!("root: {}", e)))?;
            } else {
                db.signin(Database {
                    namespace: config.namespace.as_str(),
                    database: config.database.as_str(),
                    username: username.as_str(),
                    password: password.as_str(),
                })
                .await
                .map_err(|e| StateError::Authentication(format!("database user: {}", e)))?;
            }
        }

        db.use_ns(config.namespace.as_str())
            .use_db(config.database.as_str())
            .await
            .map_err(|e| {
                StateError::Connection(format!("Failed to select namespace/database: {}", e))
            })?;

        migrations::init_schema(&db).await?;

        info!("Relationship store connected");
        Ok(Self { db })
    }

    /// Connect to a fresh in-memory database.
    pub async fn in_memory() -> Result<Self> {
        Self::connect(&StoreConfig::in_memory()).await
    }

    pub(crate) fn db(&self) -> &Surreal<Any> {
        &self.db
    }
}
