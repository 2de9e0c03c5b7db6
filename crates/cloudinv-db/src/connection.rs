//! SurrealDB connection management.
//!
//! The inventory store connects through SurrealDB's `any` engine so the
//! same binary can run against a remote server (`ws://`, `wss://`) or an
//! embedded in-memory instance (`mem://`) for sandbox deployments.

use surrealdb::Surreal;
use surrealdb::engine::any::{self, Any};
use surrealdb::opt::auth::Root;
use tracing::info;

use crate::error::DbError;
use crate::schema::run_migrations;

/// Configuration for connecting to SurrealDB.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Endpoint URL (e.g., `ws://127.0.0.1:8000` or `mem://`).
    pub url: String,
    /// SurrealDB namespace.
    pub namespace: String,
    /// SurrealDB database name.
    pub database: String,
    /// Root credentials. Ignored for embedded engines.
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8000".into(),
            namespace: "cloudinv".into(),
            database: "inventory".into(),
            username: Some("root".into()),
            password: Some("root".into()),
        }
    }
}

impl DbConfig {
    fn is_embedded(&self) -> bool {
        self.url.starts_with("mem://")
    }
}

/// Manages a connection to SurrealDB.
#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Any>,
}

impl DbManager {
    /// Connect, authenticate (remote engines only), select the
    /// namespace and database, and apply pending migrations.
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        info!(
            url = %config.url,
            namespace = %config.namespace,
            database = %config.database,
            "Connecting to inventory store"
        );

        let db = any::connect(config.url.as_str()).await?;

        if !config.is_embedded() {
            if let (Some(username), Some(password)) = (&config.username, &config.password) {
                db.signin(Root {
                    username: username.clone(),
                    password: password.clone(),
                })
                .await?;
            }
        }

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;

        run_migrations(&db).await?;

        info!("Inventory store ready");

        Ok(Self { db })
    }

    /// Returns a handle to the underlying SurrealDB client. Cloning the
    /// handle is cheap and shares the connection.
    pub fn client(&self) -> Surreal<Any> {
        self.db.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mem_urls_skip_signin() {
        let config = DbConfig {
            url: "mem://".into(),
            ..Default::default()
        };
        assert!(config.is_embedded());
        assert!(!DbConfig::default().is_embedded());
    }
}
