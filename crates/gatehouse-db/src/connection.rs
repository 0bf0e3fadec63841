//! SurrealDB connection management.

use surrealdb::Surreal;
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use tracing::info;

use crate::error::DbError;

/// Configuration for connecting to SurrealDB.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// WebSocket address (e.g., `127.0.0.1:8000`).
    pub url: String,
    pub namespace: String,
    pub database: String,
    /// Root username for authentication.
    pub username: String,
    /// Root password for authentication.
    pub password: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "127.0.0.1:8000".into(),
            namespace: "gatehouse".into(),
            database: "main".into(),
            username: "root".into(),
            password: "root".into(),
        }
    }
}

/// Shared SurrealDB handle. Clones share one connection and carry no
/// tenant state.
#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Client>,
}

impl DbManager {
    /// Connect, authenticate as root, and select the configured
    /// namespace and database. An empty namespace or database is
    /// rejected before any network traffic.
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        if config.namespace.trim().is_empty() || config.database.trim().is_empty() {
            return Err(DbError::Query(
                "namespace and database must not be empty".into(),
            ));
        }

        info!(
            url = %config.url,
            namespace = %config.namespace,
            database = %config.database,
            "Connecting to SurrealDB"
        );

        let db = Surreal::new::<Ws>(&config.url).await?;

        db.signin(Root {
            username: config.username.clone(),
            password: config.password.clone(),
        })
        .await?;

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;

        info!(namespace = %config.namespace, "SurrealDB session ready");

        Ok(Self { db })
    }

    pub fn client(&self) -> &Surreal<Client> {
        &self.db
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_local_gatehouse_namespace() {
        let config = DbConfig::default();
        assert_eq!(config.url, "127.0.0.1:8000");
        assert_eq!(config.namespace, "gatehouse");
        assert_eq!(config.database, "main");
    }

    #[tokio::test]
    async fn blank_namespace_is_rejected_without_connecting() {
        let config = DbConfig {
            namespace: "  ".into(),
            ..DbConfig::default()
        };
        let err = DbManager::connect(&config).await.err();
        assert!(matches!(err, Some(DbError::Query(_))));
    }
}
