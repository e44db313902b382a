//! SeaORM storage backend
//!
//! Supports SQLite, MySQL/MariaDB and PostgreSQL.

mod connection;
pub mod retry;

use sea_orm::{ConnectionTrait, DatabaseConnection};
use tracing::info;

use crate::config::DatabaseConfig;
use crate::errors::{EtuhintaError, Result};

pub use connection::{connect_generic, connect_sqlite, migrate_sqlite, run_migrations};

/// 从数据库 URL 推断数据库类型
pub fn infer_backend_from_url(database_url: &str) -> Result<String> {
    if database_url.starts_with("sqlite://")
        || database_url.ends_with(".db")
        || database_url.ends_with(".sqlite")
        || database_url == ":memory:"
    {
        Ok("sqlite".to_string())
    } else if database_url.starts_with("mysql://") || database_url.starts_with("mariadb://") {
        Ok("mysql".to_string())
    } else if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        Ok("postgres".to_string())
    } else {
        Err(EtuhintaError::database_config(format!(
            "Cannot infer database type from URL: {}. Supported: sqlite://, mysql://, mariadb://, postgres://",
            database_url
        )))
    }
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

/// SeaORM-based storage backend
#[derive(Clone)]
pub struct SeaOrmStorage {
    db: DatabaseConnection,
    backend_name: String,
    retry_config: retry::RetryConfig,
}

impl SeaOrmStorage {
    pub async fn new(
        database_url: &str,
        backend_name: &str,
        config: &DatabaseConfig,
    ) -> Result<Self> {
        if database_url.is_empty() {
            return Err(EtuhintaError::database_config("database_url is empty"));
        }

        let db = if backend_name != "sqlite" {
            let db = connect_generic(database_url, backend_name, config.pool_size).await?;
            run_migrations(&db).await?;
            db
        } else if is_in_memory(database_url) {
            // 内存库只存在于单条连接中，迁移与服务共用这一条
            let db = connect_sqlite(database_url, 1).await?;
            run_migrations(&db).await?;
            db
        } else {
            migrate_sqlite(database_url).await?;
            connect_sqlite(database_url, config.pool_size).await?
        };

        let storage = SeaOrmStorage {
            db,
            backend_name: backend_name.to_string(),
            retry_config: retry::RetryConfig::from(config),
        };

        info!(
            "{} storage initialized",
            storage.backend_name.to_uppercase()
        );
        Ok(storage)
    }

    /// 包装已有连接（连接方自行负责迁移）
    pub fn from_connection(db: DatabaseConnection, retry_config: retry::RetryConfig) -> Self {
        let backend_name = match db.get_database_backend() {
            sea_orm::DatabaseBackend::Sqlite => "sqlite",
            sea_orm::DatabaseBackend::MySql => "mysql",
            _ => "postgres",
        }
        .to_string();
        Self {
            db,
            backend_name,
            retry_config,
        }
    }

    pub fn get_db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn backend_name(&self) -> &str {
        &self.backend_name
    }

    pub fn retry_config(&self) -> retry::RetryConfig {
        self.retry_config
    }

    /// 连通性检查
    pub async fn ping(&self) -> Result<()> {
        self.db.ping().await.map_err(EtuhintaError::from)
    }
}
