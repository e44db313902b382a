//! 建立连接与建表
//!
//! SQLite 连接会缓存 schema：池中连接若在迁移进行期间打开，可能看不到
//! 随后建立的唯一索引，`ON CONFLICT (...)` 会在准备语句时失败。
//! 因此 SQLite 先用一条独占连接完成迁移并关闭，再打开服务使用的连接池。

use std::str::FromStr;
use std::time::Duration;

use sea_orm::sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sea_orm::{ConnectOptions, Database, DatabaseConnection, SqlxSqliteConnector};
use tracing::{debug, info};

use crate::errors::{EtuhintaError, Result};
use migration::{Migrator, MigratorTrait};

const SQLITE_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

fn sqlite_options(database_url: &str) -> Result<SqliteConnectOptions> {
    Ok(SqliteConnectOptions::from_str(database_url)
        .map_err(|e| EtuhintaError::database_config(format!("Invalid SQLite URL: {}", e)))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(SQLITE_BUSY_TIMEOUT))
}

/// 在独占连接上完成 SQLite 迁移，返回前关闭该连接
pub async fn migrate_sqlite(database_url: &str) -> Result<()> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(sqlite_options(database_url)?)
        .await
        .map_err(|e| {
            EtuhintaError::database_connection(format!("Cannot open SQLite for migration: {}", e))
        })?;

    let db = SqlxSqliteConnector::from_sqlx_sqlite_pool(pool);
    run_migrations(&db).await?;
    db.close()
        .await
        .map_err(|e| EtuhintaError::database_connection(format!("Cannot close migration connection: {}", e)))?;

    debug!("SQLite migration connection closed");
    Ok(())
}

/// 打开 SQLite 连接池（schema 需已就绪，见 `migrate_sqlite`）
pub async fn connect_sqlite(database_url: &str, pool_size: u32) -> Result<DatabaseConnection> {
    let pool = SqlitePoolOptions::new()
        .max_connections(pool_size.max(1))
        .connect_with(sqlite_options(database_url)?)
        .await
        .map_err(|e| {
            EtuhintaError::database_connection(format!("Cannot connect to SQLite database: {}", e))
        })?;

    Ok(SqlxSqliteConnector::from_sqlx_sqlite_pool(pool))
}

/// 连接 MySQL/MariaDB 或 PostgreSQL
pub async fn connect_generic(
    database_url: &str,
    backend_name: &str,
    pool_size: u32,
) -> Result<DatabaseConnection> {
    let mut opt = ConnectOptions::new(database_url.to_owned());
    opt.max_connections(pool_size)
        .min_connections(pool_size.min(5))
        .connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(300))
        .max_lifetime(Duration::from_secs(3600))
        .sqlx_logging(false);

    Database::connect(opt).await.map_err(|e| {
        EtuhintaError::database_connection(format!(
            "Cannot connect to {} database: {}",
            backend_name.to_uppercase(),
            e
        ))
    })
}

pub async fn run_migrations(db: &DatabaseConnection) -> Result<()> {
    Migrator::up(db, None)
        .await
        .map_err(|e| EtuhintaError::database_operation(format!("Migration failed: {}", e)))?;

    info!("Database migrations completed");
    Ok(())
}
