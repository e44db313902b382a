//! Storage layer
//!
//! SeaORM connection management, migrations and the retry helper shared by
//! the analytics and chat services.

use std::sync::Arc;

use crate::config::DatabaseConfig;
use crate::errors::Result;

pub mod backend;

pub use backend::{SeaOrmStorage, infer_backend_from_url};

pub struct StorageFactory;

impl StorageFactory {
    /// 根据配置创建存储（自动推断数据库类型并执行迁移）
    pub async fn create(config: &DatabaseConfig) -> Result<Arc<SeaOrmStorage>> {
        let backend_type = infer_backend_from_url(&config.database_url)?;
        let storage = SeaOrmStorage::new(&config.database_url, &backend_type, config).await?;
        Ok(Arc::new(storage))
    }
}
