//! 数据库写入重试
//!
//! 汇总与批量写入遇到暂时性错误时整体重试（事务从头开始）。
//! 错误先归类，再决定是否等待、等待多久。

use std::future::Future;
use std::time::Duration;

use rand::RngExt;
use sea_orm::{DbErr, error::RuntimeErr};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::DatabaseConfig;

/// 数据库错误的重试类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transience {
    /// 锁竞争：SQLite busy/locked、MySQL 死锁与锁等待、PostgreSQL 序列化失败
    Contention,
    /// 连接池取连接失败或连接中断
    Connection,
    /// 连接缓存的 schema 已过期（SQLITE_SCHEMA），重新准备语句即可
    StaleSchema,
    /// 重试无意义
    Permanent,
}

impl Transience {
    pub fn is_retryable(self) -> bool {
        self != Transience::Permanent
    }

    fn as_str(self) -> &'static str {
        match self {
            Transience::Contention => "contention",
            Transience::Connection => "connection",
            Transience::StaleSchema => "stale_schema",
            Transience::Permanent => "permanent",
        }
    }
}

/// 对数据库错误归类
pub fn classify(err: &DbErr) -> Transience {
    match err {
        DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => Transience::Connection,
        DbErr::Exec(runtime) | DbErr::Query(runtime) => classify_runtime(runtime),
        _ => Transience::Permanent,
    }
}

pub fn is_retryable_error(err: &DbErr) -> bool {
    classify(err).is_retryable()
}

fn classify_runtime(err: &RuntimeErr) -> Transience {
    match err {
        RuntimeErr::SqlxError(sqlx_err) => {
            use std::ops::Deref;
            let code = sqlx_err
                .deref()
                .as_database_error()
                .and_then(|db_err| db_err.code().map(|c| c.into_owned()));
            match code.as_deref().and_then(classify_code) {
                Some(class) => class,
                None => classify_message(&sqlx_err.to_string()),
            }
        }
        RuntimeErr::Internal(msg) => classify_message(msg),
        #[allow(unreachable_patterns)]
        _ => Transience::Permanent,
    }
}

/// 按驱动错误码归类；未知码返回 None，交给消息匹配
fn classify_code(code: &str) -> Option<Transience> {
    match code {
        // MySQL: 死锁、锁等待超时
        "1213" | "1205" => Some(Transience::Contention),
        // PostgreSQL: serialization_failure、deadlock_detected
        "40001" | "40P01" => Some(Transience::Contention),
        _ => {
            // SQLite 扩展码的低 8 位是主码（517 = BUSY_SNAPSHOT 等）
            let primary = code.parse::<i32>().ok()? & 0xff;
            match primary {
                5 | 6 => Some(Transience::Contention),
                17 => Some(Transience::StaleSchema),
                _ => None,
            }
        }
    }
}

fn classify_message(message: &str) -> Transience {
    let message = message.to_lowercase();
    if message.contains("schema has changed") {
        Transience::StaleSchema
    } else if message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("deadlock")
        || message.contains("lock wait timeout")
        || message.contains("serialization failure")
    {
        Transience::Contention
    } else {
        Transience::Permanent
    }
}

/// 重试参数，来自 `database.retry_*`
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl From<&DatabaseConfig> for RetryConfig {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            max_retries: config.retry_count,
            base_delay_ms: config.retry_base_delay_ms,
            max_delay_ms: config.retry_max_delay_ms,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

impl RetryConfig {
    /// 第 `attempt` 次重试前的等待
    ///
    /// schema 过期不需要等待；其余类别指数退避并附加最多 25% 抖动。
    fn delay_for(&self, attempt: u32, class: Transience) -> Duration {
        if class == Transience::StaleSchema {
            return Duration::ZERO;
        }
        let exp = self
            .base_delay_ms
            .saturating_mul(1u64 << attempt.saturating_sub(1).min(20));
        let capped = exp.min(self.max_delay_ms);
        let jitter = rand::rng().random_range(0..=capped / 4);
        Duration::from_millis(capped + jitter)
    }
}

/// 执行写入操作，暂时性错误时按配置重试
///
/// `operation` 每次调用都必须重新开始完整的工作单元（例如开启新事务）。
pub async fn with_retry<T, F, Fut>(
    operation_name: &str,
    config: RetryConfig,
    mut operation: F,
) -> Result<T, DbErr>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DbErr>>,
{
    let mut attempt = 0;
    loop {
        let err = match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!("{} succeeded after {} retries", operation_name, attempt);
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        let class = classify(&err);
        if !class.is_retryable() || attempt >= config.max_retries {
            debug!(
                "{} gave up after {} retries ({}): {}",
                operation_name,
                attempt,
                class.as_str(),
                err
            );
            return Err(err);
        }

        attempt += 1;
        let delay = config.delay_for(attempt, class);
        warn!(
            "{} hit {} error (retry {}/{}), waiting {:?}: {}",
            operation_name,
            class.as_str(),
            attempt,
            config.max_retries,
            delay,
            err
        );
        sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn exec_err(msg: &str) -> DbErr {
        DbErr::Exec(RuntimeErr::Internal(msg.to_string()))
    }

    fn fast() -> RetryConfig {
        RetryConfig {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 5,
        }
    }

    #[test]
    fn test_classify_codes() {
        assert_eq!(classify_code("5"), Some(Transience::Contention));
        assert_eq!(classify_code("517"), Some(Transience::Contention));
        assert_eq!(classify_code("262"), Some(Transience::Contention));
        assert_eq!(classify_code("17"), Some(Transience::StaleSchema));
        assert_eq!(classify_code("40P01"), Some(Transience::Contention));
        assert_eq!(classify_code("1213"), Some(Transience::Contention));
        // UNIQUE 约束失败（2067）不可重试
        assert_eq!(classify_code("2067"), None);
        assert_eq!(classify_code("23505"), None);
    }

    #[test]
    fn test_classify_messages() {
        assert_eq!(
            classify(&exec_err("database schema has changed")),
            Transience::StaleSchema
        );
        assert_eq!(
            classify(&exec_err("database is locked")),
            Transience::Contention
        );
        assert_eq!(
            classify(&exec_err("UNIQUE constraint failed: analytics_dedup.offer_id")),
            Transience::Permanent
        );
        assert_eq!(
            classify(&DbErr::ConnectionAcquire(
                sea_orm::error::ConnAcquireErr::Timeout
            )),
            Transience::Connection
        );
        assert!(!is_retryable_error(&DbErr::RecordNotInserted));
    }

    #[test]
    fn test_stale_schema_retries_without_waiting() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_for(1, Transience::StaleSchema), Duration::ZERO);

        let d = config.delay_for(3, Transience::Contention);
        assert!(d >= Duration::from_millis(400) && d <= Duration::from_millis(500));
        let d = config.delay_for(30, Transience::Contention);
        assert!(d <= Duration::from_millis(2500));
    }

    #[tokio::test]
    async fn test_locked_rollup_succeeds_on_retry() {
        let calls = AtomicU32::new(0);
        let result = with_retry("rollup_view", fast(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(exec_err("database is locked"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry("ingest_batch", fast(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(exec_err("deadlock detected")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry("rollup_click", fast(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(exec_err(
                    "ON CONFLICT clause does not match any PRIMARY KEY or UNIQUE constraint",
                ))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
