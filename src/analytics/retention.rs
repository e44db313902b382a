//! 去重记录清理任务
//!
//! 去重只在当天有意义，过期的 `analytics_dedup` 行定期删除，
//! 防止表无限增长。汇总表与原始事件不清理。

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Days;
use tracing::{error, info};

use super::{DedupGuard, today};

pub struct DedupRetentionTask {
    guard: DedupGuard,
    /// 去重记录保留天数（至少 1）
    retention_days: u32,
}

impl DedupRetentionTask {
    pub fn new(guard: DedupGuard, retention_days: u32) -> Self {
        Self {
            guard,
            retention_days: retention_days.max(1),
        }
    }

    /// 执行一次清理，返回删除行数
    pub async fn run_cleanup(&self) -> anyhow::Result<u64> {
        let cutoff = today()
            .checked_sub_days(Days::new(u64::from(self.retention_days)))
            .ok_or_else(|| anyhow::anyhow!("Invalid retention window"))?;

        let deleted = self.guard.prune_before(cutoff).await?;
        info!(
            "Dedup cleanup completed: {} rows older than {} deleted",
            deleted, cutoff
        );
        Ok(deleted)
    }

    /// 启动后台清理任务
    pub fn spawn_background_task(self: Arc<Self>, interval_hours: u64) {
        tokio::spawn(async move {
            let interval = StdDuration::from_secs(interval_hours.max(1) * 60 * 60);

            // 首次运行延迟 5 分钟
            tokio::time::sleep(StdDuration::from_secs(300)).await;

            loop {
                if let Err(e) = self.run_cleanup().await {
                    error!("Dedup cleanup task failed: {}", e);
                }
                tokio::time::sleep(interval).await;
            }
        });

        info!(
            "Dedup cleanup background task started (interval: {} hours)",
            interval_hours
        );
    }
}
