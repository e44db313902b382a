//! 批量写入 worker 池
//!
//! 有界队列 + 固定数量 worker。`submit` 从不阻塞：队列满时直接拒绝新批次，
//! 调用方请求不等待汇总完成，worker 的失败也不会回传给提交者。

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use arc_swap::ArcSwapOption;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::metrics_core::MetricsRecorder;

use super::{BatchIngestor, BatchReport, NewEvent};

/// 批量事件的落地目标
#[async_trait::async_trait]
pub trait BatchSink: Send + Sync {
    async fn ingest(&self, events: Vec<NewEvent>) -> anyhow::Result<BatchReport>;
}

#[async_trait::async_trait]
impl BatchSink for BatchIngestor {
    async fn ingest(&self, events: Vec<NewEvent>) -> anyhow::Result<BatchReport> {
        Ok(self.ingest_batch(&events).await?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    /// 队列已满，批次被丢弃
    QueueFull,
    /// 池已关闭
    Closed,
}

impl SubmitError {
    pub fn reason(&self) -> &'static str {
        match self {
            SubmitError::QueueFull => "queue_full",
            SubmitError::Closed => "closed",
        }
    }
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::QueueFull => write!(f, "Ingest queue is full"),
            SubmitError::Closed => write!(f, "Ingest queue is closed"),
        }
    }
}

impl std::error::Error for SubmitError {}

type Batch = Vec<NewEvent>;

pub struct IngestWorkerPool {
    sender: ArcSwapOption<mpsc::Sender<Batch>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    depth: Arc<AtomicI64>,
    metrics: Arc<dyn MetricsRecorder>,
}

impl IngestWorkerPool {
    /// 启动 worker（需在 tokio runtime 内调用）
    pub fn start(
        sink: Arc<dyn BatchSink>,
        workers: usize,
        capacity: usize,
        metrics: Arc<dyn MetricsRecorder>,
    ) -> Self {
        let workers = workers.max(1);
        let (tx, rx) = mpsc::channel::<Batch>(capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let depth = Arc::new(AtomicI64::new(0));

        let handles = (0..workers)
            .map(|id| {
                tokio::spawn(run_worker(
                    id,
                    rx.clone(),
                    sink.clone(),
                    depth.clone(),
                    metrics.clone(),
                ))
            })
            .collect();

        info!(
            "Ingest worker pool started: {} workers, queue capacity {}",
            workers, capacity
        );

        Self {
            sender: ArcSwapOption::from_pointee(tx),
            handles: Mutex::new(handles),
            depth,
            metrics,
        }
    }

    /// 提交一批事件，立即返回
    pub fn submit(&self, events: Vec<NewEvent>) -> Result<(), SubmitError> {
        let guard = self.sender.load();
        let Some(tx) = guard.as_ref() else {
            self.metrics.inc_ingest_rejected(SubmitError::Closed.reason());
            return Err(SubmitError::Closed);
        };

        let size = events.len();
        // 先计数再发送，保证 worker 的递减不会先于递增
        let depth = self.depth.fetch_add(1, Ordering::AcqRel) + 1;

        match tx.try_send(events) {
            Ok(()) => {
                self.metrics.set_ingest_queue_depth(depth);
                debug!("Queued batch of {} events (depth {})", size, depth);
                Ok(())
            }
            Err(e) => {
                let depth = self.depth.fetch_sub(1, Ordering::AcqRel) - 1;
                self.metrics.set_ingest_queue_depth(depth);

                let err = match e {
                    mpsc::error::TrySendError::Full(_) => SubmitError::QueueFull,
                    mpsc::error::TrySendError::Closed(_) => SubmitError::Closed,
                };
                warn!("Rejected batch of {} events: {}", size, err);
                self.metrics.inc_ingest_rejected(err.reason());
                Err(err)
            }
        }
    }

    /// 当前排队中的批次数
    pub fn depth(&self) -> i64 {
        self.depth.load(Ordering::Acquire)
    }

    /// 关闭队列并等待 worker 处理完剩余批次
    pub async fn shutdown(&self) {
        self.sender.store(None);

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.handles.lock().await);
        if handles.is_empty() {
            return;
        }

        info!("Draining ingest queue ({} pending batches)", self.depth());
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Ingest worker terminated abnormally: {}", e);
            }
        }
        info!("Ingest worker pool stopped");
    }
}

async fn run_worker(
    id: usize,
    rx: Arc<Mutex<mpsc::Receiver<Batch>>>,
    sink: Arc<dyn BatchSink>,
    depth: Arc<AtomicI64>,
    metrics: Arc<dyn MetricsRecorder>,
) {
    loop {
        let next = {
            let mut rx = rx.lock().await;
            rx.recv().await
        };
        let Some(batch) = next else {
            break;
        };

        let remaining = depth.fetch_sub(1, Ordering::AcqRel) - 1;
        metrics.set_ingest_queue_depth(remaining);

        let size = batch.len();
        if let Err(e) = sink.ingest(batch).await {
            warn!("Ingest worker {} failed to process {} events: {}", id, size, e);
            metrics.inc_analytics_failure("batch", "ingest");
        }
    }
    debug!("Ingest worker {} exited", id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics_core::InMemoryMetrics;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    struct CountingSink {
        events: AtomicUsize,
        gate: Option<Arc<Notify>>,
    }

    #[async_trait::async_trait]
    impl BatchSink for CountingSink {
        async fn ingest(&self, events: Vec<NewEvent>) -> anyhow::Result<BatchReport> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.events.fetch_add(events.len(), Ordering::SeqCst);
            Ok(BatchReport {
                events_stored: events.len(),
                ..Default::default()
            })
        }
    }

    fn batch(n: usize) -> Vec<NewEvent> {
        (0..n).map(|_| NewEvent::new("view").with_offer(1)).collect()
    }

    #[tokio::test]
    async fn test_pool_drains_on_shutdown() {
        let sink = Arc::new(CountingSink {
            events: AtomicUsize::new(0),
            gate: None,
        });
        let metrics = InMemoryMetrics::arc();
        let pool = IngestWorkerPool::start(sink.clone(), 2, 16, metrics.clone());

        for _ in 0..5 {
            pool.submit(batch(3)).unwrap();
        }
        pool.shutdown().await;

        assert_eq!(sink.events.load(Ordering::SeqCst), 15);
        assert_eq!(pool.depth(), 0);
        assert_eq!(pool.submit(batch(1)), Err(SubmitError::Closed));
    }

    #[tokio::test]
    async fn test_pool_rejects_when_full() {
        let gate = Arc::new(Notify::new());
        let sink = Arc::new(CountingSink {
            events: AtomicUsize::new(0),
            gate: Some(gate.clone()),
        });
        let metrics = InMemoryMetrics::arc();
        let pool = IngestWorkerPool::start(sink.clone(), 1, 1, metrics.clone());

        // 第一批被 worker 取走并阻塞在 gate 上，第二批占满队列
        pool.submit(batch(1)).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        pool.submit(batch(1)).unwrap();

        assert_eq!(pool.submit(batch(1)), Err(SubmitError::QueueFull));
        assert_eq!(metrics.counter("ingest_rejected{reason=queue_full}"), 1);

        gate.notify_one();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        gate.notify_one();
        pool.shutdown().await;

        assert_eq!(sink.events.load(Ordering::SeqCst), 2);
    }
}
