//! Long-lived loop moving tasks from the queue into the indexes
//!
//! Each object type has a single worker fed by its own channel, so tasks of
//! one type run strictly one after another in queue order while different
//! types proceed in parallel.

use crate::config::IndexerConfig;
use crate::indexer::pipeline::IndexPipeline;
use crate::metrics::INDEX_METRICS;
use crate::models::ObjectType;
use crate::queue::{QueueProvider, QueueResult, QueueTask};
use crate::search::{SearchError, SearchResult};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

struct Job {
    task: QueueTask,
    reply: oneshot::Sender<SearchResult<usize>>,
}

/// Outcome of one consumer cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub fetched: usize,
    pub applied: usize,
    pub failed: usize,
}

/// Pops task batches and dispatches them to per-type workers
pub struct TaskConsumer {
    queue: Arc<dyn QueueProvider>,
    workers: HashMap<ObjectType, mpsc::Sender<Job>>,
    worker_handles: Vec<JoinHandle<()>>,
    batch_fetch_count: usize,
    no_task_interval: Duration,
}

impl TaskConsumer {
    /// Start one worker per object type
    pub fn new(
        queue: Arc<dyn QueueProvider>,
        pipeline: IndexPipeline,
        config: &IndexerConfig,
    ) -> Self {
        let batch_fetch_count = config.batch_fetch_count.max(1);
        let mut workers = HashMap::new();
        let mut worker_handles = Vec::new();

        for ty in ObjectType::ALL {
            let (tx, rx) = mpsc::channel(batch_fetch_count);
            worker_handles.push(tokio::spawn(Self::run_worker(ty, rx, pipeline.clone())));
            workers.insert(ty, tx);
        }

        Self {
            queue,
            workers,
            worker_handles,
            batch_fetch_count,
            no_task_interval: Duration::from_millis(config.no_task_interval_ms),
        }
    }

    async fn run_worker(ty: ObjectType, mut rx: mpsc::Receiver<Job>, pipeline: IndexPipeline) {
        tracing::debug!(object_type = %ty, "Index worker started");

        while let Some(job) = rx.recv().await {
            let pipeline = pipeline.clone();
            let task = job.task;
            let result = tokio::task::spawn_blocking(move || pipeline.apply(&task))
                .await
                .unwrap_or_else(|e| {
                    Err(SearchError::IndexingFailed(format!("Index worker panicked: {}", e)))
                });
            // The dispatcher may have stopped waiting; the task is applied regardless
            let _ = job.reply.send(result);
        }

        tracing::debug!(object_type = %ty, "Index worker stopped");
    }

    /// Pop one batch, dispatch it and wait until every task of it finished
    pub async fn run_once(&self) -> QueueResult<BatchReport> {
        let tasks = self.queue.pop(self.batch_fetch_count).await?;
        let mut report = BatchReport {
            fetched: tasks.len(),
            ..Default::default()
        };
        if tasks.is_empty() {
            return Ok(report);
        }

        let mut pending = Vec::with_capacity(tasks.len());
        for task in tasks {
            let ty = task.object_type;
            let Some(worker) = self.workers.get(&ty) else {
                report.failed += 1;
                continue;
            };
            let (reply, rx) = oneshot::channel();
            if worker.send(Job { task, reply }).await.is_err() {
                tracing::error!(object_type = %ty, "Index worker is gone, task dropped");
                report.failed += 1;
                continue;
            }
            pending.push(rx);
        }

        for outcome in join_all(pending).await {
            match outcome {
                Ok(Ok(_)) => report.applied += 1,
                // Failures are logged by the pipeline; the task is not retried
                Ok(Err(_)) | Err(_) => report.failed += 1,
            }
        }

        Ok(report)
    }

    /// Run until `shutdown` flips to true; the batch in flight always completes
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            provider = self.queue.name(),
            batch = self.batch_fetch_count,
            "🚀 Indexer started"
        );

        while !*shutdown.borrow() {
            let fetched = match self.run_once().await {
                Ok(report) => {
                    if report.fetched > 0 {
                        tracing::info!(
                            fetched = report.fetched,
                            applied = report.applied,
                            failed = report.failed,
                            "Batch processed"
                        );
                    }
                    report.fetched
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to pop tasks");
                    0
                }
            };

            if let Ok(len) = self.queue.len().await {
                INDEX_METRICS.queue_length.set(len as i64);
            }

            if fetched < self.batch_fetch_count {
                tokio::select! {
                    _ = tokio::time::sleep(self.no_task_interval) => {}
                    _ = shutdown.changed() => {}
                }
            }
        }

        self.shutdown().await;
    }

    /// Close the worker channels and wait for the workers to drain
    pub async fn shutdown(self) {
        drop(self.workers);
        for handle in self.worker_handles {
            let _ = handle.await;
        }
        tracing::info!("Indexer stopped");
    }
}
