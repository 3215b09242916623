//! Durable embedded queue provider backed by sled

use crate::queue::error::{QueueError, QueueResult};
use crate::queue::task::QueueTask;
use crate::queue::traits::QueueProvider;
use async_trait::async_trait;
use sled::Db;
use std::path::Path;
use std::sync::Arc;

/// FIFO keyed by monotonically increasing ids, survives restarts
#[derive(Clone)]
pub struct SledQueue {
    db: Arc<Db>,
    tasks_tree: sled::Tree,
}

impl SledQueue {
    /// Open (or create) the queue at the specified path
    pub fn new<P: AsRef<Path>>(path: P) -> QueueResult<Self> {
        let db = sled::open(path.as_ref()).map_err(|e| {
            QueueError::ConnectionFailed(format!("Failed to open queue database: {}", e))
        })?;
        let tasks_tree = db.open_tree("tasks")?;

        tracing::info!(
            path = %path.as_ref().display(),
            pending = tasks_tree.len(),
            "Initialized embedded task queue"
        );

        Ok(Self {
            db: Arc::new(db),
            tasks_tree,
        })
    }

    fn serialize_task(task: &QueueTask) -> QueueResult<Vec<u8>> {
        Ok(bincode::serialize(task)?)
    }

    fn deserialize_task(bytes: &[u8]) -> QueueResult<QueueTask> {
        Ok(bincode::deserialize(bytes)?)
    }
}

#[async_trait]
impl QueueProvider for SledQueue {
    fn name(&self) -> &'static str {
        "embed"
    }

    async fn push(&self, tasks: Vec<QueueTask>) -> QueueResult<usize> {
        let mut batch = sled::Batch::default();
        for task in &tasks {
            // Big-endian ids keep byte order equal to push order
            let key = self.db.generate_id()?.to_be_bytes();
            batch.insert(&key[..], Self::serialize_task(task)?);
        }
        self.tasks_tree.apply_batch(batch)?;
        self.tasks_tree.flush_async().await?;
        Ok(tasks.len())
    }

    async fn pop(&self, count: usize) -> QueueResult<Vec<QueueTask>> {
        let mut tasks = Vec::with_capacity(count);
        while tasks.len() < count {
            let Some((key, value)) = self.tasks_tree.pop_min()? else {
                break;
            };
            match Self::deserialize_task(&value) {
                Ok(task) => tasks.push(task),
                Err(e) => tracing::error!(
                    key = ?key,
                    error = %e,
                    "Dropping undecodable task"
                ),
            }
        }
        if !tasks.is_empty() {
            self.tasks_tree.flush_async().await?;
        }
        Ok(tasks)
    }

    async fn len(&self) -> QueueResult<usize> {
        Ok(self.tasks_tree.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ObjectType, TaskAction};
    use tempfile::TempDir;

    fn task(ty: ObjectType, id: i64) -> QueueTask {
        QueueTask {
            object_type: ty,
            action: TaskAction::Add,
            body: format!(r#"{{"objects":[{{"id":{}}}]}}"#, id),
        }
    }

    #[tokio::test]
    async fn test_tasks_survive_reopen_in_order() {
        let dir = TempDir::new().unwrap();
        {
            let queue = SledQueue::new(dir.path()).unwrap();
            let pushed: Vec<QueueTask> = (1..=12).map(|i| task(ObjectType::Code, i)).collect();
            assert_eq!(queue.push(pushed).await.unwrap(), 12);
        }

        let queue = SledQueue::new(dir.path()).unwrap();
        assert_eq!(queue.len().await.unwrap(), 12);

        let first = queue.pop(10).await.unwrap();
        assert_eq!(first.len(), 10);
        assert_eq!(first[0], task(ObjectType::Code, 1));
        assert_eq!(first[9], task(ObjectType::Code, 10));

        let rest = queue.pop(10).await.unwrap();
        assert_eq!(rest.len(), 2);
        assert_eq!(queue.len().await.unwrap(), 0);
    }
}
