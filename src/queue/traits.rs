//! Queue provider abstraction

use crate::queue::error::QueueResult;
use crate::queue::task::QueueTask;
use async_trait::async_trait;

/// Durable FIFO of index tasks
///
/// Providers deliver tasks in push order; the consumer relies on that for
/// per-type ordering.
#[async_trait]
pub trait QueueProvider: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &'static str;

    /// Append tasks in order
    async fn push(&self, tasks: Vec<QueueTask>) -> QueueResult<usize>;

    /// Remove and return up to `count` tasks from the head
    async fn pop(&self, count: usize) -> QueueResult<Vec<QueueTask>>;

    /// Number of pending tasks
    async fn len(&self) -> QueueResult<usize>;

    /// Check that the backend is reachable
    async fn health_check(&self) -> QueueResult<()> {
        Ok(())
    }
}
