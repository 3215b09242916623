//! In-process queue provider

use crate::queue::error::QueueResult;
use crate::queue::task::QueueTask;
use crate::queue::traits::QueueProvider;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Non-durable FIFO; tasks are lost on restart
#[derive(Default)]
pub struct InMemoryQueue {
    tasks: Mutex<VecDeque<QueueTask>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueProvider for InMemoryQueue {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn push(&self, tasks: Vec<QueueTask>) -> QueueResult<usize> {
        let count = tasks.len();
        self.tasks.lock().extend(tasks);
        Ok(count)
    }

    async fn pop(&self, count: usize) -> QueueResult<Vec<QueueTask>> {
        let mut tasks = self.tasks.lock();
        let take = count.min(tasks.len());
        Ok(tasks.drain(..take).collect())
    }

    async fn len(&self) -> QueueResult<usize> {
        Ok(self.tasks.lock().len())
    }
}
