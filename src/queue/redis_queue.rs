//! Queue provider backed by a Redis list

use crate::queue::error::{QueueError, QueueResult};
use crate::queue::task::QueueTask;
use crate::queue::traits::QueueProvider;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Client;

/// Tasks are JSON strings appended with `RPUSH` and taken with `LPOP`
#[derive(Clone)]
pub struct RedisQueue {
    connection: ConnectionManager,
    key: String,
}

impl RedisQueue {
    pub async fn new(redis_url: &str, key: &str) -> QueueResult<Self> {
        let client = Client::open(redis_url).map_err(|e| {
            QueueError::ConnectionFailed(format!("Failed to create Redis client: {}", e))
        })?;

        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| QueueError::ConnectionFailed(format!("Failed to connect to Redis: {}", e)))?;

        let queue = Self {
            connection,
            key: key.to_string(),
        };
        queue.health_check().await?;

        tracing::info!(key = %key, "Initialized Redis task queue");
        Ok(queue)
    }
}

#[async_trait]
impl QueueProvider for RedisQueue {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn push(&self, tasks: Vec<QueueTask>) -> QueueResult<usize> {
        if tasks.is_empty() {
            return Ok(0);
        }
        let payloads = tasks
            .iter()
            .map(QueueTask::to_json)
            .collect::<QueueResult<Vec<String>>>()?;

        let mut conn = self.connection.clone();
        redis::cmd("RPUSH")
            .arg(&self.key)
            .arg(&payloads)
            .query_async::<_, i64>(&mut conn)
            .await?;
        Ok(payloads.len())
    }

    async fn pop(&self, count: usize) -> QueueResult<Vec<QueueTask>> {
        let mut conn = self.connection.clone();
        let raw: Option<Vec<String>> = redis::cmd("LPOP")
            .arg(&self.key)
            .arg(count)
            .query_async(&mut conn)
            .await?;

        let mut tasks = Vec::new();
        for payload in raw.unwrap_or_default() {
            match QueueTask::from_json(&payload) {
                Ok(task) => tasks.push(task),
                Err(e) => tracing::error!(error = %e, "Dropping undecodable task"),
            }
        }
        Ok(tasks)
    }

    async fn len(&self) -> QueueResult<usize> {
        let mut conn = self.connection.clone();
        let len: usize = redis::cmd("LLEN")
            .arg(&self.key)
            .query_async(&mut conn)
            .await?;
        Ok(len)
    }

    async fn health_check(&self) -> QueueResult<()> {
        let mut conn = self.connection.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| QueueError::ConnectionFailed(format!("Redis connection test failed: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ObjectType, TaskAction};

    const TEST_URL: &str = "redis://127.0.0.1:6379/15";

    async fn create_test_queue(key: &str) -> Option<RedisQueue> {
        let queue = RedisQueue::new(TEST_URL, key).await.ok()?;
        let mut conn = queue.connection.clone();
        redis::cmd("DEL")
            .arg(key)
            .query_async::<_, i64>(&mut conn)
            .await
            .ok()?;
        Some(queue)
    }

    #[tokio::test]
    async fn test_push_pop_order() {
        let Some(queue) = create_test_queue("forge-search:test:tasks").await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };

        let tasks: Vec<QueueTask> = (1..=3)
            .map(|i| QueueTask {
                object_type: ObjectType::Repository,
                action: TaskAction::Update,
                body: format!(r#"{{"objects":[{{"id":{}}}]}}"#, i),
            })
            .collect();
        queue.push(tasks.clone()).await.unwrap();
        assert_eq!(queue.len().await.unwrap(), 3);

        let popped = queue.pop(2).await.unwrap();
        assert_eq!(popped, tasks[..2].to_vec());
        assert_eq!(queue.pop(5).await.unwrap(), tasks[2..].to_vec());
    }
}
