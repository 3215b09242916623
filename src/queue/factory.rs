use crate::config::{QueueConfig, QueueProviderKind};
use crate::queue::error::{QueueError, QueueResult};
use crate::queue::{InMemoryQueue, QueueProvider, RedisQueue, SledQueue};
use std::sync::Arc;

/// Create a queue provider based on configuration
pub async fn create_queue(config: &QueueConfig) -> QueueResult<Arc<dyn QueueProvider>> {
    match config.provider {
        QueueProviderKind::Embed => {
            tracing::info!(path = ?config.path, "Initializing embedded queue provider");
            let queue = SledQueue::new(&config.path)?;
            Ok(Arc::new(queue))
        }

        QueueProviderKind::Redis => {
            let redis_url = config.redis_url.as_ref().ok_or_else(|| {
                QueueError::ConfigurationError(
                    "Redis provider requires 'redis_url' configuration".to_string(),
                )
            })?;

            tracing::info!(key = %config.redis_key, "Initializing Redis queue provider");
            let queue = RedisQueue::new(redis_url, &config.redis_key).await?;
            Ok(Arc::new(queue))
        }

        QueueProviderKind::Memory => {
            tracing::warn!("Using in-memory queue provider, pending tasks are lost on restart");
            Ok(Arc::new(InMemoryQueue::new()))
        }
    }
}
