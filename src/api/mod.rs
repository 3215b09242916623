pub mod context;
pub mod handlers;
pub mod registry;
pub mod routes;
pub mod webhooks;

pub use context::RequestContext;
pub use registry::{ActionKey, ActionRegistry, IntoAction, DEFAULT_GROUP, DEFAULT_OPERATION};
pub use routes::*;

use crate::config::Config;
use crate::error::Result;
use crate::queue::{create_queue, QueueProvider};
use crate::search::{SearchExecutor, StorageManager};
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub storage: Arc<StorageManager>,
    pub executor: SearchExecutor,
    pub queue: Arc<dyn QueueProvider>,
}

impl AppState {
    pub fn new(config: Config, storage: Arc<StorageManager>, queue: Arc<dyn QueueProvider>) -> Self {
        let executor = SearchExecutor::new(storage.clone(), &config.search);
        Self {
            config: Arc::new(config),
            storage,
            executor,
            queue,
        }
    }

    /// Open storage and the configured queue provider
    pub async fn from_config(config: Config) -> Result<Self> {
        let storage = Arc::new(StorageManager::new(&config.storage)?);
        let queue = create_queue(&config.queue).await?;
        Ok(Self::new(config, storage, queue))
    }
}
