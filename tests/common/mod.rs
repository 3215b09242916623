//! Shared fixtures for integration tests
//!
//! Every environment owns a temporary storage root and an in-memory queue.
//! Tasks are applied explicitly with [`TestEnv::drain`] instead of a
//! background indexer loop so assertions never race the consumer.

#![allow(dead_code)]

use forge_search::{
    api::AppState,
    config::{Config, StorageConfig},
    indexer::{IndexPipeline, TaskConsumer},
    models::{ObjectType, TaskAction},
    queue::{InMemoryQueue, QueueProvider, QueueTask, TaskBody},
    search::{QueryBuilder, ResultPage, SearchRequest, StorageManager},
};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

pub const ADMIN_TOKEN: &str = "admin-secret";
pub const GITLAB_TOKEN: &str = "gitlab-secret";
pub const GITEE_TOKEN: &str = "gitee-secret";

pub fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.storage = StorageConfig {
        path: root.to_path_buf(),
        writer_heap_size: 15_000_000,
        search_threads: 1,
    };
    config.indexer.batch_fetch_count = 8;
    config.indexer.no_task_interval_ms = 10;
    config.webhooks.admin_token = Some(ADMIN_TOKEN.to_string());
    config.webhooks.gitlab_secret_token = GITLAB_TOKEN.to_string();
    config.webhooks.gitee_secret_token = GITEE_TOKEN.to_string();
    config
}

pub struct TestEnv {
    pub dir: TempDir,
    pub state: AppState,
    pub queue: Arc<InMemoryQueue>,
    pub consumer: TaskConsumer,
}

impl TestEnv {
    /// Must be called from within a tokio runtime
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(customize: impl FnOnce(&mut Config)) -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(dir.path());
        customize(&mut config);

        let storage = Arc::new(StorageManager::new(&config.storage).unwrap());
        let queue = Arc::new(InMemoryQueue::new());
        let consumer = TaskConsumer::new(
            queue.clone(),
            IndexPipeline::new(storage.clone()),
            &config.indexer,
        );
        let state = AppState::new(config, storage, queue.clone());

        Self {
            dir,
            state,
            queue,
            consumer,
        }
    }

    pub fn pipeline(&self) -> IndexPipeline {
        IndexPipeline::new(self.state.storage.clone())
    }

    pub async fn enqueue(&self, ty: ObjectType, action: TaskAction, objects: Vec<Value>) {
        let task = QueueTask::new(ty, action, &TaskBody { objects }).unwrap();
        self.queue.push(vec![task]).await.unwrap();
    }

    /// Apply every queued task
    pub async fn drain(&self) {
        loop {
            let report = self.consumer.run_once().await.unwrap();
            assert_eq!(report.failed, 0, "tasks failed while draining");
            if report.fetched == 0 {
                break;
            }
        }
    }

    pub async fn search(&self, request: SearchRequest) -> ResultPage {
        self.state.executor.search(request).await.unwrap()
    }

    pub async fn search_key(&self, ty: ObjectType, key: &str) -> ResultPage {
        self.search(QueryBuilder::new(ty).with_search_key(key).build())
            .await
    }

    pub fn document_count(&self, ty: ObjectType) -> u64 {
        self.state.storage.stats(ty).unwrap().total_documents
    }
}

pub fn issue(id: i64, title: &str, tags: &[&str], state: &str) -> Value {
    json!({
        "id": id,
        "repository": {"id": 1, "name": "acme/api"},
        "number": id,
        "title": title,
        "tags": tags,
        "state": state,
        "created_at": 1_700_000_000_000i64 + id,
        "updated_at": 1_700_000_000_000i64 + id
    })
}

pub fn repository(id: i64, owner: &str, name: &str, description: &str) -> Value {
    json!({
        "id": id,
        "owner": owner,
        "name": name,
        "description": description,
        "language": "Rust",
        "license": "MIT",
        "stars": id * 10
    })
}

/// Ids of the hits of a page, in rank order
pub fn ids(page: &ResultPage) -> Vec<i64> {
    page.objects
        .iter()
        .filter_map(|o| o.get("id").and_then(Value::as_i64))
        .collect()
}
