use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP gateway configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Index storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Query execution configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Task queue configuration
    #[serde(default)]
    pub queue: QueueConfig,

    /// Queue consumer configuration
    #[serde(default)]
    pub indexer: IndexerConfig,

    /// Shared secrets for webhook and admin endpoints
    #[serde(default)]
    pub webhooks: WebhookConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/local.toml".to_string());

        config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (prefix: FORGE_SEARCH_)
            .add_source(
                config::Environment::with_prefix("FORGE_SEARCH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Reject settings that would leave the process half-configured
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.storage.search_threads == 0 {
            return Err(config::ConfigError::Message(
                "storage.search_threads must be at least 1".to_string(),
            ));
        }
        if self.storage.writer_heap_size < 15_000_000 {
            return Err(config::ConfigError::Message(
                "storage.writer_heap_size must be at least 15000000 bytes".to_string(),
            ));
        }
        if self.search.default_page_size == 0 || self.search.max_page_size == 0 {
            return Err(config::ConfigError::Message(
                "search page sizes must be positive".to_string(),
            ));
        }
        if self.indexer.batch_fetch_count == 0 {
            return Err(config::ConfigError::Message(
                "indexer.batch_fetch_count must be at least 1".to_string(),
            ));
        }
        if self.queue.provider == QueueProviderKind::Redis && self.queue.redis_url.is_none() {
            return Err(config::ConfigError::Message(
                "queue.redis_url is required for the redis provider".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory holding one namespace per object type
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,

    /// Memory budget of each index writer (bytes)
    #[serde(default = "default_writer_heap_size")]
    pub writer_heap_size: usize,

    /// Threads used to search segments of one index in parallel
    #[serde(default = "default_search_threads")]
    pub search_threads: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            writer_heap_size: default_writer_heap_size(),
            search_threads: default_search_threads(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Hits reachable through offset pagination
    #[serde(default = "default_max_result_window")]
    pub max_result_window: usize,

    #[serde(default = "default_page_size")]
    pub default_page_size: usize,

    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,

    /// Cached query results; 0 disables the cache
    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: u64,

    /// Memory ceiling of the query cache (bytes)
    #[serde(default = "default_cache_max_bytes")]
    pub cache_max_bytes: u64,

    /// Seconds a cached page stays valid
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Times a query must have been seen before its results are cached
    #[serde(default = "default_cache_min_frequency")]
    pub cache_min_frequency: u32,

    /// Recent queries remembered by the usage tracker
    #[serde(default = "default_cache_history")]
    pub cache_history: usize,

    /// Per-type field boosts overriding the built-in weights
    #[serde(default)]
    pub boosts: HashMap<String, HashMap<String, f32>>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_result_window: default_max_result_window(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            cache_max_entries: default_cache_max_entries(),
            cache_max_bytes: default_cache_max_bytes(),
            cache_ttl_secs: default_cache_ttl(),
            cache_min_frequency: default_cache_min_frequency(),
            cache_history: default_cache_history(),
            boosts: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Queue provider
    #[serde(default)]
    pub provider: QueueProviderKind,

    /// Path for the embedded queue database
    #[serde(default = "default_queue_path")]
    pub path: PathBuf,

    /// Redis connection string
    pub redis_url: Option<String>,

    /// Redis list holding pending tasks
    #[serde(default = "default_redis_key")]
    pub redis_key: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            provider: QueueProviderKind::default(),
            path: default_queue_path(),
            redis_url: None,
            redis_key: default_redis_key(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueueProviderKind {
    #[default]
    Embed,
    Redis,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Tasks popped per consumer cycle
    #[serde(default = "default_batch_fetch_count")]
    pub batch_fetch_count: usize,

    /// Sleep after a short batch (milliseconds)
    #[serde(default = "default_no_task_interval")]
    pub no_task_interval_ms: u64,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            batch_fetch_count: default_batch_fetch_count(),
            no_task_interval_ms: default_no_task_interval(),
        }
    }
}

/// Shared secrets; an empty secret rejects every request to its endpoints
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    pub gitlab_secret_token: String,

    pub gitee_secret_token: String,

    /// Token for administrative endpoints; admin routes answer 403 when unset
    pub admin_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Service name
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            service_name: default_service_name(),
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("./data/indexes")
}

fn default_writer_heap_size() -> usize {
    50_000_000
}

fn default_search_threads() -> usize {
    10
}

fn default_max_result_window() -> usize {
    1000
}

fn default_page_size() -> usize {
    20
}

fn default_max_page_size() -> usize {
    100
}

fn default_cache_max_entries() -> u64 {
    256
}

fn default_cache_max_bytes() -> u64 {
    50 * 1024 * 1024
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_cache_min_frequency() -> u32 {
    2
}

fn default_cache_history() -> usize {
    256
}

fn default_queue_path() -> PathBuf {
    PathBuf::from("./data/queue")
}

fn default_redis_key() -> String {
    "forge-search:tasks".to_string()
}

fn default_batch_fetch_count() -> usize {
    10
}

fn default_no_task_interval() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "forge-search".to_string()
}
