//! Durable task queue between producers and the indexer
//!
//! Producers (the gateway, webhooks, bulk importers) push [`QueueTask`]s; the
//! indexer pops them in batches. Three providers are available: an embedded
//! sled database (default), a Redis list and an in-process deque.

mod error;
mod factory;
mod memory;
mod redis_queue;
mod sled_queue;
mod task;
mod traits;

pub use error::{QueueError, QueueResult};
pub use factory::create_queue;
pub use memory::InMemoryQueue;
pub use redis_queue::RedisQueue;
pub use sled_queue::SledQueue;
pub use task::{QueueTask, TaskBody};
pub use traits::QueueProvider;
