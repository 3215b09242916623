//! Write side: queue consumer and index write pipeline

mod consumer;
mod pipeline;

pub use consumer::{BatchReport, TaskConsumer};
pub use pipeline::IndexPipeline;
