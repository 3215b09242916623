//! Convention-based action routing
//!
//! A path `/{group}/{operation}` resolves against a table of actions built at
//! startup. Missing segments default to `index`. Resolution order:
//!
//! - `/`                → (index, index)
//! - `/a`               → (a, index), then (index, a)
//! - `/a/b[/...]`       → (a, b), then (a, index), then (index, a)
//!
//! Lookups are cached per (group, operation), including misses, in a bounded
//! cache so arbitrary client paths cannot grow it without limit.

use crate::api::context::RequestContext;
use crate::error::AppError;
use axum::response::{IntoResponse, Response};
use moka::sync::Cache;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub const DEFAULT_GROUP: &str = "index";
pub const DEFAULT_OPERATION: &str = "index";

/// Maximum number of cached path resolutions
pub const RESOLUTION_CACHE_CAPACITY: u64 = 1024;

/// (group, operation)
pub type ActionKey = (String, String);

pub type ActionFuture = Pin<Box<dyn Future<Output = Result<Response, AppError>> + Send>>;

/// Type-erased action
pub type BoxedAction = Arc<dyn Fn(RequestContext) -> ActionFuture + Send + Sync>;

/// Functions usable as actions: `async fn() -> Result<R>` or
/// `async fn(RequestContext) -> Result<R>`
pub trait IntoAction<Args>: Send + Sync + 'static {
    fn into_action(self) -> BoxedAction;
}

impl<F, Fut, R> IntoAction<()> for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, AppError>> + Send + 'static,
    R: IntoResponse,
{
    fn into_action(self) -> BoxedAction {
        Arc::new(move |_ctx: RequestContext| {
            let fut = self();
            Box::pin(async move { fut.await.map(IntoResponse::into_response) }) as ActionFuture
        })
    }
}

impl<F, Fut, R> IntoAction<(RequestContext,)> for F
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, AppError>> + Send + 'static,
    R: IntoResponse,
{
    fn into_action(self) -> BoxedAction {
        Arc::new(move |ctx: RequestContext| {
            let fut = self(ctx);
            Box::pin(async move { fut.await.map(IntoResponse::into_response) }) as ActionFuture
        })
    }
}

/// Static routing table with a resolution cache
pub struct ActionRegistry {
    actions: HashMap<ActionKey, BoxedAction>,
    resolved: Cache<ActionKey, Option<ActionKey>>,
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::with_cache_capacity(RESOLUTION_CACHE_CAPACITY)
    }
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache_capacity(capacity: u64) -> Self {
        Self {
            actions: HashMap::new(),
            resolved: Cache::new(capacity),
        }
    }

    /// Register an action under (group, operation)
    pub fn register<A, Args>(&mut self, group: &str, operation: &str, action: A) -> &mut Self
    where
        A: IntoAction<Args>,
    {
        self.actions.insert(
            (group.to_ascii_lowercase(), operation.to_ascii_lowercase()),
            action.into_action(),
        );
        self.resolved.invalidate_all();
        self
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Keys tried, in order, for the leading path segments
    pub fn candidates(segments: &[&str]) -> Vec<ActionKey> {
        let key = |g: &str, o: &str| (g.to_string(), o.to_string());
        match segments {
            [] => vec![key(DEFAULT_GROUP, DEFAULT_OPERATION)],
            [group] => vec![key(group, DEFAULT_OPERATION), key(DEFAULT_GROUP, group)],
            [group, operation, ..] => vec![
                key(group, operation),
                key(group, DEFAULT_OPERATION),
                key(DEFAULT_GROUP, group),
            ],
        }
    }

    /// Resolve path segments to the registered key and action
    pub fn resolve(&self, segments: &[&str]) -> Option<(ActionKey, BoxedAction)> {
        let segments: Vec<String> = segments
            .iter()
            .filter(|s| !s.is_empty())
            .take(2)
            .map(|s| s.to_ascii_lowercase())
            .collect();
        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();

        let requested = (
            segments.first().copied().unwrap_or(DEFAULT_GROUP).to_string(),
            segments.get(1).copied().unwrap_or("").to_string(),
        );

        let found = match self.resolved.get(&requested) {
            Some(found) => found,
            None => {
                let found = Self::candidates(&segments)
                    .into_iter()
                    .find(|key| self.actions.contains_key(key));
                if found.is_none() {
                    tracing::debug!(group = %requested.0, operation = %requested.1, "No action found");
                }
                self.resolved.insert(requested, found.clone());
                found
            }
        }?;

        let action = self.actions.get(&found)?.clone();
        Some((found, action))
    }

    /// Number of cached resolutions, hits and misses alike
    pub fn cached_resolutions(&self) -> u64 {
        self.resolved.run_pending_tasks();
        self.resolved.entry_count()
    }
}
