use crate::api::context::RequestContext;
use crate::api::registry::ActionRegistry;
use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::{ObjectType, TaskAction};
use crate::queue::{QueueTask, TaskBody};
use crate::search::{facet_dims, IndexStats, QueryBuilder, ResultPage, SearchRequest};
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Register the index, search and admin actions
pub fn register(registry: &mut ActionRegistry) {
    registry
        .register("index", "index", status)
        .register("index", "add", add)
        .register("index", "update", update)
        .register("index", "delete", delete)
        .register("index", "metrics", prometheus_metrics)
        .register("search", "index", search)
        .register("search", "repo", search_repositories)
        .register("search", "issue", search_issues)
        .register("search", "pr", search_pull_requests)
        .register("search", "code", search_code)
        .register("search", "after", search_after)
        .register("search", "facets", facets)
        .register("admin", "stats", admin_stats)
        .register("admin", "reset", admin_reset)
        .register("admin", "optimize", admin_optimize);
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueueStatus {
    pub provider: String,
    pub pending: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub service: String,
    pub version: String,
    pub queue: QueueStatus,
    pub types: Vec<String>,
}

/// Acknowledgement of an enqueued task
#[derive(Debug, Serialize, Deserialize)]
pub struct EnqueueResponse {
    #[serde(rename = "type")]
    pub object_type: ObjectType,
    pub action: TaskAction,
    pub objects: usize,
}

/// Service status
pub async fn status(ctx: RequestContext) -> Result<Json<StatusResponse>> {
    let queue = &ctx.state.queue;
    Ok(Json(StatusResponse {
        service: ctx.state.config.observability.service_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        queue: QueueStatus {
            provider: queue.name().to_string(),
            pending: queue.len().await?,
        },
        types: ObjectType::ALL.iter().map(|t| t.to_string()).collect(),
    }))
}

pub async fn add(ctx: RequestContext) -> Result<Json<EnqueueResponse>> {
    enqueue_request(&ctx, TaskAction::Add).await
}

pub async fn update(ctx: RequestContext) -> Result<Json<EnqueueResponse>> {
    enqueue_request(&ctx, TaskAction::Update).await
}

pub async fn delete(ctx: RequestContext) -> Result<Json<EnqueueResponse>> {
    enqueue_request(&ctx, TaskAction::Delete).await
}

async fn enqueue_request(ctx: &RequestContext, action: TaskAction) -> Result<Json<EnqueueResponse>> {
    let ty = ctx.object_type()?;
    let body = TaskBody::parse(&ctx.body)?;
    let objects = enqueue(&ctx.state, ty, action, body).await?;
    Ok(Json(EnqueueResponse {
        object_type: ty,
        action,
        objects,
    }))
}

/// Validate and enqueue one task; returns the number of objects it carries
pub async fn enqueue(
    state: &AppState,
    ty: ObjectType,
    action: TaskAction,
    body: TaskBody,
) -> Result<usize> {
    let objects = body.objects.len();
    let task = QueueTask::new(ty, action, &body)?;
    state.queue.push(vec![task]).await?;

    tracing::info!(object_type = %ty, action = %action, objects, "Task enqueued");
    Ok(objects)
}

/// Prometheus text exposition
pub async fn prometheus_metrics() -> Result<impl IntoResponse> {
    Ok((
        [(CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::render(),
    ))
}

/// Build a search request from `q`, `parse`, `sort`, `p`, `size` and facet params
pub fn search_request(ctx: &RequestContext, ty: ObjectType) -> Result<SearchRequest> {
    let mut builder = QueryBuilder::new(ty)
        .with_search_key(ctx.param("q").unwrap_or_default())
        .with_parse_as_query_language(ctx.flag("parse"));

    if let Some(sort) = ctx.param("sort") {
        builder = builder.with_sort(sort);
    }
    if let Some(page) = ctx.usize_param("p")? {
        builder = builder.with_page(page);
    }
    if let Some(size) = ctx.usize_param("size")? {
        builder = builder.with_page_size(size);
    }
    for dim in facet_dims(ty) {
        for value in ctx.params(dim) {
            builder = builder.with_facet(*dim, value);
        }
    }

    Ok(builder.build())
}

async fn search_typed(ctx: &RequestContext, ty: ObjectType) -> Result<Json<ResultPage>> {
    let request = search_request(ctx, ty)?;
    let page = ctx.state.executor.search(request).await?;
    Ok(Json(page))
}

/// Search the index named by the `type` parameter
pub async fn search(ctx: RequestContext) -> Result<Json<ResultPage>> {
    let ty = ctx.object_type()?;
    search_typed(&ctx, ty).await
}

pub async fn search_repositories(ctx: RequestContext) -> Result<Json<ResultPage>> {
    search_typed(&ctx, ObjectType::Repository).await
}

pub async fn search_issues(ctx: RequestContext) -> Result<Json<ResultPage>> {
    search_typed(&ctx, ObjectType::Issue).await
}

pub async fn search_pull_requests(ctx: RequestContext) -> Result<Json<ResultPage>> {
    search_typed(&ctx, ObjectType::PullRequest).await
}

pub async fn search_code(ctx: RequestContext) -> Result<Json<ResultPage>> {
    search_typed(&ctx, ObjectType::Code).await
}

/// Cursor pagination; pass the previous page's `cursor` to continue
pub async fn search_after(ctx: RequestContext) -> Result<Json<ResultPage>> {
    let ty = ctx.object_type()?;
    let request = search_request(&ctx, ty)?;
    let cursor = ctx.param("cursor").map(str::to_string);
    let page = ctx.state.executor.search_after(request, cursor).await?;
    Ok(Json(page))
}

/// Registered facet labels of a type, by dimension
pub async fn facets(ctx: RequestContext) -> Result<Json<BTreeMap<String, Vec<String>>>> {
    let ty = ctx.object_type()?;
    let executor = ctx.state.executor.clone();
    let labels = tokio::task::spawn_blocking(move || executor.facet_labels(ty))
        .await
        .map_err(|e| AppError::Internal(format!("Facet lookup failed: {}", e)))??;
    Ok(Json(labels))
}

fn require_admin(ctx: &RequestContext) -> Result<()> {
    ctx.require_token(
        "X-Admin-Token",
        ctx.state.config.webhooks.admin_token.as_deref(),
    )
}

/// Document and segment counts of one type
pub async fn admin_stats(ctx: RequestContext) -> Result<Json<IndexStats>> {
    require_admin(&ctx)?;
    let ty = ctx.object_type()?;
    let storage = ctx.state.storage.clone();
    let stats = tokio::task::spawn_blocking(move || storage.stats(ty))
        .await
        .map_err(|e| AppError::Internal(format!("Stats lookup failed: {}", e)))??;
    Ok(Json(stats))
}

/// Merge all segments of a type's index into one
pub async fn admin_optimize(ctx: RequestContext) -> Result<Json<IndexStats>> {
    require_admin(&ctx)?;
    let ty = ctx.object_type()?;
    let storage = ctx.state.storage.clone();
    let stats = tokio::task::spawn_blocking(move || storage.optimize(ty))
        .await
        .map_err(|e| AppError::Internal(format!("Optimize failed: {}", e)))??;
    Ok(Json(stats))
}

/// Drop every document and facet label of one type
pub async fn admin_reset(ctx: RequestContext) -> Result<Json<Value>> {
    require_admin(&ctx)?;
    let ty = ctx.object_type()?;
    let storage = ctx.state.storage.clone();
    tokio::task::spawn_blocking(move || storage.reset(ty))
        .await
        .map_err(|e| AppError::Internal(format!("Reset failed: {}", e)))??;

    tracing::warn!(object_type = %ty, "Index reset through admin action");
    Ok(Json(serde_json::json!({ "type": ty, "reset": true })))
}
