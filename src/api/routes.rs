use crate::api::context::RequestContext;
use crate::api::registry::ActionRegistry;
use crate::api::{handlers, webhooks, AppState};
use crate::error::AppError;
use crate::metrics::GATEWAY_METRICS;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, Method, Uri},
    response::{IntoResponse, Response},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Instrument;

#[derive(Clone)]
struct Gateway {
    state: AppState,
    registry: Arc<ActionRegistry>,
}

/// The routing table of every action served by the gateway
pub fn default_registry() -> ActionRegistry {
    let mut registry = ActionRegistry::new();
    handlers::register(&mut registry);
    webhooks::register(&mut registry);
    registry
}

/// Build the main API router
pub fn build_router(state: AppState) -> Router {
    build_router_with(state, default_registry())
}

/// Build a router over an explicit routing table
pub fn build_router_with(state: AppState, registry: ActionRegistry) -> Router {
    tracing::debug!(actions = registry.len(), "Action table built");

    Router::new()
        // Every path goes through convention routing
        .fallback(dispatch)
        .with_state(Gateway {
            state,
            registry: Arc::new(registry),
        })
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
}

async fn dispatch(
    State(gateway): State<Gateway>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let segments: Vec<&str> = uri.path().split('/').filter(|s| !s.is_empty()).collect();

    let Some(((group, operation), action)) = gateway.registry.resolve(&segments) else {
        GATEWAY_METRICS
            .requests
            .with_label_values(&["", "", "404"])
            .inc();
        return AppError::NotFound(format!("No action for path '{}'", uri.path())).into_response();
    };

    let params = match Query::<Vec<(String, String)>>::try_from_uri(&uri) {
        Ok(Query(params)) => params,
        Err(e) => {
            return AppError::Validation(format!("Malformed query string: {}", e)).into_response()
        }
    };

    let ctx = RequestContext {
        state: gateway.state.clone(),
        params,
        headers,
        body,
    };

    let span = tracing::info_span!("action", %method, group = %group, operation = %operation);
    let response = match action(ctx).instrument(span).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    };

    GATEWAY_METRICS
        .requests
        .with_label_values(&[group.as_str(), operation.as_str(), response.status().as_str()])
        .inc();

    response
}
