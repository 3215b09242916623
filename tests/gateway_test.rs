//! HTTP gateway: convention routing, status mapping and the enqueue-to-search flow

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{TestEnv, ADMIN_TOKEN, GITEE_TOKEN, GITLAB_TOKEN};
use forge_search::api::build_router;
use forge_search::models::ObjectType;
use forge_search::queue::QueueProvider;
use serde_json::{json, Value};
use tower::ServiceExt;

fn app(env: &TestEnv) -> Router {
    build_router(env.state.clone())
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_root_reports_status() {
    let env = TestEnv::new();
    let (status, body) = send(app(&env), get("/")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["queue"]["pending"], 0);
    assert_eq!(body["queue"]["provider"], "memory");
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let env = TestEnv::new();
    let (status, body) = send(app(&env), get("/nothing/here")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_unknown_operation_falls_back_to_group_default() {
    let env = TestEnv::new();

    // /search/unknown resolves to (search, index), which requires a type
    let (status, _) = send(app(&env), get("/search/unknown")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(app(&env), get("/search/unknown?type=repo")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["type"], "repo");
}

#[tokio::test]
async fn test_single_segment_resolves_in_default_group() {
    let env = TestEnv::new();
    let (status, _) = send(app(&env), get("/metrics")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_type_is_rejected() {
    let env = TestEnv::new();
    let (status, body) = send(
        app(&env),
        post("/index/add?type=wiki", json!({"objects": [{"id": 1}]})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(env.queue.len().await.unwrap(), 0);
}

#[tokio::test]
async fn test_malformed_payload_is_not_acceptable() {
    let env = TestEnv::new();

    for payload in [json!({"items": []}), json!({"objects": []}), json!({"objects": [1]})] {
        let (status, _) = send(app(&env), post("/index/add?type=issue", payload)).await;
        assert_eq!(status, StatusCode::NOT_ACCEPTABLE);
    }
    assert_eq!(env.queue.len().await.unwrap(), 0);
}

#[tokio::test]
async fn test_bad_page_parameter_is_rejected() {
    let env = TestEnv::new();
    let (status, _) = send(app(&env), get("/search/issue?p=first")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_add_search_delete_round() {
    let env = TestEnv::new();

    let (status, body) = send(
        app(&env),
        post(
            "/index/add?type=ISSUE",
            json!({"objects": [{"id": 1, "title": "fix login bug", "tags": ["bug"]}]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["type"], "issue");
    assert_eq!(body["objects"], 1);
    env.drain().await;

    let (status, body) = send(app(&env), get("/search/index?type=issue&q=login")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalHits"], 1);
    assert_eq!(body["totalPages"], 1);
    assert_eq!(body["pageIndex"], 1);
    assert_eq!(body["objects"][0]["id"], 1);
    assert!(body["objects"][0]["_score_"].as_f64().unwrap() > 0.0);
    assert!(body["objects"][0]["_id_"].is_u64());

    let (status, _) = send(
        app(&env),
        post("/index/delete?type=issue", json!({"objects": [{"id": 1}]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    env.drain().await;

    let (_, body) = send(app(&env), get("/search/issue?q=login")).await;
    assert_eq!(body["totalHits"], 0);
}

#[tokio::test]
async fn test_facet_parameters_filter_results() {
    let env = TestEnv::new();
    send(
        app(&env),
        post(
            "/index/add?type=issue",
            json!({"objects": [
                {"id": 1, "title": "crash", "tags": ["bug"], "state": "open"},
                {"id": 2, "title": "crash", "tags": ["ui"], "state": "open"},
                {"id": 3, "title": "crash", "tags": ["docs"], "state": "open"}
            ]}),
        ),
    )
    .await;
    env.drain().await;

    let (_, body) = send(app(&env), get("/search/issue?q=crash&label=bug&label=ui")).await;
    assert_eq!(body["totalHits"], 2);

    let (_, body) = send(app(&env), get("/search/facets?type=issue")).await;
    assert_eq!(body["label"], json!(["bug", "docs", "ui"]));
}

#[tokio::test]
async fn test_cursor_pagination_over_http() {
    let env = TestEnv::new();
    let objects: Vec<Value> = (1..=5)
        .map(|id| json!({"id": id, "name": format!("tool{}", id), "description": "cli tool"}))
        .collect();
    send(app(&env), post("/index/add?type=repo", json!({"objects": objects}))).await;
    env.drain().await;

    let mut seen = Vec::new();
    let mut uri = "/search/after?type=repo&q=tool&size=2".to_string();
    loop {
        let (status, body) = send(app(&env), get(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        let hits = body["objects"].as_array().unwrap().clone();
        if hits.is_empty() {
            break;
        }
        seen.extend(hits.iter().map(|h| h["id"].as_i64().unwrap()));
        let cursor = body["cursor"].as_str().unwrap();
        uri = format!("/search/after?type=repo&q=tool&size=2&cursor={}", cursor);
    }

    seen.sort();
    assert_eq!(seen, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_admin_actions_require_token() {
    let env = TestEnv::new();

    let (status, _) = send(app(&env), post("/admin/reset?type=issue", json!({}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let request = Request::builder()
        .method("POST")
        .uri("/admin/reset?type=issue")
        .header("X-Admin-Token", "wrong")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(app(&env), request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let request = Request::builder()
        .method("POST")
        .uri("/admin/reset?type=issue")
        .header("X-Admin-Token", ADMIN_TOKEN)
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app(&env), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reset"], true);

    let request = Request::builder()
        .uri("/admin/stats?type=issue")
        .header("X-Admin-Token", ADMIN_TOKEN)
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app(&env), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_documents"], 0);
}

#[tokio::test]
async fn test_admin_optimize_merges_segments() {
    let env = TestEnv::new();
    for id in 1..=3 {
        send(
            app(&env),
            post("/index/add?type=repo", json!({"objects": [{"id": id, "name": "tool"}]})),
        )
        .await;
        env.drain().await;
    }

    let (status, _) = send(app(&env), post("/admin/optimize?type=repo", json!({}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let request = Request::builder()
        .method("POST")
        .uri("/admin/optimize?type=repo")
        .header("X-Admin-Token", ADMIN_TOKEN)
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app(&env), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["num_segments"], 1);
    assert_eq!(body["total_documents"], 3);
}

#[tokio::test]
async fn test_gitlab_system_hook_indexes_project() {
    let env = TestEnv::new();
    let event = json!({
        "event_name": "project_create",
        "name": "api",
        "path_with_namespace": "acme/api",
        "project_id": 74,
        "project_visibility": "internal",
        "created_at": "2012-07-21T07:30:54Z",
        "updated_at": "2012-07-21T07:38:22Z"
    });

    let request = Request::builder()
        .method("POST")
        .uri("/gitlab/system")
        .header("X-Gitlab-Token", "wrong")
        .body(Body::from(event.to_string()))
        .unwrap();
    let (status, _) = send(app(&env), request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let request = Request::builder()
        .method("POST")
        .uri("/gitlab/system")
        .header("X-Gitlab-Token", GITLAB_TOKEN)
        .body(Body::from(event.to_string()))
        .unwrap();
    let (status, body) = send(app(&env), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["accepted"], true);
    assert_eq!(body["action"], "add");
    env.drain().await;

    let page = env.search_key(ObjectType::Repository, "acme/api").await;
    assert_eq!(common::ids(&page), vec![74]);
}

#[tokio::test]
async fn test_webhooks_are_denied_without_configured_secret() {
    let env = TestEnv::with_config(|config| {
        config.webhooks.gitlab_secret_token = String::new();
        config.webhooks.gitee_secret_token = String::new();
    });
    let event = json!({"event_name": "project_destroy", "project_id": 74});

    for (uri, header) in [("/gitlab/system", "X-Gitlab-Token"), ("/gitee", "X-Gitee-Token")] {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header, "")
            .header("X-Gitee-Event", "Push Hook")
            .body(Body::from(event.to_string()))
            .unwrap();
        let (status, _) = send(app(&env), request).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
    assert_eq!(env.queue.len().await.unwrap(), 0);
}

#[tokio::test]
async fn test_gitlab_project_hook_ignores_other_events() {
    let env = TestEnv::new();
    let request = Request::builder()
        .method("POST")
        .uri("/gitlab/project")
        .header("X-Gitlab-Token", GITLAB_TOKEN)
        .body(Body::from(json!({"object_kind": "pipeline"}).to_string()))
        .unwrap();
    let (status, body) = send(app(&env), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["accepted"], false);
    assert_eq!(env.queue.len().await.unwrap(), 0);
}

#[tokio::test]
async fn test_gitee_issue_hook() {
    let env = TestEnv::new();
    let event = json!({
        "repository": {"id": 9, "full_name": "acme/web"},
        "issue": {
            "id": 55, "number": "I4ABCD", "title": "Broken link on home page",
            "state": "open", "labels": [{"name": "docs"}]
        }
    });
    let request = Request::builder()
        .method("POST")
        .uri("/gitee")
        .header("X-Gitee-Token", GITEE_TOKEN)
        .header("X-Gitee-Event", "Issue Hook")
        .body(Body::from(event.to_string()))
        .unwrap();
    let (status, body) = send(app(&env), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["type"], "issue");
    env.drain().await;

    let page = env.search_key(ObjectType::Issue, "broken").await;
    assert_eq!(common::ids(&page), vec![55]);
}

#[tokio::test]
async fn test_metrics_exposition() {
    let env = TestEnv::new();
    send(app(&env), get("/search/repo?q=anything")).await;

    let response = app(&env).oneshot(get("/index/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("forge_search_searches_total"));
}
