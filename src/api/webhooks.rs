//! Source-hosting webhooks translated into index tasks
//!
//! GitLab system hooks maintain repositories, GitLab project hooks maintain
//! issues and merge requests. Gitee sends all three through one endpoint,
//! told apart by the `X-Gitee-Event` header. Unknown events are acknowledged
//! and ignored so the platform does not keep redelivering them.

use crate::api::context::RequestContext;
use crate::api::handlers::enqueue;
use crate::api::registry::ActionRegistry;
use crate::error::{AppError, Result};
use crate::models::{Issue, ObjectType, PullRequest, Repository, RepositoryRef, TaskAction};
use crate::queue::TaskBody;
use axum::Json;
use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub fn register(registry: &mut ActionRegistry) {
    registry
        .register("gitlab", "system", gitlab_system)
        .register("gitlab", "project", gitlab_project)
        .register("gitee", "index", gitee);
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub accepted: bool,
    pub event: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub object_type: Option<ObjectType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<TaskAction>,
}

impl WebhookResponse {
    fn ignored(event: impl Into<String>) -> Self {
        Self {
            accepted: false,
            event: event.into(),
            object_type: None,
            action: None,
        }
    }
}

/// GitLab system hook: project lifecycle events
pub async fn gitlab_system(ctx: RequestContext) -> Result<Json<WebhookResponse>> {
    let secret = ctx.state.config.webhooks.gitlab_secret_token.clone();
    ctx.require_token("X-Gitlab-Token", Some(secret.as_str()))?;

    let event: Value = ctx.json()?;
    let name = text(&event, &["event_name"]);
    let action = match name.as_str() {
        "project_create" => TaskAction::Add,
        "project_update" | "project_rename" | "project_transfer" => TaskAction::Update,
        "project_destroy" => TaskAction::Delete,
        _ => {
            tracing::debug!(event = %name, "Ignoring GitLab system event");
            return Ok(Json(WebhookResponse::ignored(name)));
        }
    };

    let repository = gitlab_repository(&event);
    accept(&ctx, name, ObjectType::Repository, action, serde_json::to_value(repository)?).await
}

/// GitLab project hook: issue and merge request events
pub async fn gitlab_project(ctx: RequestContext) -> Result<Json<WebhookResponse>> {
    let secret = ctx.state.config.webhooks.gitlab_secret_token.clone();
    ctx.require_token("X-Gitlab-Token", Some(secret.as_str()))?;

    let event: Value = ctx.json()?;
    let kind = text(&event, &["object_kind"]);
    let (ty, object) = match kind.as_str() {
        "issue" => (ObjectType::Issue, serde_json::to_value(gitlab_issue(&event))?),
        "merge_request" => (
            ObjectType::PullRequest,
            serde_json::to_value(gitlab_merge_request(&event))?,
        ),
        _ => {
            tracing::debug!(event = %kind, "Ignoring GitLab project event");
            return Ok(Json(WebhookResponse::ignored(kind)));
        }
    };

    // Create and edit events alike replace the stored document
    accept(&ctx, kind, ty, TaskAction::Update, object).await
}

/// Gitee hook: repository, issue and pull request events
pub async fn gitee(ctx: RequestContext) -> Result<Json<WebhookResponse>> {
    let secret = ctx.state.config.webhooks.gitee_secret_token.clone();
    ctx.require_token("X-Gitee-Token", Some(secret.as_str()))?;

    let name = ctx.header("X-Gitee-Event").unwrap_or_default().to_string();
    let event: Value = ctx.json()?;
    let (ty, object) = match name.as_str() {
        "Issue Hook" => (ObjectType::Issue, serde_json::to_value(gitee_issue(&event))?),
        "Merge Request Hook" | "Pull Request Hook" => (
            ObjectType::PullRequest,
            serde_json::to_value(gitee_pull_request(&event))?,
        ),
        "Push Hook" => (
            ObjectType::Repository,
            serde_json::to_value(gitee_repository(&event))?,
        ),
        _ => {
            tracing::debug!(event = %name, "Ignoring Gitee event");
            return Ok(Json(WebhookResponse::ignored(name)));
        }
    };

    accept(&ctx, name, ty, TaskAction::Update, object).await
}

async fn accept(
    ctx: &RequestContext,
    event: String,
    ty: ObjectType,
    action: TaskAction,
    object: Value,
) -> Result<Json<WebhookResponse>> {
    if object.get("id").map_or(true, Value::is_null) {
        return Err(AppError::NotAcceptable(format!(
            "Event '{}' carries no object id",
            event
        )));
    }

    let body = TaskBody::from_value(serde_json::json!({ "objects": [object] }))?;
    enqueue(&ctx.state, ty, action, body).await?;

    Ok(Json(WebhookResponse {
        accepted: true,
        event,
        object_type: Some(ty),
        action: Some(action),
    }))
}

fn gitlab_repository(event: &Value) -> Repository {
    let ident = text(event, &["path_with_namespace"]);
    let owner = ident
        .rsplit_once('/')
        .map(|(owner, _)| owner.to_string())
        .unwrap_or_else(|| text(event, &["owner_name"]));

    Repository {
        id: int(event, &["project_id"]),
        ident: Some(ident).filter(|i| !i.is_empty()),
        name: text(event, &["name"]),
        owner,
        visibility: text(event, &["project_visibility"]),
        created_at: timestamp(event, &["created_at"]),
        updated_at: timestamp(event, &["updated_at"]),
        ..Default::default()
    }
}

fn gitlab_project_ref(event: &Value) -> RepositoryRef {
    RepositoryRef {
        id: int(event, &["project", "id"]).unwrap_or_default(),
        name: text(event, &["project", "path_with_namespace"]),
    }
}

fn gitlab_issue(event: &Value) -> Issue {
    let attrs = &event["object_attributes"];
    Issue {
        id: int(attrs, &["id"]),
        repository: gitlab_project_ref(event),
        number: int(attrs, &["iid"]).unwrap_or_default(),
        title: text(attrs, &["title"]),
        description: text(attrs, &["description"]),
        tags: labels(event, "title"),
        state: text(attrs, &["state"]),
        author: text(event, &["user", "username"]),
        created_at: timestamp(attrs, &["created_at"]),
        updated_at: timestamp(attrs, &["updated_at"]),
        ..Default::default()
    }
}

fn gitlab_merge_request(event: &Value) -> PullRequest {
    let attrs = &event["object_attributes"];
    PullRequest {
        id: int(attrs, &["id"]),
        repository: gitlab_project_ref(event),
        number: int(attrs, &["iid"]).unwrap_or_default(),
        title: text(attrs, &["title"]),
        description: text(attrs, &["description"]),
        tags: labels(event, "title"),
        state: text(attrs, &["state"]),
        author: text(event, &["user", "username"]),
        source_branch: text(attrs, &["source_branch"]),
        target_branch: text(attrs, &["target_branch"]),
        created_at: timestamp(attrs, &["created_at"]),
        updated_at: timestamp(attrs, &["updated_at"]),
        ..Default::default()
    }
}

fn gitee_repository_ref(event: &Value) -> RepositoryRef {
    RepositoryRef {
        id: int(event, &["repository", "id"]).unwrap_or_default(),
        name: text(event, &["repository", "full_name"]),
    }
}

fn gitee_issue(event: &Value) -> Issue {
    let issue = &event["issue"];
    let repository = gitee_repository_ref(event);
    // Gitee issue numbers are alphanumeric, e.g. "I4ABCD"
    let number = text(issue, &["number"]);
    let ident = (!repository.name.is_empty() && !number.is_empty())
        .then(|| format!("{}#{}", repository.name, number));

    Issue {
        id: int(issue, &["id"]),
        ident,
        repository,
        number: number.parse().unwrap_or_default(),
        title: text(issue, &["title"]),
        description: text(issue, &["body"]),
        tags: labels(issue, "name"),
        state: text(issue, &["state"]),
        author: text(issue, &["user", "login"]),
        created_at: timestamp(issue, &["created_at"]),
        updated_at: timestamp(issue, &["updated_at"]),
    }
}

fn gitee_pull_request(event: &Value) -> PullRequest {
    let pr = &event["pull_request"];
    PullRequest {
        id: int(pr, &["id"]),
        repository: gitee_repository_ref(event),
        number: int(pr, &["number"]).unwrap_or_default(),
        title: text(pr, &["title"]),
        description: text(pr, &["body"]),
        tags: labels(pr, "name"),
        state: text(pr, &["state"]),
        author: text(pr, &["user", "login"]),
        source_branch: text(pr, &["head", "ref"]),
        target_branch: text(pr, &["base", "ref"]),
        created_at: timestamp(pr, &["created_at"]),
        updated_at: timestamp(pr, &["updated_at"]),
        ..Default::default()
    }
}

fn gitee_repository(event: &Value) -> Repository {
    let repo = &event["repository"];
    let ident = text(repo, &["full_name"]);
    let owner = match text(repo, &["namespace"]) {
        ns if !ns.is_empty() => ns,
        _ => ident
            .rsplit_once('/')
            .map(|(owner, _)| owner.to_string())
            .unwrap_or_default(),
    };
    let visibility = if repo["private"].as_bool().unwrap_or(false) {
        "private"
    } else {
        "public"
    };

    Repository {
        id: int(repo, &["id"]),
        ident: Some(ident).filter(|i| !i.is_empty()),
        name: text(repo, &["name"]),
        owner,
        description: text(repo, &["description"]),
        url: text(repo, &["html_url"]),
        language: text(repo, &["language"]),
        license: text(repo, &["license"]),
        stars: int(repo, &["stargazers_count"]).unwrap_or_default(),
        forks: int(repo, &["forks_count"]).unwrap_or_default(),
        fork: repo["fork"].as_bool().unwrap_or(false),
        visibility: visibility.to_string(),
        created_at: timestamp(repo, &["created_at"]),
        updated_at: timestamp(repo, &["updated_at"]),
        ..Default::default()
    }
}

fn lookup<'a>(value: &'a Value, path: &[&str]) -> &'a Value {
    path.iter().fold(value, |v, key| &v[*key])
}

fn text(value: &Value, path: &[&str]) -> String {
    match lookup(value, path) {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

fn int(value: &Value, path: &[&str]) -> Option<i64> {
    match lookup(value, path) {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Label names from `labels: [{<key>: ...}]` or `labels: ["..."]`
fn labels(value: &Value, key: &str) -> Vec<String> {
    value["labels"]
        .as_array()
        .map(|labels| {
            labels
                .iter()
                .filter_map(|label| match label {
                    Value::String(s) => Some(s.clone()),
                    other => other[key].as_str().map(str::to_string),
                })
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Epoch milliseconds from the timestamp formats the platforms send
fn timestamp(value: &Value, path: &[&str]) -> i64 {
    match lookup(value, path) {
        Value::Number(n) => n.as_i64().unwrap_or_default(),
        Value::String(s) => parse_timestamp(s).unwrap_or_default(),
        _ => 0,
    }
}

fn parse_timestamp(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S %z") {
        return Some(dt.timestamp_millis());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S UTC")
        .ok()
        .map(|dt| dt.and_utc().timestamp_millis())
}
