//! HTTP request handlers.

use super::AppState;
use crate::db::{DbError, Target};
use crate::probe::Prober;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const DEFAULT_RESULTS_LIMIT: u32 = 100;

pub async fn handle_root() -> impl IntoResponse {
    "checkhtml running"
}

fn db_error_response(e: DbError) -> axum::response::Response {
    match e {
        DbError::NotFound => (StatusCode::NOT_FOUND, "Target not found").into_response(),
        DbError::Conflict(msg) => (StatusCode::CONFLICT, msg).into_response(),
        e => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

// ============================================================================
// API: Targets
// ============================================================================

pub async fn handle_get_targets(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.get_targets() {
        Ok(targets) => Json(targets).into_response(),
        Err(e) => db_error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateTargetRequest {
    #[serde(default)]
    pub url: String,
}

pub async fn handle_create_target(
    State(state): State<AppState>,
    Json(req): Json<CreateTargetRequest>,
) -> impl IntoResponse {
    let url = req.url.trim();
    if url.is_empty() {
        return (StatusCode::BAD_REQUEST, "url is required").into_response();
    }

    let mut target = Target {
        url: url.to_string(),
        ..Default::default()
    };

    if let Err(e) = state.store.add_target(&mut target) {
        return db_error_response(e);
    }

    // Check once right away instead of waiting for the next cycle
    if let Err(e) = state.cycle.check_target(&target).await {
        tracing::error!("Failed to record initial check for {}: {}", target.url, e);
    }

    (StatusCode::CREATED, Json(target)).into_response()
}

#[derive(Debug, Deserialize)]
pub struct UpdateTargetRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
}

pub async fn handle_update_target(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateTargetRequest>,
) -> impl IntoResponse {
    let mut target = match state.store.get_target(id) {
        Ok(t) => t,
        Err(e) => return db_error_response(e),
    };

    if let Some(url) = req.url {
        let url = url.trim();
        if url.is_empty() {
            return (StatusCode::BAD_REQUEST, "url is required").into_response();
        }
        target.url = url.to_string();
    }
    if let Some(active) = req.active {
        target.active = active;
    }

    match state.store.update_target(&target) {
        Ok(_) => Json(target).into_response(),
        Err(e) => db_error_response(e),
    }
}

pub async fn handle_delete_target(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.store.delete_target(id) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => db_error_response(e),
    }
}

// ============================================================================
// API: Results
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ResultsQuery {
    #[serde(default)]
    pub limit: Option<u32>,
}

pub async fn handle_get_results(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<ResultsQuery>,
) -> impl IntoResponse {
    if let Err(e) = state.store.get_target(id) {
        return db_error_response(e);
    }

    let limit = query.limit.unwrap_or(DEFAULT_RESULTS_LIMIT);
    match state.cycle.results().history(id, limit) {
        Ok(results) => Json(results).into_response(),
        Err(e) => db_error_response(e),
    }
}

// ============================================================================
// API: Ad-hoc check
// ============================================================================

#[derive(Debug, Serialize)]
pub struct InstantCheckResponse {
    pub url: String,
    pub status_code: u16,
    pub response_time_ms: u64,
    pub response_size_bytes: u64,
    pub link_count: u64,
    pub checked_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Probe a URL without tracking it or storing the result.
pub async fn handle_check(
    State(state): State<AppState>,
    Json(req): Json<CreateTargetRequest>,
) -> impl IntoResponse {
    let url = req.url.trim();
    if url.is_empty() {
        return (StatusCode::BAD_REQUEST, "url is required").into_response();
    }

    let outcome = state
        .cycle
        .prober()
        .probe(url, state.cycle.probe_timeout())
        .await;
    if outcome.is_failure() {
        tracing::debug!("Ad-hoc check of {} failed: {:?}", url, outcome.error);
    }

    Json(InstantCheckResponse {
        url: url.to_string(),
        status_code: outcome.status_code,
        response_time_ms: outcome.response_time_ms,
        response_size_bytes: outcome.html_size,
        link_count: outcome.link_count,
        checked_at: Utc::now(),
        error: outcome.error,
    })
    .into_response()
}

#[cfg(test)]
mod tests {
    use crate::config::ServerConfig;
    use crate::db::{CheckResult, HistoryResults, Store, Target};
    use crate::probe::HttpProber;
    use crate::scheduler::{CheckCycle, CycleOptions, SystemClock};
    use crate::web::Server;

    use axum::{response::Html, routing::get, Router};
    use reqwest::StatusCode;
    use serde_json::{json, Value};
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    async fn serve(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    async fn spawn_api() -> (NamedTempFile, Arc<Store>, String) {
        let tmp = NamedTempFile::new().unwrap();
        let store = Arc::new(Store::new(tmp.path()).unwrap());
        let cycle = CheckCycle::new(
            store.clone(),
            Arc::new(HistoryResults::new(store.clone())),
            Arc::new(HttpProber::new().unwrap()),
            Arc::new(SystemClock),
            CycleOptions {
                probe_timeout: Duration::from_secs(2),
                ..Default::default()
            },
        );
        let server = Server::new(ServerConfig::default(), store.clone(), cycle);
        let addr = serve(server.routes()).await;
        (tmp, store, format!("http://{}", addr))
    }

    async fn spawn_site() -> String {
        let site = Router::new().route("/", get(|| async { Html("<a href=1><a href=2>") }));
        format!("http://{}/", serve(site).await)
    }

    #[tokio::test]
    async fn test_register_checks_immediately() {
        let (_tmp, store, api) = spawn_api().await;
        let site = spawn_site().await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{}/api/targets", api))
            .json(&json!({ "url": format!("  {}  ", site) }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let target: Target = resp.json().await.unwrap();
        assert_eq!(target.url, site);

        let results: Vec<CheckResult> = client
            .get(format!("{}/api/targets/{}/results", api, target.id))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status_code, 200);
        assert_eq!(results[0].link_count, 2);
        assert_eq!(store.get_targets().unwrap().len(), 1);

        let resp = client
            .post(format!("{}/api/targets", api))
            .json(&json!({ "url": site }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_rejects_empty_url() {
        let (_tmp, _store, api) = spawn_api().await;
        let client = reqwest::Client::new();

        for path in ["/api/targets", "/api/check"] {
            let resp = client
                .post(format!("{}{}", api, path))
                .json(&json!({ "url": "   " }))
                .send()
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (_tmp, store, api) = spawn_api().await;
        let client = reqwest::Client::new();
        let mut target = Target {
            url: "http://paused.invalid".to_string(),
            ..Default::default()
        };
        store.add_target(&mut target).unwrap();

        let updated: Target = client
            .put(format!("{}/api/targets/{}", api, target.id))
            .json(&json!({ "active": false }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(!updated.active);
        assert_eq!(updated.url, "http://paused.invalid");

        let resp = client
            .delete(format!("{}/api/targets/{}", api, target.id))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        for resp in [
            client.delete(format!("{}/api/targets/{}", api, target.id)).send().await.unwrap(),
            client.get(format!("{}/api/targets/{}/results", api, target.id)).send().await.unwrap(),
        ] {
            assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        }
    }

    #[tokio::test]
    async fn test_instant_check_does_not_persist() {
        let (_tmp, store, api) = spawn_api().await;
        let site = spawn_site().await;
        let client = reqwest::Client::new();

        let body: Value = client
            .post(format!("{}/api/check", api))
            .json(&json!({ "url": site }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status_code"], 200);
        assert_eq!(body["link_count"], 2);
        assert_eq!(body["response_size_bytes"], 20);
        assert!(body.get("error").is_none());
        assert!(store.get_targets().unwrap().is_empty());
    }
}
