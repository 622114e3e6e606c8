use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AppState, RunningBatch};
use crate::crawler::{BatchReport, run_batch};
use crate::error::AppError;
use crate::models::target::{load_targets, targets_from_value};

#[derive(Debug, Deserialize)]
pub struct CrawlRequest {
    /// Same shape as the domain list file.
    pub domains: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct CrawlStarted {
    pub domains: usize,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub running: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub domains: Option<usize>,
    pub last_finished_at: Option<DateTime<Utc>>,
    pub last_jobs_total: Option<usize>,
    pub tracked_jobs: usize,
}

/// GET /api/v1/status
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let (running, started_at, domains) = match state.control.running().as_ref() {
        Some(batch) => (true, Some(batch.started_at), Some(batch.domains)),
        None => (false, None, None),
    };
    let (last_finished_at, last_jobs_total) = match state.control.last_report().as_ref() {
        Some(report) => (Some(report.finished_at), Some(report.jobs_total)),
        None => (None, None),
    };
    let tracked_jobs = state.ctx.tracker().previous_len();
    Json(StatusResponse {
        running,
        started_at,
        domains,
        last_finished_at,
        last_jobs_total,
        tracked_jobs,
    })
}

/// POST /api/v1/crawl
///
/// Starts a batch in the background. The body may carry a `domains` list;
/// otherwise the configured domain file is read. Only one batch runs at a
/// time.
pub async fn start(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<CrawlStarted>), AppError> {
    let targets = if body.iter().all(u8::is_ascii_whitespace) {
        load_targets(&state.domains_file)?
    } else {
        let request: CrawlRequest = serde_json::from_slice(&body)
            .map_err(|e| AppError::Input(format!("Invalid crawl request: {e}")))?;
        targets_from_value(&request.domains)?
    };
    if targets.is_empty() {
        return Err(AppError::Input("No valid domains to crawl".to_string()));
    }

    let cancel = {
        let mut running = state.control.running();
        if running.is_some() {
            return Err(AppError::Conflict("A crawl is already running".to_string()));
        }
        let cancel = state.shutdown.child_token();
        *running = Some(RunningBatch {
            cancel: cancel.clone(),
            started_at: Utc::now(),
            domains: targets.len(),
        });
        cancel
    };

    let domains = targets.len();
    tracing::info!("Crawl of {domains} domains requested");
    let background = state.clone();
    tokio::spawn(async move {
        let report = run_batch(background.ctx.clone(), targets, cancel).await;
        *background.control.last_report() = Some(report);
        *background.control.running() = None;
    });

    Ok((StatusCode::ACCEPTED, Json(CrawlStarted { domains })))
}

/// POST /api/v1/crawl/stop
pub async fn stop(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    match state.control.running().as_ref() {
        Some(batch) => {
            batch.cancel.cancel();
            tracing::info!("Stop requested for running crawl");
            Ok(Json(serde_json::json!({ "stopping": true })))
        }
        None => Err(AppError::Conflict("No crawl is running".to_string())),
    }
}

/// GET /api/v1/report
pub async fn report(State(state): State<AppState>) -> Result<Json<BatchReport>, AppError> {
    state
        .control
        .last_report()
        .clone()
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No crawl has finished yet".to_string()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::Request;
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    use super::*;
    use crate::crawler::fetch::tests::StubFetcher;
    use crate::crawler::orchestrator::CrawlOutcome;
    use crate::crawler::{CrawlContext, CrawlSettings};
    use crate::dedup::tracker::IncrementalTracker;
    use crate::events::EventBus;
    use crate::routes::router;

    fn state(dir: &tempfile::TempDir, delay: Duration) -> AppState {
        let settings = CrawlSettings {
            rate_limit_delay: delay,
            cache_file: dir.path().join("cache.json"),
            ..Default::default()
        };
        let tracker = IncrementalTracker::load(settings.cache_file.clone());
        let fetcher = StubFetcher::new().page("https://acme.com/", "<p>Hello</p>");
        let ctx = CrawlContext::new(settings, Arc::new(fetcher), tracker, EventBus::default(), None);
        AppState::new(Arc::new(ctx), dir.path().join("missing.json"), CancellationToken::new())
    }

    fn post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_healthz_and_idle_status() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(state(&dir, Duration::ZERO));

        let res = app.clone().oneshot(get("/healthz")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let res = app.clone().oneshot(get("/api/v1/status")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let res = app.clone().oneshot(get("/api/v1/report")).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let res = app.oneshot(post("/api/v1/crawl/stop", "")).await.unwrap();
        assert_eq!(res.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_missing_domain_file_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(state(&dir, Duration::ZERO));
        let res = app.oneshot(post("/api/v1/crawl", "")).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_crawl_conflict_stop_and_report() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir, Duration::from_secs(30));
        let app = router(state.clone());
        let body = r#"{"domains": ["acme.com"]}"#;

        let res = app.clone().oneshot(post("/api/v1/crawl", body)).await.unwrap();
        assert_eq!(res.status(), StatusCode::ACCEPTED);

        let res = app.clone().oneshot(post("/api/v1/crawl", body)).await.unwrap();
        assert_eq!(res.status(), StatusCode::CONFLICT);

        let res = app.clone().oneshot(post("/api/v1/crawl/stop", "")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        for _ in 0..100 {
            if state.control.running().is_none() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let res = app.oneshot(get("/api/v1/report")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let report = state.control.last_report().clone().unwrap();
        assert!(report.cancelled);
        assert!(matches!(
            report.domains[0].outcome,
            CrawlOutcome::Skipped | CrawlOutcome::Cancelled
        ));
    }

    #[tokio::test]
    async fn test_events_stream_is_sse() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(state(&dir, Duration::ZERO));
        let res = app.oneshot(get("/api/v1/events")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers().get("content-type").unwrap().to_str().unwrap(),
            "text/event-stream"
        );
    }
}
