pub mod crawl;
pub mod events;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::Router;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::crawler::{BatchReport, CrawlContext};

pub struct RunningBatch {
    pub cancel: CancellationToken,
    pub started_at: DateTime<Utc>,
    pub domains: usize,
}

#[derive(Default)]
pub struct BatchControl {
    running: Mutex<Option<RunningBatch>>,
    last_report: Mutex<Option<BatchReport>>,
}

impl BatchControl {
    pub fn running(&self) -> MutexGuard<'_, Option<RunningBatch>> {
        self.running.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn last_report(&self) -> MutexGuard<'_, Option<BatchReport>> {
        self.last_report.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Clone)]
pub struct AppState {
    pub ctx: Arc<CrawlContext>,
    pub domains_file: PathBuf,
    /// Process-wide stop signal; each batch runs on a child of it.
    pub shutdown: CancellationToken,
    pub control: Arc<BatchControl>,
}

impl AppState {
    pub fn new(ctx: Arc<CrawlContext>, domains_file: PathBuf, shutdown: CancellationToken) -> Self {
        Self {
            ctx,
            domains_file,
            shutdown,
            control: Arc::new(BatchControl::default()),
        }
    }
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/status", get(crawl::status))
        .route("/crawl", post(crawl::start))
        .route("/crawl/stop", post(crawl::stop))
        .route("/report", get(crawl::report))
        .route("/events", get(events::stream))
        .with_state(state);

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
