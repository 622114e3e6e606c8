mod ats;
mod classify;
mod config;
mod crawler;
mod db;
mod dedup;
mod error;
mod events;
mod extract;
mod filters;
mod models;
mod rate_limit;
mod routes;
mod store;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::config::{Command, Config};
use crate::crawler::{CrawlContext, run_batch};
use crate::events::EventBus;
use crate::models::target::load_targets;
use crate::store::{JobSink, PgJobStore};

fn init_tracing(format: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("careerscout=info,tower_http=info"));
    if format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn connect_sink(config: &Config) -> anyhow::Result<Option<Arc<dyn JobSink>>> {
    let Some(database_url) = &config.database_url else {
        tracing::info!("DATABASE_URL not set, jobs will not be persisted");
        return Ok(None);
    };

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(database_url).await?;
    if config.run_migrations {
        tracing::info!("Running database migrations...");
        db::run_migrations(&pool).await?;
        tracing::info!("Migrations complete");
    }
    Ok(Some(Arc::new(PgJobStore::new(pool))))
}

/// Cancel `token` on ctrl-c so in-flight work winds down and the cache is
/// still saved.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received, stopping crawl");
            token.cancel();
        }
    });
}

async fn crawl_once(ctx: Arc<CrawlContext>, domains_file: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let targets = load_targets(domains_file)?;
    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let report = run_batch(ctx, targets, cancel).await;
    let body = serde_json::to_string_pretty(&report)?;
    match output {
        Some(path) => {
            std::fs::write(path, body)?;
            tracing::info!("Report written to {}", path.display());
        }
        None => println!("{body}"),
    }
    Ok(())
}

async fn serve(ctx: Arc<CrawlContext>, domains_file: &Path, listen_addr: &str) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    let state = routes::AppState::new(ctx, domains_file.to_path_buf(), shutdown.clone());
    let control = state.control.clone();
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!("Listening on {listen_addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received, exiting gracefully");
            shutdown.cancel();
        })
        .await?;

    // A cancelled batch still saves the job cache before it returns.
    while control.running().is_some() {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    init_tracing(&config.log_format);

    let settings = config.to_settings()?;
    let sink = connect_sink(&config).await?;
    let ctx = Arc::new(CrawlContext::from_settings(settings, EventBus::default(), sink)?);

    match config.resolved_command() {
        Command::Crawl { output } => crawl_once(ctx, &config.domains_file, output.as_deref()).await,
        Command::Serve { listen_addr } => serve(ctx, &config.domains_file, &listen_addr).await,
    }
}
