// Per-domain crawl and the batch runner around it.

pub mod career;
pub mod fetch;
pub mod orchestrator;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::ats::AtsDetector;
use crate::ats::client::AtsClient;
use crate::classify::{ClassifierSettings, Normalizer, RoleClassifier};
use crate::dedup::tracker::IncrementalTracker;
use crate::dedup::{DEFAULT_FUZZY_THRESHOLD, DEFAULT_TITLE_ONLY_THRESHOLD, trend};
use crate::error::AppError;
use crate::events::EventBus;
use crate::extract::ExtractionPipeline;
use crate::filters::domain::DomainBlocklist;
use crate::models::target::CrawlTarget;
use crate::rate_limit::RateLimiter;
use crate::store::JobSink;
use fetch::{HttpFetcher, PageFetcher};
use orchestrator::{CrawlOutcome, DomainReport, crawl_domain};

#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub max_pages_per_domain: usize,
    pub max_depth: usize,
    pub page_timeout: Duration,
    pub rate_limit_delay: Duration,
    pub max_candidates: usize,
    pub concurrency: usize,
    pub fuzzy_threshold: f64,
    pub title_only_threshold: f64,
    pub classifier: ClassifierSettings,
    pub cache_file: PathBuf,
    pub user_agent: Option<String>,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            max_pages_per_domain: 12,
            max_depth: 2,
            page_timeout: Duration::from_millis(30_000),
            rate_limit_delay: Duration::from_secs(1),
            max_candidates: 5,
            concurrency: 1,
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            title_only_threshold: DEFAULT_TITLE_ONLY_THRESHOLD,
            classifier: ClassifierSettings::default(),
            cache_file: PathBuf::from("data/job_cache.json"),
            user_agent: None,
        }
    }
}

/// Everything a crawl needs, shared by all domains of a batch. The rate
/// limiter and the tracker are the only state mutated across domains.
pub struct CrawlContext {
    pub settings: CrawlSettings,
    pub fetcher: Arc<dyn PageFetcher>,
    pub rate_limiter: RateLimiter,
    pub tracker: Mutex<IncrementalTracker>,
    pub blocklist: DomainBlocklist,
    pub ats: AtsDetector,
    pub ats_client: AtsClient,
    pub pipeline: ExtractionPipeline,
    pub normalizer: Normalizer,
    pub classifier: RoleClassifier,
    pub events: EventBus,
    pub sink: Option<Arc<dyn JobSink>>,
}

impl CrawlContext {
    pub fn new(
        settings: CrawlSettings,
        fetcher: Arc<dyn PageFetcher>,
        tracker: IncrementalTracker,
        events: EventBus,
        sink: Option<Arc<dyn JobSink>>,
    ) -> Self {
        Self {
            rate_limiter: RateLimiter::new(settings.rate_limit_delay),
            classifier: RoleClassifier::new(settings.classifier.clone()),
            settings,
            fetcher,
            tracker: Mutex::new(tracker),
            blocklist: DomainBlocklist::default(),
            ats: AtsDetector::new(),
            ats_client: AtsClient::default(),
            pipeline: ExtractionPipeline::default(),
            normalizer: Normalizer,
            events,
            sink,
        }
    }

    /// Production context: HTTP fetcher and the on-disk job cache.
    pub fn from_settings(
        settings: CrawlSettings,
        events: EventBus,
        sink: Option<Arc<dyn JobSink>>,
    ) -> Result<Self, AppError> {
        let fetcher = HttpFetcher::new(settings.page_timeout, settings.user_agent.clone())?;
        let tracker = IncrementalTracker::load(settings.cache_file.clone());
        Ok(Self::new(settings, Arc::new(fetcher), tracker, events, sink))
    }

    pub fn tracker(&self) -> MutexGuard<'_, IncrementalTracker> {
        self.tracker.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub cancelled: bool,
    pub domains_total: usize,
    pub domains_with_jobs: usize,
    pub jobs_total: usize,
    pub domains: Vec<DomainReport>,
}

/// Crawl every target with bounded parallelism, then fold the completed
/// domains into the tracker and save it. Targets not started before the
/// stop signal are reported as skipped.
pub async fn run_batch(
    ctx: Arc<CrawlContext>,
    targets: Vec<CrawlTarget>,
    cancel: CancellationToken,
) -> BatchReport {
    let started_at = Utc::now();
    let concurrency = ctx.settings.concurrency.max(1);
    tracing::info!("Starting batch of {} domains, {concurrency} at a time", targets.len());

    let mut indexed: Vec<(usize, DomainReport)> = futures::stream::iter(targets.into_iter().enumerate())
        .map(|(idx, target)| {
            let ctx = ctx.clone();
            let cancel = cancel.clone();
            async move {
                if cancel.is_cancelled() {
                    return (idx, DomainReport::skipped(&target, "stop requested"));
                }
                let report = crawl_domain(&ctx, &target, &cancel).await;
                if let Some(sink) = &ctx.sink
                    && report.career_page.is_some()
                {
                    match sink.store_domain(&report).await {
                        Ok(stored) => tracing::debug!("Stored {stored} jobs for {}", report.domain),
                        Err(e) => tracing::error!("Failed to store jobs for {}: {e}", report.domain),
                    }
                }
                (idx, report)
            }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;
    indexed.sort_by_key(|(idx, _)| *idx);
    let mut domains: Vec<DomainReport> = indexed.into_iter().map(|(_, report)| report).collect();

    record_changes(&ctx, &mut domains);

    let report = BatchReport {
        started_at,
        finished_at: Utc::now(),
        cancelled: cancel.is_cancelled(),
        domains_total: domains.len(),
        domains_with_jobs: domains
            .iter()
            .filter(|d| d.outcome == CrawlOutcome::JobsFound)
            .count(),
        jobs_total: domains.iter().map(|d| d.jobs.len()).sum(),
        domains,
    };
    tracing::info!(
        "Batch finished: {} jobs across {}/{} domains{}",
        report.jobs_total,
        report.domains_with_jobs,
        report.domains_total,
        if report.cancelled { " (stopped early)" } else { "" }
    );
    report
}

/// Feed completed domains to the tracker, attach per-company changes and
/// trends, then persist the cache and roll it forward.
fn record_changes(ctx: &CrawlContext, domains: &mut [DomainReport]) {
    let mut tracker = ctx.tracker();
    for report in domains.iter().filter(|d| d.is_complete()) {
        tracker.mark_crawled(&report.company);
        for job in &report.jobs {
            tracker.add_job(&report.company, job);
        }
    }
    for report in domains.iter_mut().filter(|d| d.is_complete()) {
        let changes = tracker.get_changes(&report.company);
        let analysis = trend::analyze(&changes);
        if !changes.is_empty() {
            tracing::info!(
                "{}: {} new, {} removed, {} updated ({:?})",
                report.company,
                changes.new.len(),
                changes.removed.len(),
                changes.updated.len(),
                analysis.trend
            );
        }
        report.changes = Some(changes);
        report.trend = Some(analysis);
    }
    if let Err(e) = tracker.save() {
        tracing::error!("Failed to save job cache: {e}");
    }
    tracker.advance();
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::dedup::trend::Trend;
    use crate::crawler::fetch::tests::StubFetcher;

    const CAREERS: &str = r#"<html><body>
        <h2>Open Positions</h2>
        <div class="job-card"><h3>HubSpot CMS Hub Developer</h3><a href="/jobs/1">Apply</a></div>
    </body></html>"#;

    #[derive(Default)]
    struct CountingSink {
        stored: AtomicUsize,
    }

    #[async_trait]
    impl JobSink for CountingSink {
        async fn store_domain(&self, report: &DomainReport) -> Result<usize, AppError> {
            self.stored.fetch_add(report.jobs.len(), Ordering::SeqCst);
            Ok(report.jobs.len())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl JobSink for FailingSink {
        async fn store_domain(&self, _report: &DomainReport) -> Result<usize, AppError> {
            Err(AppError::Internal("store offline".into()))
        }
    }

    fn targets() -> Vec<CrawlTarget> {
        vec![
            CrawlTarget::from_website("https://acme.com", Some("Acme")).unwrap(),
            CrawlTarget::from_website("https://globex.com", Some("Globex")).unwrap(),
        ]
    }

    fn context(dir: &tempfile::TempDir, sink: Option<Arc<dyn JobSink>>) -> Arc<CrawlContext> {
        let fetcher = StubFetcher::new()
            .page("https://acme.com/", r#"<a href="/careers">Careers</a>"#)
            .page("https://acme.com/careers", CAREERS)
            .page("https://globex.com/", "<p>Nothing to see</p>");
        let settings = CrawlSettings {
            rate_limit_delay: Duration::ZERO,
            concurrency: 2,
            cache_file: dir.path().join("cache.json"),
            ..Default::default()
        };
        let tracker = IncrementalTracker::load(settings.cache_file.clone());
        Arc::new(CrawlContext::new(settings, Arc::new(fetcher), tracker, EventBus::default(), sink))
    }

    #[tokio::test]
    async fn test_batch_reports_in_input_order_and_saves_cache() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(CountingSink::default());
        let ctx = context(&dir, Some(sink.clone()));

        let report = run_batch(ctx.clone(), targets(), CancellationToken::new()).await;
        assert_eq!(report.domains_total, 2);
        assert_eq!(report.domains[0].company, "Acme");
        assert_eq!(report.domains[0].outcome, CrawlOutcome::JobsFound);
        assert_eq!(report.domains[1].outcome, CrawlOutcome::NoCareerPage);
        assert_eq!(report.jobs_total, 1);
        assert_eq!(sink.stored.load(Ordering::SeqCst), 1);

        let acme = &report.domains[0];
        assert_eq!(acme.changes.as_ref().unwrap().new.len(), 1);
        assert_eq!(acme.trend.as_ref().unwrap().trend, Trend::Stable);
        assert!(dir.path().join("cache.json").exists());
        assert_eq!(IncrementalTracker::load(dir.path().join("cache.json")).previous_len(), 1);
    }

    #[tokio::test]
    async fn test_batch_runs_on_spawned_task() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir, None);
        let handle = tokio::spawn(run_batch(ctx, targets(), CancellationToken::new()));
        let report = handle.await.unwrap();
        assert_eq!(report.domains_total, 2);
        assert_eq!(report.domains[0].outcome, CrawlOutcome::JobsFound);
    }

    #[tokio::test]
    async fn test_second_batch_sees_no_new_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir, None);
        run_batch(ctx.clone(), targets(), CancellationToken::new()).await;
        let again = run_batch(ctx, targets(), CancellationToken::new()).await;
        assert!(again.domains[0].changes.as_ref().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sink_errors_do_not_fail_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir, Some(Arc::new(FailingSink)));
        let report = run_batch(ctx, targets(), CancellationToken::new()).await;
        assert_eq!(report.jobs_total, 1);
    }

    #[tokio::test]
    async fn test_stopped_batch_skips_everything_and_keeps_cache() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir, None);
        run_batch(ctx.clone(), targets(), CancellationToken::new()).await;

        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = run_batch(ctx, targets(), cancel).await;
        assert!(report.cancelled);
        assert!(report.domains.iter().all(|d| d.outcome == CrawlOutcome::Skipped));
        assert!(report.domains.iter().all(|d| d.changes.is_none()));
        assert_eq!(IncrementalTracker::load(dir.path().join("cache.json")).previous_len(), 1);
    }
}
