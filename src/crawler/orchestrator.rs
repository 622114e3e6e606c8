use std::collections::HashSet;

use scraper::Html;
use serde::Serialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::CrawlContext;
use super::career::{career_links, content_suggests_careers, is_career_url};
use crate::ats::AtsProvider;
use crate::dedup::Deduplicator;
use crate::dedup::trend::TrendReport;
use crate::dedup::tracker::JobChanges;
use crate::events::{CrawlEvent, EventKind, EventLevel};
use crate::extract::visible_text;
use crate::filters::robots::RobotsPolicy;
use crate::filters::{bare_host, is_internal, normalize_url};
use crate::models::job::{RawJob, ScoredJob};
use crate::models::target::CrawlTarget;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlOutcome {
    JobsFound,
    NoJobs,
    NoCareerPage,
    LimitReached,
    Failed,
    Skipped,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Visited,
    CareerPage,
    FetchFailed,
    RedirectedAway,
}

#[derive(Debug, Clone, Serialize)]
pub struct NavigationStep {
    pub url: String,
    pub depth: usize,
    pub kind: StepKind,
    pub note: Option<String>,
}

/// One fetched page, owned by the step that fetched it.
#[derive(Debug)]
pub struct PageFetchResult {
    pub url: Url,
    pub html: String,
    pub depth: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DomainReport {
    pub company: String,
    pub domain: String,
    pub root_url: String,
    pub outcome: CrawlOutcome,
    pub reason: String,
    pub career_page: Option<String>,
    pub ats_provider: Option<AtsProvider>,
    pub pages_visited: usize,
    pub trail: Vec<NavigationStep>,
    pub jobs: Vec<ScoredJob>,
    pub changes: Option<JobChanges>,
    pub trend: Option<TrendReport>,
}

impl DomainReport {
    fn new(target: &CrawlTarget) -> Self {
        Self {
            company: target.company_name.clone(),
            domain: target.host(),
            root_url: target.root_url.clone(),
            outcome: CrawlOutcome::NoCareerPage,
            reason: String::new(),
            career_page: None,
            ats_provider: None,
            pages_visited: 0,
            trail: Vec::new(),
            jobs: Vec::new(),
            changes: None,
            trend: None,
        }
    }

    /// Report for a domain the batch never started.
    pub fn skipped(target: &CrawlTarget, reason: &str) -> Self {
        let mut report = Self::new(target);
        report.outcome = CrawlOutcome::Skipped;
        report.reason = reason.to_string();
        report
    }

    /// Only completed crawls may replace what the tracker remembers.
    pub fn is_complete(&self) -> bool {
        matches!(
            self.outcome,
            CrawlOutcome::JobsFound
                | CrawlOutcome::NoJobs
                | CrawlOutcome::NoCareerPage
                | CrawlOutcome::LimitReached
        )
    }

    fn finish(&mut self, outcome: CrawlOutcome, reason: impl Into<String>) {
        self.outcome = outcome;
        self.reason = reason.into();
    }

    fn step(&mut self, url: &str, depth: usize, kind: StepKind, note: Option<String>) {
        self.trail.push(NavigationStep {
            url: url.to_string(),
            depth,
            kind,
            note,
        });
    }
}

/// What a fetched page tells us, computed before any further await since
/// the parsed document cannot be held across one.
struct PageAnalysis {
    career_reason: Option<&'static str>,
    provider: Option<AtsProvider>,
    token: Option<String>,
    page_text: String,
    candidates: Vec<String>,
}

fn analyze_page(ctx: &CrawlContext, page: &PageFetchResult) -> PageAnalysis {
    let document = Html::parse_document(&page.html);
    let url = page.url.as_str();
    let page_text = visible_text(&document);
    let provider = ctx
        .ats
        .detect_from_url(url)
        .or_else(|| ctx.ats.detect_document(&document, &page.html));

    let career_reason = if is_career_url(url) {
        Some("career url")
    } else if ctx.ats.is_allowed_redirect(url) {
        Some("ats host")
    } else if provider.is_some() {
        Some("ats signature")
    } else if content_suggests_careers(&page_text) {
        Some("career content")
    } else {
        None
    };

    let token = provider.and_then(|p| ctx.ats.board_token(p, url, &page.html));
    let candidates = if career_reason.is_none() {
        career_links(&document, &page.url)
    } else {
        Vec::new()
    };

    PageAnalysis {
        career_reason,
        provider,
        token,
        page_text,
        candidates,
    }
}

/// Why a frontier URL was dropped without a fetch, if it was.
async fn reject_reason(
    ctx: &CrawlContext,
    robots: &mut RobotsPolicy,
    url: &str,
    root_host: &str,
) -> Option<&'static str> {
    if ctx.blocklist.is_blocked(url) {
        return Some("blocked domain");
    }
    if !is_internal(url, root_host) {
        if ctx.ats.is_banned_redirect(url) {
            return Some("banned redirect");
        }
        if !ctx.ats.is_allowed_redirect(url) {
            return Some("off domain");
        }
    }
    if !robots.allows(&*ctx.fetcher, url).await {
        return Some("robots.txt");
    }
    None
}

/// Walk one company site until the first career page, the page cap, or the
/// stop signal. Fetches are sequential and depth-first; candidates of one
/// page are visited in rank order.
pub async fn crawl_domain(
    ctx: &CrawlContext,
    target: &CrawlTarget,
    cancel: &CancellationToken,
) -> DomainReport {
    let mut report = DomainReport::new(target);
    if cancel.is_cancelled() {
        report.finish(CrawlOutcome::Skipped, "stopped before start");
        return report;
    }

    let domain = report.domain.clone();
    ctx.events.emit(CrawlEvent::new(
        EventKind::DomainStarted,
        Some(domain.as_str()),
        format!("Crawling {} ({})", target.company_name, target.root_url),
    ));

    let Some(root) = normalize_url(&target.root_url) else {
        report.finish(CrawlOutcome::Failed, "invalid root url");
        finish_event(ctx, &report);
        return report;
    };

    let settings = &ctx.settings;
    let mut visited: HashSet<String> = HashSet::new();
    let mut robots = RobotsPolicy::new();
    let mut frontier = vec![(root.clone(), 0usize)];
    let mut limit_hit = false;
    let mut ended = false;

    while let Some((url, depth)) = frontier.pop() {
        if cancel.is_cancelled() {
            report.finish(CrawlOutcome::Cancelled, "stop requested");
            ended = true;
            break;
        }
        if visited.contains(&url) {
            continue;
        }
        if let Some(reason) = reject_reason(ctx, &mut robots, &url, &domain).await {
            tracing::debug!("Skipping {url}: {reason}");
            continue;
        }
        if visited.len() >= settings.max_pages_per_domain {
            tracing::debug!("{domain}: page cap {} reached", settings.max_pages_per_domain);
            limit_hit = true;
            break;
        }
        visited.insert(url.clone());

        let host = bare_host(&url).unwrap_or_else(|| domain.clone());
        if !ctx.rate_limiter.wait(&host, cancel).await {
            report.finish(CrawlOutcome::Cancelled, "stop requested");
            ended = true;
            break;
        }

        tracing::debug!("{domain}: fetching {url} at depth {depth}");
        let fetched = match ctx.fetcher.fetch(&url).await {
            Ok(page) => {
                ctx.rate_limiter.record_success(&host);
                page
            }
            Err(e) => {
                ctx.rate_limiter.record_failure(&host);
                ctx.events.emit(
                    CrawlEvent::new(EventKind::Error, Some(domain.as_str()), format!("Failed to fetch {url}: {e}"))
                        .with_level(if url == root { EventLevel::Error } else { EventLevel::Warning })
                        .with_metadata(json!({ "url": url, "depth": depth })),
                );
                report.step(&url, depth, StepKind::FetchFailed, Some(e.to_string()));
                if url == root {
                    report.finish(CrawlOutcome::Failed, format!("root page unreachable: {e}"));
                    ended = true;
                    break;
                }
                continue;
            }
        };

        let final_url = normalize_url(&fetched.final_url).unwrap_or_else(|| url.clone());
        if final_url != url {
            let away = ctx.blocklist.is_blocked(&final_url)
                || (!is_internal(&final_url, &domain) && !ctx.ats.is_allowed_redirect(&final_url));
            if away {
                tracing::debug!("{url} redirected off site to {final_url}");
                report.step(&url, depth, StepKind::RedirectedAway, Some(final_url));
                continue;
            }
            if visited.len() < settings.max_pages_per_domain {
                visited.insert(final_url.clone());
            }
        }
        let Ok(page_url) = Url::parse(&final_url) else {
            continue;
        };
        let page = PageFetchResult {
            url: page_url,
            html: fetched.body,
            depth,
        };

        let analysis = analyze_page(ctx, &page);
        if let Some(reason) = analysis.career_reason {
            report.step(page.url.as_str(), depth, StepKind::CareerPage, Some(reason.to_string()));
            extract_career_page(ctx, &mut report, &page, analysis).await;
            ended = true;
            break;
        }

        report.step(page.url.as_str(), depth, StepKind::Visited, None);
        let candidates: Vec<String> = analysis
            .candidates
            .into_iter()
            .filter(|c| !visited.contains(c))
            .take(settings.max_candidates)
            .collect();
        if candidates.is_empty() {
            continue;
        }
        if depth >= settings.max_depth {
            tracing::debug!("{domain}: depth limit at {}, {} candidates dropped", page.url, candidates.len());
            limit_hit = true;
            continue;
        }
        // Reversed so the best-ranked candidate is popped first.
        for candidate in candidates.into_iter().rev() {
            frontier.push((candidate, depth + 1));
        }
    }

    report.pages_visited = visited.len();
    if !ended {
        if limit_hit {
            report.finish(CrawlOutcome::LimitReached, "crawl limits reached before a career page");
        } else {
            report.finish(CrawlOutcome::NoCareerPage, "no career page found");
        }
    }
    finish_event(ctx, &report);
    report
}

async fn extract_career_page(
    ctx: &CrawlContext,
    report: &mut DomainReport,
    page: &PageFetchResult,
    analysis: PageAnalysis,
) {
    let domain = report.domain.clone();
    let url = page.url.as_str();
    report.career_page = Some(url.to_string());
    report.ats_provider = analysis.provider;
    ctx.events.emit(
        CrawlEvent::new(EventKind::CareerPageFound, Some(domain.as_str()), format!("Career page {url}"))
            .with_metadata(json!({
                "url": url,
                "depth": page.depth,
                "ats": analysis.provider.map(|p| p.as_str()),
            })),
    );

    let mut from_board = false;
    let mut no_openings = false;
    let raw_jobs: Vec<RawJob> = match (analysis.provider, analysis.token.as_deref()) {
        (Some(provider), Some(token)) if ctx.ats_client.supports(provider) => {
            match ctx.ats_client.fetch_jobs(&*ctx.fetcher, provider, token).await {
                Ok(jobs) => {
                    from_board = true;
                    jobs
                }
                Err(e) => {
                    tracing::warn!("{provider} board for {domain} failed, extracting from page: {e}");
                    let outcome = ctx.pipeline.run(&page.url, &page.html);
                    no_openings = outcome.no_jobs;
                    outcome.jobs
                }
            }
        }
        (Some(provider), _) => {
            tracing::info!("{provider} detected on {url} without a usable board, extracting from page");
            let outcome = ctx.pipeline.run(&page.url, &page.html);
            no_openings = outcome.no_jobs;
            outcome.jobs
        }
        (None, _) => {
            let outcome = ctx.pipeline.run(&page.url, &page.html);
            no_openings = outcome.no_jobs;
            outcome.jobs
        }
    };

    let extracted = raw_jobs.len();
    let mut dedup = Deduplicator::new(ctx.settings.fuzzy_threshold, ctx.settings.title_only_threshold);
    let mut duplicates = 0;
    for raw in &raw_jobs {
        let job = ctx.normalizer.normalize(raw, &analysis.page_text);
        if dedup.is_duplicate(&job, true) {
            duplicates += 1;
            continue;
        }
        // A board posting with its own description is scored on that alone.
        let scoring_text = if from_board && !job.summary.is_empty() {
            ""
        } else {
            analysis.page_text.as_str()
        };
        let Some(scored) = ctx.classifier.classify_and_score(scoring_text, job, url) else {
            continue;
        };
        ctx.events.emit(
            CrawlEvent::new(
                EventKind::JobExtracted,
                Some(domain.as_str()),
                format!("{} ({}, score {})", scored.job.title, scored.role, scored.score),
            )
            .with_metadata(json!({
                "title": scored.job.title,
                "url": scored.effective_url(),
                "role": scored.role,
                "score": scored.score,
                "source": raw.source.to_string(),
            })),
        );
        report.jobs.push(scored);
    }

    tracing::info!(
        "{domain}: {extracted} extracted, {duplicates} duplicates, {} retained from {url}",
        report.jobs.len()
    );
    if !report.jobs.is_empty() {
        report.finish(CrawlOutcome::JobsFound, format!("{} jobs on {url}", report.jobs.len()));
    } else if no_openings {
        report.finish(CrawlOutcome::NoJobs, "career page reports no openings");
    } else if extracted == 0 {
        report.finish(CrawlOutcome::NoJobs, "no postings found on career page");
    } else {
        report.finish(CrawlOutcome::NoJobs, "no postings matched the role model");
    }
}

fn finish_event(ctx: &CrawlContext, report: &DomainReport) {
    let level = match report.outcome {
        CrawlOutcome::Failed => EventLevel::Error,
        _ => EventLevel::Info,
    };
    ctx.events.emit(
        CrawlEvent::new(
            EventKind::DomainFinished,
            Some(report.domain.as_str()),
            format!("{} jobs, {}", report.jobs.len(), report.reason),
        )
        .with_level(level)
        .with_metadata(json!({
            "outcome": report.outcome,
            "pages_visited": report.pages_visited,
            "career_page": report.career_page,
        })),
    );
}
