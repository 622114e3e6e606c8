// Layered extraction: every strategy runs on every career page and the
// results are unioned. A failing strategy contributes nothing and never
// stops its siblings.

pub mod cms;
pub mod dom;
pub mod embedded;
pub mod metadata;
pub mod no_jobs;
pub mod structured;

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node};
use serde::Serialize;
use url::Url;

use crate::error::ExtractError;
use crate::filters::resolve_href;
use crate::models::job::RawJob;
use no_jobs::NoJobsDetector;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// A parsed page handed to each extractor.
pub struct Page<'a> {
    pub url: &'a Url,
    pub html: &'a str,
    pub document: &'a Html,
}

impl<'a> Page<'a> {
    pub fn new(url: &'a Url, html: &'a str, document: &'a Html) -> Self {
        Self { url, html, document }
    }

    pub fn resolve(&self, href: &str) -> Option<String> {
        resolve_href(self.url, href)
    }
}

pub trait Extractor: Send + Sync {
    fn name(&self) -> &'static str;

    fn extract(&self, page: &Page<'_>) -> Result<Vec<RawJob>, ExtractError>;
}

/// Within-call dedup on lowercase title plus URL.
#[derive(Debug, Default)]
pub struct SeenJobs {
    keys: HashSet<(String, Option<String>)>,
}

impl SeenJobs {
    pub fn insert(&mut self, job: &RawJob) -> bool {
        self.keys
            .insert((job.title.trim().to_lowercase(), job.url.clone()))
    }

    /// Pushes the job unless an identical title and URL were already seen.
    pub fn push(&mut self, jobs: &mut Vec<RawJob>, job: RawJob) {
        if self.insert(&job) {
            jobs.push(job);
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractorReport {
    pub extractor: &'static str,
    pub jobs: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineOutcome {
    pub jobs: Vec<RawJob>,
    pub no_jobs: bool,
    pub reports: Vec<ExtractorReport>,
}

pub struct ExtractionPipeline {
    extractors: Vec<Box<dyn Extractor>>,
    no_jobs: NoJobsDetector,
}

impl Default for ExtractionPipeline {
    fn default() -> Self {
        Self::new(vec![
            Box::new(structured::StructuredDataExtractor),
            Box::new(metadata::MetadataExtractor),
            Box::new(embedded::EmbeddedJsonExtractor),
            Box::new(cms::CmsExtractor),
            Box::new(dom::DomExtractor::default()),
        ])
    }
}

impl ExtractionPipeline {
    pub fn new(extractors: Vec<Box<dyn Extractor>>) -> Self {
        Self {
            extractors,
            no_jobs: NoJobsDetector,
        }
    }

    pub fn run(&self, url: &Url, html: &str) -> PipelineOutcome {
        let document = Html::parse_document(html);
        self.run_page(&Page::new(url, html, &document))
    }

    pub fn run_page(&self, page: &Page<'_>) -> PipelineOutcome {
        if let Some(reason) = self.no_jobs.detect(page.document) {
            tracing::info!("No openings on {}: {reason}", page.url);
            return PipelineOutcome {
                no_jobs: true,
                ..Default::default()
            };
        }

        let mut outcome = PipelineOutcome::default();
        for extractor in &self.extractors {
            match extractor.extract(page) {
                Ok(jobs) => {
                    tracing::debug!(
                        "Extractor {} found {} jobs on {}",
                        extractor.name(),
                        jobs.len(),
                        page.url
                    );
                    outcome.reports.push(ExtractorReport {
                        extractor: extractor.name(),
                        jobs: jobs.len(),
                        error: None,
                    });
                    outcome.jobs.extend(jobs);
                }
                Err(e) => {
                    tracing::warn!("Extractor {} failed on {}: {e}", extractor.name(), page.url);
                    outcome.reports.push(ExtractorReport {
                        extractor: extractor.name(),
                        jobs: 0,
                        error: Some(e.to_string()),
                    });
                }
            }
        }
        outcome
    }
}

/// Collapse runs of whitespace and trim.
pub fn clean_text(s: &str) -> String {
    WHITESPACE.replace_all(s.trim(), " ").into_owned()
}

pub fn element_text(el: &ElementRef) -> String {
    clean_text(&el.text().collect::<Vec<_>>().join(" "))
}

/// Text content of an HTML fragment.
pub fn strip_html(s: &str) -> String {
    if !s.contains('<') {
        return s.to_string();
    }
    let fragment = Html::parse_fragment(s);
    fragment.root_element().text().collect::<Vec<_>>().join(" ")
}

/// Truncate to at most `max` characters on a char boundary.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Human-visible page text: script, style and template bodies excluded.
pub fn visible_text(document: &Html) -> String {
    let mut parts = Vec::new();
    for node in document.tree.nodes() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|p| p.value().as_element().map(|el| el.name().to_string()))
            .is_some_and(|name| matches!(name.as_str(), "script" | "style" | "noscript" | "template"));
        if !hidden {
            parts.push(&**text);
        }
    }
    clean_text(&parts.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAREERS_PAGE: &str = r#"<html><body>
        <header><nav><a href="/about">About Us</a></nav></header>
        <main>
          <h2>Open Positions</h2>
          <div class="job-card"><h3>Senior HubSpot Developer</h3><a href="/jobs/1">Apply</a></div>
        </main>
        <footer><a href="https://facebook.com/acme">Facebook</a></footer>
    </body></html>"#;

    fn page_url() -> Url {
        Url::parse("https://acme.com/careers").unwrap()
    }

    #[test]
    fn test_pipeline_returns_only_the_job_card() {
        let outcome = ExtractionPipeline::default().run(&page_url(), CAREERS_PAGE);
        assert!(!outcome.no_jobs);
        assert_eq!(outcome.jobs.len(), 1, "{:?}", outcome.jobs);
        let job = &outcome.jobs[0];
        assert_eq!(job.title, "Senior HubSpot Developer");
        assert!(job.url.as_deref().unwrap().ends_with("/jobs/1"));
        assert!(outcome.jobs.iter().all(|j| j.title != "About Us"));
        assert!(
            outcome
                .jobs
                .iter()
                .all(|j| !j.url.as_deref().unwrap_or_default().contains("facebook"))
        );
    }

    #[test]
    fn test_pipeline_is_deterministic() {
        let pipeline = ExtractionPipeline::default();
        let first = pipeline.run(&page_url(), CAREERS_PAGE).jobs;
        let second = pipeline.run(&page_url(), CAREERS_PAGE).jobs;
        assert_eq!(first, second);
    }

    #[test]
    fn test_no_open_positions_short_circuits() {
        let html = r#"<body><h2>Careers</h2><p>There are no open positions right now.</p>
            <div class="job-card"><h3></h3></div>
            <div class="job-card"><h3>Senior HubSpot Developer</h3><a href="/jobs/1">Apply</a></div></body>"#;
        let outcome = ExtractionPipeline::default().run(&page_url(), html);
        assert!(outcome.no_jobs);
        assert!(outcome.jobs.is_empty());
    }

    #[test]
    fn test_navigation_only_page_yields_nothing() {
        let html = r#"<body>
            <header><a href="/careers/software-engineer">Software Engineer</a>
                    <a href="/careers/designer">Product Designer</a></header>
            <footer><a href="/careers/analyst">Data Analyst</a></footer>
        </body>"#;
        let outcome = ExtractionPipeline::default().run(&page_url(), html);
        assert!(outcome.jobs.is_empty(), "{:?}", outcome.jobs);
    }

    struct Failing;

    impl Extractor for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn extract(&self, _page: &Page<'_>) -> Result<Vec<RawJob>, ExtractError> {
            Err(ExtractError::Shape("boom".into()))
        }
    }

    #[test]
    fn test_failing_extractor_does_not_stop_siblings() {
        let pipeline = ExtractionPipeline::new(vec![
            Box::new(Failing),
            Box::new(dom::DomExtractor::default()),
        ]);
        let outcome = pipeline.run(&page_url(), CAREERS_PAGE);
        assert_eq!(outcome.jobs.len(), 1);
        assert_eq!(outcome.reports[0].error.as_deref(), Some("unexpected shape: boom"));
        assert_eq!(outcome.reports[1].jobs, 1);
    }

    #[test]
    fn test_text_helpers() {
        assert_eq!(clean_text("  a \n\t b  "), "a b");
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(clean_text(&strip_html("<p>Build <b>themes</b></p>")), "Build themes");
    }

    #[test]
    fn test_visible_text_skips_scripts() {
        let doc = Html::parse_document("<body><p>Hello</p><script>var jobs = [];</script></body>");
        assert_eq!(visible_text(&doc), "Hello");
    }
}
