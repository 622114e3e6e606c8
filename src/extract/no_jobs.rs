use std::sync::LazyLock;

use scraper::{Html, Selector};

use super::visible_text;

const NO_OPENINGS: &[&str] = &[
    "no open positions",
    "no current openings",
    "no positions available",
    "no jobs available",
    "currently no openings",
    "not hiring at this time",
    "check back later",
    "no active job postings",
    "we don't have any open positions",
    "there are currently no",
    "we're not currently hiring",
    "no opportunities at this time",
];

const PLACEHOLDERS: &[&str] = &["coming soon", "check back soon", "stay tuned", "be the first to know"];

const EMPTY_COUNTS: &[&str] = &["0 jobs", "0 openings"];

static EMPTY_MARKERS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".no-jobs, .empty-jobs, #no-openings").unwrap());

/// Recognises career pages that say there is nothing to apply for.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoJobsDetector;

impl NoJobsDetector {
    /// The phrase or marker that identified an empty page, if any.
    pub fn detect(&self, document: &Html) -> Option<String> {
        let text = visible_text(document).to_lowercase().replace('’', "'");
        if let Some(phrase) = NO_OPENINGS.iter().find(|p| text.contains(*p)) {
            return Some(format!("phrase '{phrase}'"));
        }
        if let Some(phrase) = PLACEHOLDERS.iter().find(|p| text.contains(*p)) {
            return Some(format!("placeholder '{phrase}'"));
        }
        if document.select(&EMPTY_MARKERS).next().is_some() {
            return Some("empty job list marker".to_string());
        }
        let empty_count = document.root_element().text().any(|t| {
            let t = t.trim().to_lowercase();
            EMPTY_COUNTS.contains(&t.as_str())
        });
        if empty_count {
            return Some("zero job count".to_string());
        }
        None
    }
}
