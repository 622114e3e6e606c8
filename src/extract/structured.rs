use std::sync::LazyLock;

use scraper::Selector;
use serde_json::Value;

use super::{Extractor, Page, SeenJobs, clean_text, strip_html, truncate_chars};
use crate::error::ExtractError;
use crate::models::job::{JobSource, RawJob};

static LD_JSON: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).unwrap());

/// schema.org `JobPosting` objects in JSON-LD blocks.
pub struct StructuredDataExtractor;

impl Extractor for StructuredDataExtractor {
    fn name(&self) -> &'static str {
        "structured_data"
    }

    fn extract(&self, page: &Page<'_>) -> Result<Vec<RawJob>, ExtractError> {
        let mut jobs = Vec::new();
        let mut seen = SeenJobs::default();
        let mut parsed = 0;
        let mut last_error = None;

        for script in page.document.select(&LD_JSON) {
            let raw = script.text().collect::<String>();
            let value: Value = match serde_json::from_str(raw.trim()) {
                Ok(v) => v,
                Err(e) => {
                    tracing::debug!("Skipping malformed JSON-LD block on {}: {e}", page.url);
                    last_error = Some(e);
                    continue;
                }
            };
            parsed += 1;
            let mut postings = Vec::new();
            collect_postings(&value, &mut postings);
            for posting in postings {
                if let Some(job) = posting_to_job(posting, page) {
                    seen.push(&mut jobs, job);
                }
            }
        }

        // Only an error when nothing on the page was readable.
        if let Some(e) = last_error
            && parsed == 0
        {
            return Err(e.into());
        }
        Ok(jobs)
    }
}

fn is_job_posting(value: &Value) -> bool {
    match value.get("@type") {
        Some(Value::String(t)) => t == "JobPosting",
        Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some("JobPosting")),
        _ => false,
    }
}

fn collect_postings<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    match value {
        Value::Array(items) => items.iter().for_each(|item| collect_postings(item, out)),
        Value::Object(obj) => {
            if is_job_posting(value) {
                out.push(value);
            }
            if let Some(graph) = obj.get("@graph") {
                collect_postings(graph, out);
            }
            if let Some(list) = obj.get("itemListElement") {
                collect_postings(list, out);
            }
            if let Some(item) = obj.get("item") {
                collect_postings(item, out);
            }
        }
        _ => {}
    }
}

fn text_of(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(clean_text(s)).filter(|s| !s.is_empty()),
        Value::Object(obj) => text_of(obj.get("name")),
        _ => None,
    }
}

fn location_of(posting: &Value) -> Option<String> {
    if posting
        .get("jobLocationType")
        .and_then(|t| t.as_str())
        .is_some_and(|t| t.eq_ignore_ascii_case("TELECOMMUTE"))
    {
        return Some("Remote".to_string());
    }
    let location = match posting.get("jobLocation")? {
        Value::Array(items) => items.first()?,
        other => other,
    };
    if let Some(name) = location.as_str() {
        return Some(clean_text(name));
    }
    match location.get("address") {
        Some(Value::String(address)) => Some(clean_text(address)),
        Some(address) => {
            let parts: Vec<String> = ["addressLocality", "addressRegion", "addressCountry"]
                .iter()
                .filter_map(|key| text_of(address.get(*key)))
                .collect();
            if parts.is_empty() {
                text_of(location.get("name"))
            } else {
                Some(parts.join(", "))
            }
        }
        None => text_of(location.get("name")),
    }
}

fn posting_to_job(posting: &Value, page: &Page<'_>) -> Option<RawJob> {
    let title = text_of(posting.get("title")).or_else(|| text_of(posting.get("name")))?;
    let mut job = RawJob::new(title, JobSource::StructuredData);
    job.url = ["url", "directApplyUrl"]
        .iter()
        .filter_map(|key| posting.get(*key).and_then(|v| v.as_str()))
        .chain(
            posting
                .get("jobLocation")
                .and_then(|l| l.get("url"))
                .and_then(|v| v.as_str()),
        )
        .find_map(|href| page.resolve(href));
    job.summary = posting
        .get("description")
        .and_then(|d| d.as_str())
        .map(|d| truncate_chars(&clean_text(&strip_html(d)), 500))
        .unwrap_or_default();
    job.location = location_of(posting);
    job.posted_at = posting
        .get("datePosted")
        .and_then(|d| d.as_str())
        .map(String::from);
    Some(job)
}
