use serde_json::Value;

use super::AtsProvider;
use crate::error::ExtractError;
use crate::extract::{clean_text, strip_html, truncate_chars};
use crate::models::job::{JobSource, RawJob};

const SUMMARY_LIMIT: usize = 500;

/// A provider's public job-board API: where to fetch and how to read it.
pub trait BoardApi: Send + Sync {
    fn provider(&self) -> AtsProvider;

    fn endpoint(&self, token: &str) -> String;

    fn parse(&self, body: &str) -> Result<Vec<RawJob>, ExtractError>;
}

fn str_field<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    path.iter()
        .try_fold(value, |v, key| v.get(*key))
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn summary_from_html(raw: Option<&str>) -> String {
    raw.map(|html| truncate_chars(&clean_text(&strip_html(&unescape_entities(html))), SUMMARY_LIMIT))
        .unwrap_or_default()
}

/// Greenhouse returns job content HTML-escaped.
fn unescape_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

fn build(
    provider: AtsProvider,
    title: Option<&str>,
    url: Option<&str>,
    summary: String,
    location: Option<&str>,
    posted_at: Option<&str>,
) -> Option<RawJob> {
    let title = clean_text(title?);
    if title.is_empty() {
        return None;
    }
    let mut job = RawJob::new(title, JobSource::Ats(provider));
    job.url = url.map(String::from);
    job.summary = summary;
    job.location = location.map(clean_text).filter(|l| !l.is_empty());
    job.posted_at = posted_at.map(String::from);
    Some(job)
}

pub struct Greenhouse;

impl BoardApi for Greenhouse {
    fn provider(&self) -> AtsProvider {
        AtsProvider::Greenhouse
    }

    fn endpoint(&self, token: &str) -> String {
        format!("https://boards-api.greenhouse.io/v1/boards/{token}/jobs?content=true")
    }

    fn parse(&self, body: &str) -> Result<Vec<RawJob>, ExtractError> {
        let value: Value = serde_json::from_str(body)?;
        let jobs = value
            .get("jobs")
            .and_then(|j| j.as_array())
            .ok_or_else(|| ExtractError::Shape("greenhouse response has no jobs array".into()))?;
        Ok(jobs
            .iter()
            .filter_map(|job| {
                build(
                    AtsProvider::Greenhouse,
                    str_field(job, &["title"]),
                    str_field(job, &["absolute_url"]),
                    summary_from_html(str_field(job, &["content"])),
                    str_field(job, &["location", "name"]),
                    str_field(job, &["updated_at"]),
                )
            })
            .collect())
    }
}

pub struct Lever;

impl BoardApi for Lever {
    fn provider(&self) -> AtsProvider {
        AtsProvider::Lever
    }

    fn endpoint(&self, token: &str) -> String {
        format!("https://api.lever.co/v0/postings/{token}?mode=json")
    }

    fn parse(&self, body: &str) -> Result<Vec<RawJob>, ExtractError> {
        let value: Value = serde_json::from_str(body)?;
        let postings = value
            .as_array()
            .ok_or_else(|| ExtractError::Shape("lever response is not an array".into()))?;
        Ok(postings
            .iter()
            .filter_map(|posting| {
                let summary = str_field(posting, &["descriptionPlain"])
                    .map(|plain| truncate_chars(&clean_text(plain), SUMMARY_LIMIT))
                    .unwrap_or_else(|| summary_from_html(str_field(posting, &["description"])));
                let posted_at = posting
                    .get("createdAt")
                    .and_then(|v| v.as_i64())
                    .and_then(chrono::DateTime::from_timestamp_millis)
                    .map(|dt| dt.to_rfc3339());
                build(
                    AtsProvider::Lever,
                    str_field(posting, &["text"]),
                    str_field(posting, &["hostedUrl"]),
                    summary,
                    str_field(posting, &["categories", "location"]),
                    posted_at.as_deref(),
                )
            })
            .collect())
    }
}

pub struct Workable;

impl BoardApi for Workable {
    fn provider(&self) -> AtsProvider {
        AtsProvider::Workable
    }

    fn endpoint(&self, token: &str) -> String {
        format!("https://apply.workable.com/api/v3/accounts/{token}/jobs")
    }

    fn parse(&self, body: &str) -> Result<Vec<RawJob>, ExtractError> {
        let value: Value = serde_json::from_str(body)?;
        let jobs = value
            .get("results")
            .or_else(|| value.get("jobs"))
            .and_then(|j| j.as_array())
            .ok_or_else(|| ExtractError::Shape("workable response has no jobs".into()))?;
        Ok(jobs
            .iter()
            .filter_map(|job| {
                let location = str_field(job, &["location", "city"])
                    .map(String::from)
                    .or_else(|| {
                        job.get("remote")
                            .and_then(|r| r.as_bool())
                            .filter(|remote| *remote)
                            .map(|_| "Remote".to_string())
                    });
                let url = str_field(job, &["url"]).map(String::from).or_else(|| {
                    str_field(job, &["shortcode"]).map(|code| format!("https://apply.workable.com/j/{code}"))
                });
                build(
                    AtsProvider::Workable,
                    str_field(job, &["title"]),
                    url.as_deref(),
                    summary_from_html(str_field(job, &["description"])),
                    location.as_deref(),
                    str_field(job, &["published"]),
                )
            })
            .collect())
    }
}

pub struct Ashby;

impl BoardApi for Ashby {
    fn provider(&self) -> AtsProvider {
        AtsProvider::Ashby
    }

    fn endpoint(&self, token: &str) -> String {
        format!("https://api.ashbyhq.com/posting-api/job-board/{token}")
    }

    fn parse(&self, body: &str) -> Result<Vec<RawJob>, ExtractError> {
        let value: Value = serde_json::from_str(body)?;
        let jobs = value
            .get("jobs")
            .and_then(|j| j.as_array())
            .ok_or_else(|| ExtractError::Shape("ashby response has no jobs array".into()))?;
        Ok(jobs
            .iter()
            .filter(|job| job.get("isListed").and_then(|l| l.as_bool()).unwrap_or(true))
            .filter_map(|job| {
                let summary = str_field(job, &["descriptionPlain"])
                    .map(|plain| truncate_chars(&clean_text(plain), SUMMARY_LIMIT))
                    .unwrap_or_else(|| summary_from_html(str_field(job, &["descriptionHtml"])));
                let location = if job.get("isRemote").and_then(|r| r.as_bool()).unwrap_or(false) {
                    Some("Remote")
                } else {
                    str_field(job, &["location"])
                };
                build(
                    AtsProvider::Ashby,
                    str_field(job, &["title"]),
                    str_field(job, &["jobUrl"]),
                    summary,
                    location,
                    str_field(job, &["publishedAt"]),
                )
            })
            .collect())
    }
}
