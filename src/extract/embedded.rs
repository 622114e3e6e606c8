use std::sync::LazyLock;

use regex::Regex;
use scraper::{Node, Selector};
use serde_json::Value;

use super::{Extractor, Page, SeenJobs, clean_text, strip_html, truncate_chars};
use crate::error::ExtractError;
use crate::models::job::{JobSource, RawJob};

static NEXT_DATA: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("script#__NEXT_DATA__").unwrap());
static INLINE_SCRIPT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("script:not([src])").unwrap());
static APOLLO_STATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"window\.__APOLLO_STATE__\s*=\s*").unwrap());
static JOB_ARRAYS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:window\.(?:jobData|jobs|jobListings)|(?:var|let|const)\s+jobListings)\s*=\s*").unwrap()
});

const JOB_ARRAY_KEYS: &[&str] = &["jobs", "positions", "openings", "postings", "jobPostings"];
const MAX_DEPTH: usize = 6;

/// Job objects in hydration payloads, GraphQL caches, inline `window.*`
/// assignments and JSON comments.
pub struct EmbeddedJsonExtractor;

impl Extractor for EmbeddedJsonExtractor {
    fn name(&self) -> &'static str {
        "embedded_json"
    }

    fn extract(&self, page: &Page<'_>) -> Result<Vec<RawJob>, ExtractError> {
        let mut jobs = Vec::new();
        let mut seen = SeenJobs::default();

        if let Some(script) = page.document.select(&NEXT_DATA).next() {
            let raw = script.text().collect::<String>();
            let data: Value = serde_json::from_str(raw.trim())?;
            if let Some(props) = data.pointer("/props/pageProps") {
                let mut found = Vec::new();
                find_job_arrays(props, 0, &mut found);
                push_objects(&found, page, &mut seen, &mut jobs);
            }
        }

        for script in page.document.select(&INLINE_SCRIPT) {
            let body = script.text().collect::<String>();

            if let Some(m) = APOLLO_STATE.find(&body)
                && let Some(state) = parse_json_prefix(&body[m.end()..])
                && let Some(entries) = state.as_object()
            {
                let postings: Vec<&Value> = entries
                    .values()
                    .filter(|v| {
                        v.get("__typename")
                            .and_then(|t| t.as_str())
                            .is_some_and(|t| t.contains("Job"))
                    })
                    .collect();
                push_objects(&postings, page, &mut seen, &mut jobs);
            }

            for m in JOB_ARRAYS.find_iter(&body) {
                let Some(value) = parse_json_prefix(&body[m.end()..]) else {
                    continue;
                };
                let mut found = Vec::new();
                match &value {
                    Value::Array(items) => found.extend(items.iter()),
                    other => find_job_arrays(other, 0, &mut found),
                }
                push_objects(&found, page, &mut seen, &mut jobs);
            }
        }

        for node in page.document.tree.nodes() {
            let Node::Comment(comment) = node.value() else {
                continue;
            };
            let text: &str = comment;
            if !text.contains("jobs") {
                continue;
            }
            let Some(start) = text.find('{') else {
                continue;
            };
            if let Some(value) = parse_json_prefix(&text[start..]) {
                let mut found = Vec::new();
                find_job_arrays(&value, 0, &mut found);
                push_objects(&found, page, &mut seen, &mut jobs);
            }
        }

        Ok(jobs)
    }
}

fn push_objects(objects: &[&Value], page: &Page<'_>, seen: &mut SeenJobs, jobs: &mut Vec<RawJob>) {
    for object in objects {
        if let Some(job) = job_from_object(object, page) {
            seen.push(jobs, job);
        }
    }
}

/// Parse the first JSON value at the start of `s`, ignoring whatever
/// JavaScript follows it.
fn parse_json_prefix(s: &str) -> Option<Value> {
    serde_json::Deserializer::from_str(s.trim_start())
        .into_iter::<Value>()
        .next()?
        .ok()
}

/// Objects inside arrays stored under job-ish keys, searched a few levels
/// deep.
fn find_job_arrays<'a>(value: &'a Value, depth: usize, out: &mut Vec<&'a Value>) {
    if depth > MAX_DEPTH {
        return;
    }
    match value {
        Value::Object(obj) => {
            for (key, child) in obj {
                if JOB_ARRAY_KEYS.contains(&key.as_str())
                    && let Value::Array(items) = child
                {
                    out.extend(items.iter().filter(|item| item.is_object()));
                } else {
                    find_job_arrays(child, depth + 1, out);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                find_job_arrays(item, depth + 1, out);
            }
        }
        _ => {}
    }
}

fn first_str<'a>(object: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find_map(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.as_str()),
            Value::Object(inner) => inner
                .get("name")
                .or_else(|| inner.get("city"))
                .and_then(|n| n.as_str()),
            _ => None,
        })
}

fn job_from_object(object: &Value, page: &Page<'_>) -> Option<RawJob> {
    let title = clean_text(first_str(object, &["title", "name", "position"])?);
    if title.is_empty() {
        return None;
    }
    let mut job = RawJob::new(title, JobSource::EmbeddedJson);
    job.url = first_str(object, &["url", "link", "applyUrl", "absolute_url", "hostedUrl"])
        .and_then(|href| page.resolve(href));
    job.summary = first_str(object, &["description", "summary", "content"])
        .map(|d| truncate_chars(&clean_text(&strip_html(d)), 500))
        .unwrap_or_default();
    job.location = first_str(object, &["location", "office", "city"]).map(clean_text);
    Some(job)
}

#[cfg(test)]
mod tests {
    use scraper::Html;
    use url::Url;

    use super::*;

    fn run(html: &str) -> Result<Vec<RawJob>, ExtractError> {
        let url = Url::parse("https://acme.com/careers").unwrap();
        let doc = Html::parse_document(html);
        EmbeddedJsonExtractor.extract(&Page::new(&url, html, &doc))
    }

    #[test]
    fn test_next_data_jobs() {
        let html = r#"<script id="__NEXT_DATA__" type="application/json">
            {"props":{"pageProps":{"initialData":{"jobs":[
                {"title":"HubSpot Developer","url":"/jobs/1","location":{"name":"Remote"}},
                {"title":"RevOps Consultant","applyUrl":"https://acme.com/jobs/2"}]}}}}
        </script>"#;
        let jobs = run(html).unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].url.as_deref(), Some("https://acme.com/jobs/1"));
        assert_eq!(jobs[0].location.as_deref(), Some("Remote"));
    }

    #[test]
    fn test_apollo_state() {
        let html = r#"<script>window.__APOLLO_STATE__ = {
            "JobPosting:1": {"__typename":"JobPosting","title":"Solutions Architect","url":"/j/1"},
            "Company:1": {"__typename":"Company","name":"Acme"}
        }; window.other = 1;</script>"#;
        let jobs = run(html).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].title, "Solutions Architect");
    }

    #[test]
    fn test_window_arrays_and_var() {
        let html = r#"<script>
            window.jobs = [{"name":"Engineer","link":"/e"}];
            var jobListings = [{"position":"Designer","office":"NYC"}];
        </script>"#;
        let jobs = run(html).unwrap();
        let titles: Vec<_> = jobs.iter().map(|j| j.title.as_str()).collect();
        assert_eq!(titles, vec!["Engineer", "Designer"]);
        assert_eq!(jobs[1].location.as_deref(), Some("NYC"));
    }

    #[test]
    fn test_json_comment() {
        let html = r#"<body><!-- {"jobs":[{"title":"Data Analyst"}]} --><p>Hi</p></body>"#;
        let jobs = run(html).unwrap();
        assert_eq!(jobs.len(), 1);
    }

    #[test]
    fn test_malformed_next_data_is_an_error() {
        let html = r#"<script id="__NEXT_DATA__">{"props":</script>"#;
        assert!(run(html).is_err());
    }

    #[test]
    fn test_parse_json_prefix_ignores_trailing_script() {
        let value = parse_json_prefix(r#" [1, 2]; doSomething();"#).unwrap();
        assert_eq!(value, serde_json::json!([1, 2]));
        assert!(parse_json_prefix("not json").is_none());
    }
}
