use std::sync::LazyLock;

use scraper::{ElementRef, Selector};

use super::{Extractor, Page, SeenJobs, clean_text, element_text, truncate_chars};
use crate::error::ExtractError;
use crate::models::job::{JobSource, RawJob};

static MICRODATA_SCOPE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"[itemscope][itemtype*="JobPosting"]"#).unwrap());
static META: LazyLock<Selector> = LazyLock::new(|| Selector::parse("meta").unwrap());

/// Microdata, OpenGraph job objects and job-specific meta tags.
pub struct MetadataExtractor;

impl Extractor for MetadataExtractor {
    fn name(&self) -> &'static str {
        "enhanced_metadata"
    }

    fn extract(&self, page: &Page<'_>) -> Result<Vec<RawJob>, ExtractError> {
        let mut jobs = Vec::new();
        let mut seen = SeenJobs::default();

        for scope in page.document.select(&MICRODATA_SCOPE) {
            if let Some(job) = microdata_job(&scope, page) {
                seen.push(&mut jobs, job);
            }
        }

        let meta = MetaTags::collect(page);
        if let Some(job) = open_graph_job(&meta, page) {
            seen.push(&mut jobs, job);
        }
        if let Some(job) = meta_tag_job(&meta, page) {
            seen.push(&mut jobs, job);
        }
        Ok(jobs)
    }
}

fn itemprop<'a>(scope: &ElementRef<'a>, name: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(&format!(r#"[itemprop="{name}"]"#)).ok()?;
    scope.select(&selector).next()
}

/// `content` beats `href` beats visible text.
fn prop_value(el: &ElementRef) -> Option<String> {
    let value = el
        .value()
        .attr("content")
        .or_else(|| el.value().attr("href"))
        .map(clean_text)
        .unwrap_or_else(|| element_text(el));
    Some(value).filter(|v| !v.is_empty())
}

fn microdata_location(scope: &ElementRef) -> Option<String> {
    let location = itemprop(scope, "jobLocation")?;
    if location.value().attr("itemscope").is_none() {
        return prop_value(&location);
    }
    let parts: Vec<String> = ["addressLocality", "addressRegion", "addressCountry"]
        .iter()
        .filter_map(|name| itemprop(&location, name))
        .filter_map(|el| prop_value(&el))
        .collect();
    if parts.is_empty() {
        prop_value(&location)
    } else {
        Some(parts.join(", "))
    }
}

fn microdata_job(scope: &ElementRef, page: &Page<'_>) -> Option<RawJob> {
    let title = itemprop(scope, "title")
        .or_else(|| itemprop(scope, "name"))
        .and_then(|el| prop_value(&el))?;
    let mut job = RawJob::new(title, JobSource::Microdata);
    job.url = itemprop(scope, "url")
        .and_then(|el| prop_value(&el))
        .and_then(|href| page.resolve(&href));
    job.summary = itemprop(scope, "description")
        .and_then(|el| prop_value(&el))
        .map(|d| truncate_chars(&d, 500))
        .unwrap_or_default();
    job.location = microdata_location(scope);
    job.posted_at = itemprop(scope, "datePosted").and_then(|el| prop_value(&el));
    Some(job)
}

/// `<meta>` values keyed by lowercase `property` or `name`.
struct MetaTags(Vec<(String, String)>);

impl MetaTags {
    fn collect(page: &Page<'_>) -> Self {
        let pairs = page
            .document
            .select(&META)
            .filter_map(|el| {
                let key = el
                    .value()
                    .attr("property")
                    .or_else(|| el.value().attr("name"))?;
                let content = el.value().attr("content")?;
                Some((key.trim().to_ascii_lowercase(), clean_text(content)))
            })
            .filter(|(_, content)| !content.is_empty())
            .collect();
        Self(pairs)
    }

    fn get(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .find_map(|key| self.0.iter().find(|(k, _)| k == key))
            .map(|(_, v)| v.as_str())
    }
}

fn open_graph_job(meta: &MetaTags, page: &Page<'_>) -> Option<RawJob> {
    if !meta.get(&["og:type"])?.eq_ignore_ascii_case("job") {
        return None;
    }
    let title = meta.get(&["job:title", "og:title"])?;
    let mut job = RawJob::new(title, JobSource::OpenGraph);
    job.url = meta
        .get(&["og:url"])
        .and_then(|href| page.resolve(href))
        .or_else(|| Some(page.url.to_string()));
    job.summary = meta
        .get(&["og:description"])
        .map(|d| truncate_chars(d, 500))
        .unwrap_or_default();
    job.location = meta.get(&["job:location"]).map(String::from);
    Some(job)
}

fn meta_tag_job(meta: &MetaTags, page: &Page<'_>) -> Option<RawJob> {
    let title = meta.get(&["job_title", "jobtitle", "job-title"])?;
    let mut job = RawJob::new(title, JobSource::MetaTags);
    job.url = meta
        .get(&["job_url", "job-url"])
        .and_then(|href| page.resolve(href))
        .or_else(|| Some(page.url.to_string()));
    job.summary = meta
        .get(&["job_description", "job-description"])
        .map(|d| truncate_chars(d, 500))
        .unwrap_or_default();
    job.location = meta.get(&["job_location", "job-location"]).map(String::from);
    Some(job)
}
