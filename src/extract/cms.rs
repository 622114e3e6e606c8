use std::fmt;
use std::sync::LazyLock;

use scraper::{ElementRef, Selector};
use serde::{Deserialize, Serialize};

use super::{Extractor, Page, SeenJobs, element_text, truncate_chars};
use crate::error::ExtractError;
use crate::filters::content::should_extract;
use crate::models::job::{JobSource, RawJob};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CmsPlatform {
    Webflow,
    Hubspot,
    Wordpress,
    CraftCms,
}

impl fmt::Display for CmsPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CmsPlatform::Webflow => "webflow",
            CmsPlatform::Hubspot => "hubspot",
            CmsPlatform::Wordpress => "wordpress",
            CmsPlatform::CraftCms => "craftcms",
        })
    }
}

struct CmsPattern {
    platform: CmsPlatform,
    generator: &'static str,
    markers: &'static [&'static str],
    items: Selector,
    title: Selector,
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap()
}

static PATTERNS: LazyLock<Vec<CmsPattern>> = LazyLock::new(|| {
    vec![
        CmsPattern {
            platform: CmsPlatform::Webflow,
            generator: "webflow",
            markers: &["webflow"],
            items: selector(".collection-item, .w-dyn-item"),
            title: selector(r#"[class*="job-title"], [class*="position-title"]"#),
        },
        CmsPattern {
            platform: CmsPlatform::Hubspot,
            generator: "hubspot",
            markers: &["hs-scripts.com"],
            items: selector(r#".hs-job, .hs-career, [class*="hs-job-"], [class*="hs-career-"]"#),
            title: selector("h2, h3, h4"),
        },
        CmsPattern {
            platform: CmsPlatform::Wordpress,
            generator: "wordpress",
            markers: &["wp-content", "wp-includes"],
            items: selector(".job-listing, .career-post, .wp-job, .type-job_listing"),
            title: selector(".entry-title, h2, h3"),
        },
        CmsPattern {
            platform: CmsPlatform::CraftCms,
            generator: "craft",
            markers: &["craftcms", "data-craft"],
            items: selector(r#"[data-entry-type="job"]"#),
            title: selector("h2, h3, h4, .title"),
        },
    ]
});

static GENERATOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[name="generator"]"#).unwrap());
static LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static SUMMARY: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"[class*="description"], [class*="summary"], [class*="excerpt"]"#).unwrap()
});
static LOCATION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"[class*="location"]"#).unwrap());

/// Identify the CMS that rendered a page. Generator meta tags are checked
/// before raw HTML markers.
pub fn detect_cms(page: &Page<'_>) -> Option<CmsPlatform> {
    let generator = page
        .document
        .select(&GENERATOR)
        .filter_map(|el| el.value().attr("content"))
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>();
    if let Some(pattern) = PATTERNS
        .iter()
        .find(|p| generator.iter().any(|g| g.contains(p.generator)))
    {
        return Some(pattern.platform);
    }
    let html = page.html.to_ascii_lowercase();
    PATTERNS
        .iter()
        .find(|p| p.markers.iter().any(|m| html.contains(m)))
        .map(|p| p.platform)
}

/// Platform-specific listing markup, only consulted when the platform is
/// detected.
pub struct CmsExtractor;

impl Extractor for CmsExtractor {
    fn name(&self) -> &'static str {
        "cms_pattern"
    }

    fn extract(&self, page: &Page<'_>) -> Result<Vec<RawJob>, ExtractError> {
        let Some(platform) = detect_cms(page) else {
            return Ok(Vec::new());
        };
        let Some(pattern) = PATTERNS.iter().find(|p| p.platform == platform) else {
            return Ok(Vec::new());
        };
        tracing::debug!("Detected {platform} on {}", page.url);

        let mut jobs = Vec::new();
        let mut seen = SeenJobs::default();
        for item in page.document.select(&pattern.items) {
            if let Some(job) = item_to_job(&item, pattern, page) {
                seen.push(&mut jobs, job);
            }
        }
        Ok(jobs)
    }
}

fn item_to_job(item: &ElementRef, pattern: &CmsPattern, page: &Page<'_>) -> Option<RawJob> {
    let title = item
        .select(&pattern.title)
        .map(|el| element_text(&el))
        .find(|t| t.chars().count() >= 3)?;

    let href = if item.value().name() == "a" {
        item.value().attr("href")
    } else {
        item.select(&LINK).find_map(|a| a.value().attr("href"))
    };
    let url = href.and_then(|h| page.resolve(h));
    if !should_extract(item, url.as_deref()) {
        return None;
    }

    let mut job = RawJob::new(title, JobSource::Cms(pattern.platform));
    job.url = url;
    job.summary = item
        .select(&SUMMARY)
        .next()
        .map(|el| truncate_chars(&element_text(&el), 500))
        .unwrap_or_default();
    job.location = item
        .select(&LOCATION)
        .next()
        .map(|el| element_text(&el))
        .filter(|l| !l.is_empty());
    Some(job)
}
