use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use crate::extract::element_text;
use crate::filters::resolve_href;

/// Path and link-text hints for pages that list jobs. Longer hints first so
/// the alternation prefers them.
const CAREER_URL_HINTS: &[&str] = &[
    "join-our-team",
    "work-with-us",
    "work-for-us",
    "we-are-hiring",
    "job-openings",
    "open-positions",
    "opportunities",
    "employment",
    "work-here",
    "positions",
    "openings",
    "careers",
    "join-us",
    "career",
    "hiring",
    "apply",
    "jobs",
    "join",
    "job",
];

/// Hints that rank a candidate link ahead of the rest.
const STRONG_HINTS: &[&str] = &["careers", "jobs", "openings", "join", "hiring", "positions"];

const CAREER_CONTENT_HINTS: &[&str] = &[
    "open positions",
    "job openings",
    "career opportunities",
    "join our team",
    "we're hiring",
    "we are hiring",
    "work with us",
    "apply now",
    "current openings",
    "available positions",
    "job listings",
    "employment opportunities",
    "become part of",
    "join us",
];

static URL_HINT: LazyLock<Regex> = LazyLock::new(|| {
    let alternation = CAREER_URL_HINTS.join("|");
    Regex::new(&format!(r"(?i)(?:^|[/?&=_.\-])(?:{alternation})(?:$|[/?&=_.\-])")).unwrap()
});

static TEXT_HINT: LazyLock<Regex> = LazyLock::new(|| {
    let alternation = CAREER_URL_HINTS
        .iter()
        .map(|h| h.replace('-', r"[\s-]"))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{alternation})\b")).unwrap()
});

static STRONG_HINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)(?:{})", STRONG_HINTS.join("|"))).unwrap()
});

static ANCHORS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// Path plus query of a URL carries a career hint.
pub fn is_career_url(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let mut target = parsed.path().to_string();
    if let Some(query) = parsed.query() {
        target.push('?');
        target.push_str(query);
    }
    URL_HINT.is_match(&target)
}

/// At least two distinct career phrases in the page text.
pub fn content_suggests_careers(page_text: &str) -> bool {
    let text = page_text.to_lowercase();
    CAREER_CONTENT_HINTS
        .iter()
        .filter(|hint| text.contains(*hint))
        .take(2)
        .count()
        >= 2
}

/// Links on `document` that look like they lead to job listings, strong
/// hints first, document order within each tier.
pub fn career_links(document: &Html, base: &Url) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut strong = Vec::new();
    let mut weak = Vec::new();

    for anchor in document.select(&ANCHORS) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let text = element_text(&anchor);
        let title = anchor.value().attr("title").unwrap_or_default();
        let Some(resolved) = resolve_href(base, href) else {
            continue;
        };

        let text_hit = TEXT_HINT.is_match(&text) || TEXT_HINT.is_match(title);
        if !text_hit && !is_career_url(&resolved) {
            continue;
        }
        if !seen.insert(resolved.clone()) {
            continue;
        }

        let haystack = format!("{text} {title} {href}");
        if STRONG_HINT.is_match(&haystack) {
            strong.push(resolved);
        } else {
            weak.push(resolved);
        }
    }

    strong.extend(weak);
    strong
}
