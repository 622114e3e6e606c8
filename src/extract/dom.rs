use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Selector};

use super::{Extractor, Page, SeenJobs, element_text, truncate_chars};
use crate::error::ExtractError;
use crate::filters::content::should_extract;
use crate::filters::domain::DomainBlocklist;
use crate::models::job::{JobSource, RawJob};

const TITLE_HINTS: &[&str] = &[
    "developer",
    "engineer",
    "consultant",
    "architect",
    "specialist",
    "manager",
    "analyst",
    "designer",
    "coordinator",
    "director",
    "representative",
    "associate",
    "lead",
    "position",
    "role",
    "opening",
    "opportunity",
];

const SECTION_HEADINGS: &[&str] = &[
    "open positions",
    "current openings",
    "job openings",
    "career opportunities",
    "join us",
    "join our team",
    "we're hiring",
    "we are hiring",
    "work with us",
    "available positions",
    "careers",
];

/// Link and button labels that are calls to action, not titles.
const GENERIC_LABELS: &[&str] = &[
    "apply",
    "apply now",
    "details",
    "view",
    "view job",
    "view details",
    "read more",
    "learn more",
    "more",
];

static TITLE_HINT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\b(?:{})\b", TITLE_HINTS.join("|"))).unwrap()
});

static FALSE_POSITIVES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // Questions and how-tos
        r"^what\s+(is|are)\b",
        r"^how\s+to\b",
        r"^why\s+",
        // Media
        r"youtube",
        r"spotify",
        r"podcast",
        r"listen\s+on",
        r"watch\s+on",
        // Calls to action
        r"^apply\s+(now|today)$",
        r"^join\s+(us|our\s+team)$",
        r"^view\s+",
        r"^see\s+(all|our)\b",
        r"^explore\s+",
        r"^learn\s+more$",
        // Episodic content
        r"^episode\s+\d+",
        r"^chapter\s+\d+",
        // Site navigation
        r"^about(\s+us)?$",
        r"^contact(\s+us)?$",
        r"^our\s+(team|services)\b",
        r"^meet\s+",
    ]
    .iter()
    .map(|p| Regex::new(&format!("(?i){p}")).unwrap())
    .collect()
});

static ONCLICK_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s'"]+"#).unwrap());
static ONCLICK_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:location(?:\.href)?|window\.open\()\s*=?\s*['"]([^'"]+)['"]"#).unwrap()
});
static CARD_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)job-card|job-item|position|opening|listing|card|item").unwrap()
});
static SUMMARY_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)description|summary|excerpt").unwrap());

static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static BUTTON: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("button[data-url], button[data-href], button[onclick], [role='button'][data-url], [role='button'][data-href], [role='button'][onclick]")
        .unwrap()
});
static HEADING: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1, h2, h3, h4, h5, h6").unwrap());
static CARD_CANDIDATE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[class], li").unwrap());
static CLASSED: LazyLock<Selector> = LazyLock::new(|| Selector::parse("[class]").unwrap());

/// Whether a piece of text reads like a job title: long enough, not a known
/// false positive, and containing a role keyword on a word boundary.
pub fn is_job_like(text: &str) -> bool {
    let text = text.trim();
    if text.chars().count() < 3 {
        return false;
    }
    if FALSE_POSITIVES.iter().any(|re| re.is_match(text)) {
        return false;
    }
    TITLE_HINT_RE.is_match(text)
}

fn is_plausible_card_title(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    lower.chars().count() >= 3
        && lower.chars().any(char::is_alphabetic)
        && !GENERIC_LABELS.contains(&lower.as_str())
        && !FALSE_POSITIVES.iter().any(|re| re.is_match(&lower))
}

/// Generic markup heuristics: role-like anchors, buttons carrying URLs,
/// cards under a hiring heading, and a heading fallback.
#[derive(Default)]
pub struct DomExtractor {
    blocklist: DomainBlocklist,
}

impl Extractor for DomExtractor {
    fn name(&self) -> &'static str {
        "dom_heuristic"
    }

    fn extract(&self, page: &Page<'_>) -> Result<Vec<RawJob>, ExtractError> {
        let mut jobs = Vec::new();
        let mut seen = SeenJobs::default();

        self.anchors(page, &mut seen, &mut jobs);
        self.buttons(page, &mut seen, &mut jobs);
        self.sections(page, &mut seen, &mut jobs);
        self.headings(page, &mut seen, &mut jobs);

        Ok(jobs)
    }
}

impl DomExtractor {
    pub fn new(blocklist: DomainBlocklist) -> Self {
        Self { blocklist }
    }

    fn accept_url(&self, el: &ElementRef, url: Option<&str>) -> bool {
        if url.is_some_and(|u| self.blocklist.is_blocked(u)) {
            return false;
        }
        should_extract(el, url)
    }

    fn anchors(&self, page: &Page<'_>, seen: &mut SeenJobs, jobs: &mut Vec<RawJob>) {
        for a in page.document.select(&ANCHOR) {
            let text = element_text(&a);
            if text.chars().count() < 5 {
                continue;
            }
            let title_attr = a.value().attr("title").unwrap_or_default();
            if !is_job_like(&format!("{text} {title_attr}")) {
                continue;
            }
            let Some(url) = a.value().attr("href").and_then(|h| page.resolve(h)) else {
                continue;
            };
            if !self.accept_url(&a, Some(&url)) {
                continue;
            }
            let mut job = RawJob::new(text, JobSource::DomAnchor);
            job.url = Some(url);
            seen.push(jobs, job);
        }
    }

    fn buttons(&self, page: &Page<'_>, seen: &mut SeenJobs, jobs: &mut Vec<RawJob>) {
        for button in page.document.select(&BUTTON) {
            let text = element_text(&button);
            if !is_job_like(&text) {
                continue;
            }
            let value = button.value();
            let href = value
                .attr("data-url")
                .or_else(|| value.attr("data-href"))
                .map(String::from)
                .or_else(|| {
                    let onclick = value.attr("onclick")?;
                    ONCLICK_URL
                        .find(onclick)
                        .map(|m| m.as_str().to_string())
                        .or_else(|| ONCLICK_PATH.captures(onclick).map(|c| c[1].to_string()))
                });
            let Some(url) = href.and_then(|h| page.resolve(&h)) else {
                continue;
            };
            if !self.accept_url(&button, Some(&url)) {
                continue;
            }
            let mut job = RawJob::new(text, JobSource::DomButton);
            job.url = Some(url);
            seen.push(jobs, job);
        }
    }

    fn sections(&self, page: &Page<'_>, seen: &mut SeenJobs, jobs: &mut Vec<RawJob>) {
        let mut accepted = Vec::new();
        for heading in page.document.select(&HEADING) {
            let heading_text = element_text(&heading).to_lowercase().replace('’', "'");
            if !SECTION_HEADINGS.iter().any(|h| heading_text.contains(h)) {
                continue;
            }
            let Some(container) = heading.parent().and_then(ElementRef::wrap) else {
                continue;
            };

            for card in container.select(&CARD_CANDIDATE) {
                if card.id() == heading.id() || card.id() == container.id() {
                    continue;
                }
                let is_card = card.value().name() == "li"
                    || card.value().attr("class").is_some_and(|c| CARD_CLASS.is_match(c));
                if !is_card {
                    continue;
                }
                let nested = card
                    .ancestors()
                    .take_while(|node| node.id() != container.id())
                    .any(|node| accepted.contains(&node.id()));
                if nested {
                    continue;
                }
                if let Some(job) = self.card_to_job(&card, page) {
                    accepted.push(card.id());
                    seen.push(jobs, job);
                }
            }
        }
    }

    fn card_to_job(&self, card: &ElementRef, page: &Page<'_>) -> Option<RawJob> {
        let link = if card.value().name() == "a" {
            Some(*card)
        } else {
            card.select(&ANCHOR).next()
        };
        let title = card
            .select(&HEADING)
            .map(|h| element_text(&h))
            .find(|t| !t.is_empty())
            .or_else(|| link.map(|a| element_text(&a)).filter(|t| !t.is_empty()))
            .unwrap_or_else(|| truncate_chars(&element_text(card), 100));
        if !is_plausible_card_title(&title) {
            return None;
        }

        let url = link
            .and_then(|a| a.value().attr("href"))
            .and_then(|h| page.resolve(h));
        if !self.accept_url(card, url.as_deref()) {
            return None;
        }

        let mut job = RawJob::new(title, JobSource::DomSection);
        job.url = url;
        job.summary = card
            .select(&CLASSED)
            .find(|el| el.value().attr("class").is_some_and(|c| SUMMARY_CLASS.is_match(c)))
            .map(|el| truncate_chars(&element_text(&el), 500))
            .unwrap_or_default();
        Some(job)
    }

    fn headings(&self, page: &Page<'_>, seen: &mut SeenJobs, jobs: &mut Vec<RawJob>) {
        for heading in page.document.select(&HEADING) {
            let text = element_text(&heading);
            if !is_job_like(&text) {
                continue;
            }
            let url = heading
                .select(&ANCHOR)
                .next()
                .or_else(|| next_anchor(&heading))
                .and_then(|a| a.value().attr("href"))
                .and_then(|h| page.resolve(h));
            if !self.accept_url(&heading, url.as_deref()) {
                continue;
            }
            let mut job = RawJob::new(text, JobSource::DomHeading);
            job.url = url;
            seen.push(jobs, job);
        }
    }
}

/// First `a[href]` after `el` in document order, outside `el` itself.
fn next_anchor<'a>(el: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    let mut current = Some(**el);
    while let Some(node) = current {
        for sibling in node.next_siblings() {
            let Some(sibling) = ElementRef::wrap(sibling) else {
                continue;
            };
            if sibling.value().name() == "a" && sibling.value().attr("href").is_some() {
                return Some(sibling);
            }
            if let Some(inner) = sibling.select(&ANCHOR).next() {
                return Some(inner);
            }
        }
        current = node.parent();
    }
    None
}

#[cfg(test)]
mod tests {
    use scraper::Html;
    use url::Url;

    use super::*;

    fn run(html: &str) -> Vec<RawJob> {
        let url = Url::parse("https://acme.com/careers").unwrap();
        let doc = Html::parse_document(html);
        DomExtractor::default()
            .extract(&Page::new(&url, html, &doc))
            .unwrap()
    }

    #[test]
    fn test_is_job_like() {
        assert!(is_job_like("Senior HubSpot Developer"));
        assert!(is_job_like("Marketing Operations Manager"));
        assert!(!is_job_like("What is a HubSpot developer?"));
        assert!(!is_job_like("Listen on Spotify: the engineer podcast"));
        assert!(!is_job_like("View all engineer roles"));
        assert!(!is_job_like("About us"));
        assert!(!is_job_like("Developers")); // word boundary
        assert!(!is_job_like("Pricing"));
    }

    #[test]
    fn test_anchor_extraction_dedups_repeats() {
        let html = r#"<main>
            <a href="/jobs/1">HubSpot Developer</a>
            <a href="/jobs/1">HubSpot Developer</a>
            <a href="/jobs/2">Apply</a>
            <a href="/about">About our engineering team lead</a>
        </main>"#;
        let jobs = run(html);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].source, JobSource::DomAnchor);
    }

    #[test]
    fn test_anchor_title_attribute() {
        let html = r#"<main><a href="/jobs/9" title="Solutions Architect">Join Acme in Austin</a></main>"#;
        let jobs = run(html);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].title, "Join Acme in Austin");
    }

    #[test]
    fn test_button_urls() {
        let html = r#"<main>
            <button data-url="/jobs/revops">RevOps Consultant</button>
            <button onclick="window.location.href='https://acme.com/jobs/cms'">CMS Developer</button>
            <button onclick="location.href='/jobs/ops'">Operations Manager</button>
            <button onclick="track()">Engineer</button>
        </main>"#;
        let urls: Vec<_> = run(html).into_iter().filter_map(|j| j.url).collect();
        assert_eq!(
            urls,
            vec![
                "https://acme.com/jobs/revops",
                "https://acme.com/jobs/cms",
                "https://acme.com/jobs/ops"
            ]
        );
    }

    #[test]
    fn test_section_cards_with_summary() {
        let html = r#"<section>
            <h2>Current Openings</h2>
            <ul>
              <li><h4>Implementation Specialist</h4><p class="job-summary">Onboard clients</p><a href="/jobs/impl">Apply</a></li>
              <li><a href="/jobs/ops">Marketing Operations</a></li>
            </ul>
        </section>"#;
        let jobs = run(html);
        let sections: Vec<_> = jobs.iter().filter(|j| j.source == JobSource::DomSection).collect();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].title, "Implementation Specialist");
        assert_eq!(sections[0].summary, "Onboard clients");
        assert_eq!(sections[1].title, "Marketing Operations");
    }

    #[test]
    fn test_nested_cards_count_once() {
        let html = r#"<div><h2>Open Positions</h2>
            <div class="job-card"><div class="card-body"><h3>Data Analyst</h3></div>
              <div class="card-footer"><a href="/jobs/da">Apply</a></div></div></div>"#;
        let jobs = run(html);
        assert_eq!(jobs.len(), 1, "{jobs:?}");
        assert_eq!(jobs[0].url.as_deref(), Some("https://acme.com/jobs/da"));
    }

    #[test]
    fn test_heading_fallback_uses_next_link() {
        let html = r#"<article><h3>HubSpot Consultant</h3><p>Remote</p><a href="/jobs/hc">Details</a></article>"#;
        let jobs = run(html);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].source, JobSource::DomHeading);
        assert_eq!(jobs[0].url.as_deref(), Some("https://acme.com/jobs/hc"));
    }

    #[test]
    fn test_blocked_domain_links_dropped() {
        let html = r#"<main><a href="https://www.linkedin.com/jobs/view/1">HubSpot Developer</a></main>"#;
        assert!(run(html).is_empty());
    }
}
