// ATS detection: signature matching over page HTML, redirect policy for
// off-domain links, and board-token discovery for the API clients.

pub mod client;
pub mod providers;

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

use crate::filters::{bare_host, host_matches};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AtsProvider {
    Greenhouse,
    Lever,
    Workable,
    JazzHr,
    Ashby,
    BambooHr,
}

impl AtsProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            AtsProvider::Greenhouse => "greenhouse",
            AtsProvider::Lever => "lever",
            AtsProvider::Workable => "workable",
            AtsProvider::JazzHr => "jazzhr",
            AtsProvider::Ashby => "ashby",
            AtsProvider::BambooHr => "bamboohr",
        }
    }
}

impl fmt::Display for AtsProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct Signature {
    provider: AtsProvider,
    scripts: &'static [&'static str],
    iframes: &'static [&'static str],
    selectors: &'static [&'static str],
    api: &'static [&'static str],
}

const SIGNATURES: &[Signature] = &[
    Signature {
        provider: AtsProvider::Greenhouse,
        scripts: &["boards.greenhouse.io", "boards-api.greenhouse.io", "greenhouse.js"],
        iframes: &["boards.greenhouse.io", "job-boards.greenhouse.io"],
        selectors: &[".greenhouse-board", "#greenhouse_application", "#grnhse_app"],
        api: &[r"boards-api\.greenhouse\.io/v\d+/boards"],
    },
    Signature {
        provider: AtsProvider::Lever,
        scripts: &["lever.co/careers-hosted", "andromeda.lever.co"],
        iframes: &["jobs.lever.co"],
        selectors: &[".lever-jobs", "[data-qa='lever-job']"],
        api: &[r"api\.lever\.co/v\d+/postings"],
    },
    Signature {
        provider: AtsProvider::Workable,
        scripts: &["workable.com/assets", "apply.workable.com"],
        iframes: &["apply.workable.com"],
        selectors: &[".workable-job", "[data-ui='job-list']"],
        api: &[r"apply\.workable\.com/api/v\d+"],
    },
    Signature {
        provider: AtsProvider::JazzHr,
        scripts: &["jazz.co", "jazzhr.com"],
        iframes: &["jazzhr.com", "jazz.co"],
        selectors: &[".jazz-job", "#jazz-careers"],
        api: &[r"api\.jazz\.co"],
    },
    Signature {
        provider: AtsProvider::Ashby,
        scripts: &["ashbyhq.com"],
        iframes: &["jobs.ashbyhq.com"],
        selectors: &[".ashby-job", "[data-ashby]"],
        api: &[r"api\.ashbyhq\.com"],
    },
    Signature {
        provider: AtsProvider::BambooHr,
        scripts: &["bamboohr.com/careers", "bamboohr.com/jobs"],
        iframes: &["bamboohr.com/careers"],
        selectors: &[".bamboohr-job"],
        api: &[r"api\.bamboohr\.com"],
    },
];

struct CompiledSignature {
    provider: AtsProvider,
    scripts: &'static [&'static str],
    iframes: &'static [&'static str],
    selectors: Vec<Selector>,
    api: Vec<Regex>,
}

static COMPILED: LazyLock<Vec<CompiledSignature>> = LazyLock::new(|| {
    SIGNATURES
        .iter()
        .map(|sig| CompiledSignature {
            provider: sig.provider,
            scripts: sig.scripts,
            iframes: sig.iframes,
            selectors: sig
                .selectors
                .iter()
                .filter_map(|css| Selector::parse(css).ok())
                .collect(),
            api: sig
                .api
                .iter()
                .map(|re| Regex::new(&format!("(?i){re}")).unwrap())
                .collect(),
        })
        .collect()
});

static SCRIPT_SRC: LazyLock<Selector> = LazyLock::new(|| Selector::parse("script[src]").unwrap());
static IFRAME_SRC: LazyLock<Selector> = LazyLock::new(|| Selector::parse("iframe[src]").unwrap());

/// Hosts whose boards are safe to follow from a company site.
const ALLOWED_ATS_HOSTS: &[&str] = &[
    "greenhouse.io",
    "boards.greenhouse.io",
    "lever.co",
    "jobs.lever.co",
    "workable.com",
    "apply.workable.com",
    "jazzhr.com",
    "jazz.co",
    "ashbyhq.com",
    "jobs.ashbyhq.com",
    "bamboohr.com",
    "recruitee.com",
    "smartrecruiters.com",
    "breezy.hr",
    "applytojob.com",
    "icims.com",
    "jobvite.com",
];

/// Aggregators that syndicate postings; never followed.
const BANNED_ATS_HOSTS: &[&str] = &[
    "linkedin.com",
    "indeed.com",
    "glassdoor.com",
    "ziprecruiter.com",
    "monster.com",
    "careerbuilder.com",
    "simplyhired.com",
    "dice.com",
];

/// Board URLs that identify a provider by host alone.
const BOARD_HOSTS: &[(&str, AtsProvider)] = &[
    ("greenhouse.io", AtsProvider::Greenhouse),
    ("ghgr.co", AtsProvider::Greenhouse),
    ("lever.co", AtsProvider::Lever),
    ("workable.com", AtsProvider::Workable),
    ("jazzhr.com", AtsProvider::JazzHr),
    ("jazz.co", AtsProvider::JazzHr),
    ("applytojob.com", AtsProvider::JazzHr),
    ("ashbyhq.com", AtsProvider::Ashby),
    ("bamboohr.com", AtsProvider::BambooHr),
];

static BOARD_TOKEN_PATTERNS: LazyLock<Vec<(AtsProvider, Regex)>> = LazyLock::new(|| {
    vec![
        (
            AtsProvider::Greenhouse,
            Regex::new(
                r"(?i)(?:job-)?boards(?:-api)?\.greenhouse\.io/(?:embed/job_board(?:/js)?\?for=|v\d+/boards/)?([A-Za-z0-9_-]+)",
            )
            .unwrap(),
        ),
        (
            AtsProvider::Lever,
            Regex::new(r"(?i)(?:jobs|api)\.lever\.co/(?:v\d+/postings/)?([A-Za-z0-9_-]+)").unwrap(),
        ),
        (
            AtsProvider::Workable,
            Regex::new(r"(?i)apply\.workable\.com/(?:api/v\d+/accounts/)?([A-Za-z0-9_-]+)").unwrap(),
        ),
        (
            AtsProvider::Ashby,
            Regex::new(r"(?i)(?:jobs\.ashbyhq\.com/|api\.ashbyhq\.com/posting-api/job-board/)([A-Za-z0-9_.-]+)")
                .unwrap(),
        ),
    ]
});

const RESERVED_PATH_SEGMENTS: &[&str] = &["embed", "js", "api", "v0", "v1", "v2", "v3", "j", "assets"];

#[derive(Debug, Clone, Copy, Default)]
pub struct AtsDetector;

impl AtsDetector {
    pub fn new() -> Self {
        Self
    }

    /// First provider whose signature matches, in table order. Within a
    /// provider: script sources, then iframe sources, then DOM selectors,
    /// then API URL patterns.
    pub fn detect(&self, html: &str) -> Option<AtsProvider> {
        let document = Html::parse_document(html);
        self.detect_document(&document, html)
    }

    pub fn detect_document(&self, document: &Html, html: &str) -> Option<AtsProvider> {
        let scripts: Vec<String> = document
            .select(&SCRIPT_SRC)
            .filter_map(|el| el.value().attr("src"))
            .map(str::to_ascii_lowercase)
            .collect();
        let iframes: Vec<String> = document
            .select(&IFRAME_SRC)
            .filter_map(|el| el.value().attr("src"))
            .map(str::to_ascii_lowercase)
            .collect();

        for sig in COMPILED.iter() {
            let hit = scripts
                .iter()
                .any(|src| sig.scripts.iter().any(|needle| src.contains(needle)))
                || iframes
                    .iter()
                    .any(|src| sig.iframes.iter().any(|needle| src.contains(needle)))
                || sig
                    .selectors
                    .iter()
                    .any(|sel| document.select(sel).next().is_some())
                || sig.api.iter().any(|re| re.is_match(html));
            if hit {
                tracing::debug!("Detected ATS {}", sig.provider);
                return Some(sig.provider);
            }
        }
        None
    }

    /// Provider that hosts the given URL, if it is a known board host.
    pub fn detect_from_url(&self, url: &str) -> Option<AtsProvider> {
        let host = bare_host(url)?;
        BOARD_HOSTS
            .iter()
            .find(|(suffix, _)| host_matches(&host, suffix))
            .map(|(_, provider)| *provider)
    }

    /// Board identifier for a provider, searched in the page URL first and
    /// then anywhere in the HTML (iframe and script sources, links, inline
    /// API calls).
    pub fn board_token(&self, provider: AtsProvider, page_url: &str, html: &str) -> Option<String> {
        let (_, pattern) = BOARD_TOKEN_PATTERNS.iter().find(|(p, _)| *p == provider)?;
        [page_url, html].into_iter().find_map(|haystack| {
            pattern
                .captures_iter(haystack)
                .filter_map(|caps| caps.get(1))
                .map(|m| m.as_str())
                .find(|token| {
                    !RESERVED_PATH_SEGMENTS
                        .iter()
                        .any(|reserved| token.eq_ignore_ascii_case(reserved))
                })
                .map(String::from)
        })
    }

    pub fn is_allowed_redirect(&self, url: &str) -> bool {
        bare_host(url).is_some_and(|host| {
            ALLOWED_ATS_HOSTS
                .iter()
                .any(|suffix| host_matches(&host, suffix))
        })
    }

    pub fn is_banned_redirect(&self, url: &str) -> bool {
        bare_host(url).is_some_and(|host| {
            BANNED_ATS_HOSTS
                .iter()
                .any(|suffix| host_matches(&host, suffix))
        })
    }
}
