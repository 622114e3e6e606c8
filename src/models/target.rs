use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::AppError;

/// One company site to crawl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlTarget {
    pub root_url: String,
    pub company_name: String,
}

impl CrawlTarget {
    /// Accepts bare domains as well as full URLs. Returns `None` for
    /// anything that does not resolve to an http(s) host.
    pub fn from_website(website: &str, title: Option<&str>) -> Option<Self> {
        let website = website.trim();
        if website.is_empty() {
            return None;
        }
        let with_scheme = if website.contains("://") {
            website.to_string()
        } else {
            format!("https://{website}")
        };
        let mut url = Url::parse(&with_scheme).ok()?;
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        let host = url.host_str()?.to_ascii_lowercase();
        if !host.contains('.') {
            return None;
        }
        url.set_fragment(None);

        let company_name = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .unwrap_or_else(|| host.trim_start_matches("www.").to_string());

        Some(Self {
            root_url: url.to_string(),
            company_name,
        })
    }

    pub fn host(&self) -> String {
        Url::parse(&self.root_url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
            .unwrap_or_default()
    }
}

/// Parse a domain list: a JSON array of bare strings or objects with a
/// `website`/`url`/`domain` field and optional `title`/`company`/`name`.
/// Entries that do not fit are skipped; a document that is not an array
/// is an input error.
pub fn parse_targets(json: &str) -> Result<Vec<CrawlTarget>, AppError> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| AppError::Input(format!("Domain list is not valid JSON: {e}")))?;
    targets_from_value(&value)
}

pub fn targets_from_value(value: &Value) -> Result<Vec<CrawlTarget>, AppError> {
    let Value::Array(entries) = value else {
        return Err(AppError::Input(
            "Domain list must be a JSON array".to_string(),
        ));
    };

    let mut targets = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let target = match entry {
            Value::String(website) => CrawlTarget::from_website(website, None),
            Value::Object(obj) => {
                let website = ["website", "url", "domain"]
                    .iter()
                    .find_map(|key| obj.get(*key).and_then(|v| v.as_str()));
                let title = ["title", "company", "name"]
                    .iter()
                    .find_map(|key| obj.get(*key).and_then(|v| v.as_str()));
                website.and_then(|w| CrawlTarget::from_website(w, title))
            }
            _ => None,
        };
        match target {
            Some(t) => targets.push(t),
            None => tracing::warn!("Skipping malformed domain entry #{index}: {entry}"),
        }
    }
    Ok(targets)
}

pub fn load_targets(path: &Path) -> Result<Vec<CrawlTarget>, AppError> {
    let json = std::fs::read_to_string(path).map_err(|e| {
        AppError::Input(format!("Cannot read domain list {}: {e}", path.display()))
    })?;
    let targets = parse_targets(&json)?;
    tracing::info!("Loaded {} domains from {}", targets.len(), path.display());
    Ok(targets)
}
