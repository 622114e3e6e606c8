pub mod tracker;
pub mod trend;

use std::collections::HashSet;

use sha2::{Digest, Sha256};
use strsim::normalized_levenshtein;

use crate::models::job::NormalizedJob;

pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.85;
pub const DEFAULT_TITLE_ONLY_THRESHOLD: f64 = 0.95;

/// Exact identity of a job: lowercase title, location, URL and the start
/// of the summary, hashed.
pub fn dedup_key(job: &NormalizedJob) -> String {
    let summary: String = job.summary.chars().take(100).collect();
    let parts = [
        job.title.trim().to_lowercase(),
        job.location.raw.trim().to_lowercase(),
        job.url.as_deref().unwrap_or_default().trim().to_lowercase(),
        summary.trim().to_lowercase(),
    ];
    hex::encode(Sha256::digest(parts.join("|").as_bytes()))
}

#[derive(Debug)]
struct Retained {
    title: String,
    location: String,
    url: Option<String>,
}

/// Retained-set dedup for one domain crawl: exact hash first, then fuzzy
/// comparison against everything retained so far.
#[derive(Debug)]
pub struct Deduplicator {
    threshold: f64,
    title_only_threshold: f64,
    keys: HashSet<String>,
    retained: Vec<Retained>,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(DEFAULT_FUZZY_THRESHOLD, DEFAULT_TITLE_ONLY_THRESHOLD)
    }
}

impl Deduplicator {
    pub fn new(threshold: f64, title_only_threshold: f64) -> Self {
        Self {
            threshold,
            title_only_threshold,
            keys: HashSet::new(),
            retained: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.retained.len()
    }

    pub fn is_empty(&self) -> bool {
        self.retained.is_empty()
    }

    /// True when `job` matches something already retained. Otherwise the
    /// job is recorded and false is returned.
    pub fn is_duplicate(&mut self, job: &NormalizedJob, use_fuzzy: bool) -> bool {
        let key = dedup_key(job);
        if self.keys.contains(&key) {
            return true;
        }

        let candidate = Retained {
            title: job.title.to_lowercase(),
            location: job.location.raw.to_lowercase(),
            url: job.url.clone(),
        };
        if use_fuzzy
            && let Some(seen) = self.retained.iter().find(|seen| self.is_fuzzy_match(&candidate, seen))
        {
            tracing::debug!("Fuzzy match: '{}' ~ '{}'", candidate.title, seen.title);
            return true;
        }

        self.keys.insert(key);
        self.retained.push(candidate);
        false
    }

    fn is_fuzzy_match(&self, a: &Retained, b: &Retained) -> bool {
        if let (Some(url_a), Some(url_b)) = (&a.url, &b.url)
            && !url_a.is_empty()
            && url_a == url_b
        {
            return true;
        }

        let title_similarity = normalized_levenshtein(&a.title, &b.title);
        if title_similarity < self.threshold {
            return false;
        }
        if !a.location.is_empty() && !b.location.is_empty() {
            return normalized_levenshtein(&a.location, &b.location) >= self.threshold;
        }
        title_similarity >= self.title_only_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Normalizer;
    use crate::models::job::{JobSource, RawJob};

    fn job(title: &str, url: Option<&str>, location: Option<&str>) -> NormalizedJob {
        let mut raw = RawJob::new(title, JobSource::DomAnchor);
        raw.url = url.map(String::from);
        raw.location = location.map(String::from);
        Normalizer.normalize(&raw, "")
    }

    #[test]
    fn test_exact_duplicate_does_not_grow_set() {
        let mut dedup = Deduplicator::default();
        let j = job("HubSpot Developer", Some("https://acme.com/jobs/1"), None);
        assert!(!dedup.is_duplicate(&j, false));
        assert!(dedup.is_duplicate(&j, false));
        assert_eq!(dedup.len(), 1);
    }

    #[test]
    fn test_same_url_is_always_a_duplicate() {
        let mut dedup = Deduplicator::default();
        assert!(!dedup.is_duplicate(&job("HubSpot Developer", Some("https://acme.com/jobs/1"), Some("Austin, TX")), true));
        assert!(dedup.is_duplicate(&job("Marketing Coordinator", Some("https://acme.com/jobs/1"), Some("Remote")), true));
        assert_eq!(dedup.len(), 1);
    }

    #[test]
    fn test_missing_urls_never_match_each_other() {
        let mut dedup = Deduplicator::default();
        assert!(!dedup.is_duplicate(&job("HubSpot Developer", None, None), true));
        assert!(!dedup.is_duplicate(&job("Sales Director", None, None), true));
    }

    #[test]
    fn test_fuzzy_title_with_location() {
        let mut dedup = Deduplicator::default();
        assert!(!dedup.is_duplicate(&job("HubSpot Developer", Some("https://acme.com/a"), Some("Austin, TX")), true));
        assert!(dedup.is_duplicate(&job("HubSpot Developers", Some("https://acme.com/b"), Some("Austin TX")), true));
        assert!(!dedup.is_duplicate(&job("HubSpot Developers", Some("https://acme.com/c"), Some("London, UK")), true));
    }

    #[test]
    fn test_title_only_needs_stricter_threshold() {
        let mut dedup = Deduplicator::default();
        assert!(!dedup.is_duplicate(&job("Senior HubSpot CMS Developer", Some("https://acme.com/a"), None), true));
        // ~0.90 similar: enough with locations, not without
        assert!(!dedup.is_duplicate(&job("Senior HubSpot CMS Developer II", Some("https://acme.com/b"), None), true));
        assert!(dedup.is_duplicate(&job("Senior HubSpot CMS Developers", Some("https://acme.com/c"), None), true));
    }

    #[test]
    fn test_fuzzy_disabled_only_uses_hash() {
        let mut dedup = Deduplicator::default();
        assert!(!dedup.is_duplicate(&job("HubSpot Developer", Some("https://acme.com/jobs/1"), None), false));
        assert!(!dedup.is_duplicate(&job("Other", Some("https://acme.com/jobs/1"), None), false));
    }

    #[test]
    fn test_thresholds_are_configurable() {
        let mut strict = Deduplicator::new(0.99, 0.99);
        assert!(!strict.is_duplicate(&job("HubSpot Developer", Some("https://acme.com/a"), Some("Austin")), true));
        assert!(!strict.is_duplicate(&job("HubSpot Developers", Some("https://acme.com/b"), Some("Austin")), true));
    }
}
