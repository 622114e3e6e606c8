use std::collections::HashMap;

use url::Url;

use crate::crawler::fetch::PageFetcher;

const CAREER_PATHS: &[&str] = &["/careers", "/jobs", "/opportunities", "/join"];

/// Permissive robots policy, scoped to one domain crawl. Career paths are
/// always allowed; anything else is allowed unless the site disallows
/// everything for all agents.
#[derive(Debug, Default)]
pub struct RobotsPolicy {
    site_closed: HashMap<String, bool>,
}

impl RobotsPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn allows(&mut self, fetcher: &dyn PageFetcher, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        if is_career_path(parsed.path()) {
            return true;
        }
        let Some(host) = parsed.host_str() else {
            return false;
        };
        let origin = parsed.origin().ascii_serialization();
        if let Some(closed) = self.site_closed.get(host) {
            return !closed;
        }

        let robots_url = format!("{origin}/robots.txt");
        let closed = match fetcher.fetch(&robots_url).await {
            Ok(page) => disallows_everything(&page.body),
            Err(e) => {
                tracing::debug!("No robots.txt for {host}: {e}");
                false
            }
        };
        if closed {
            tracing::info!("robots.txt for {host} disallows all agents");
        }
        self.site_closed.insert(host.to_string(), closed);
        !closed
    }
}

pub fn is_career_path(path: &str) -> bool {
    let path = path.to_ascii_lowercase();
    CAREER_PATHS.iter().any(|prefix| {
        path == *prefix
            || path
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/') || rest.starts_with('-'))
    })
}

/// True when a `User-agent: *` group carries a bare `Disallow: /`.
pub fn disallows_everything(robots_txt: &str) -> bool {
    let mut in_wildcard_group = false;
    let mut last_was_agent = false;
    for line in robots_txt.lines() {
        let line = line.split('#').next().unwrap_or_default().trim();
        let Some((field, value)) = line.split_once(':') else {
            continue;
        };
        let field = field.trim().to_ascii_lowercase();
        let value = value.trim();
        match field.as_str() {
            "user-agent" => {
                if !last_was_agent {
                    in_wildcard_group = false;
                }
                in_wildcard_group |= value == "*";
                last_was_agent = true;
            }
            "disallow" => {
                last_was_agent = false;
                if in_wildcard_group && value == "/" {
                    return true;
                }
            }
            _ => last_was_agent = false,
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::fetch::tests::StubFetcher;

    #[test]
    fn test_career_paths() {
        assert!(is_career_path("/careers"));
        assert!(is_career_path("/Jobs/123"));
        assert!(is_career_path("/join-us"));
        assert!(!is_career_path("/joinery"));
        assert!(!is_career_path("/products"));
    }

    #[test]
    fn test_disallow_all_for_wildcard() {
        assert!(disallows_everything("User-agent: *\nDisallow: /\n"));
        assert!(disallows_everything(
            "User-agent: Googlebot\nUser-agent: *\nDisallow: / # closed\n"
        ));
    }

    #[test]
    fn test_partial_disallow_is_permissive() {
        assert!(!disallows_everything("User-agent: *\nDisallow: /admin\n"));
        assert!(!disallows_everything("User-agent: BadBot\nDisallow: /\n\nUser-agent: *\nAllow: /\n"));
        assert!(!disallows_everything(""));
    }

    #[tokio::test]
    async fn test_allows_caches_per_host() {
        let fetcher = StubFetcher::new().page("https://acme.com/robots.txt", "User-agent: *\nDisallow: /");
        let mut policy = RobotsPolicy::new();
        assert!(!policy.allows(&fetcher, "https://acme.com/products").await);
        assert!(policy.allows(&fetcher, "https://acme.com/careers").await);
        assert!(!policy.allows(&fetcher, "https://acme.com/team").await);
        assert_eq!(fetcher.hits("https://acme.com/robots.txt"), 1);
    }

    #[tokio::test]
    async fn test_missing_robots_allows() {
        let fetcher = StubFetcher::new();
        let mut policy = RobotsPolicy::new();
        assert!(policy.allows(&fetcher, "https://acme.com/").await);
    }
}
