// Domain block-list, content-zone policy, robots allow-list, and the URL
// helpers they share with the crawler.

pub mod content;
pub mod domain;
pub mod robots;

use url::Url;

/// Canonical form used for visited-set membership: scheme, host, path and
/// query, with the fragment dropped. Only http(s) URLs normalize.
pub fn normalize_url(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return None;
    }
    url.set_fragment(None);
    Some(url.to_string())
}

/// Resolve an href against the page it was found on. Script, mail, phone
/// and same-page anchors are not navigable and resolve to nothing.
pub fn resolve_href(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    let lower = href.to_ascii_lowercase();
    if href.is_empty()
        || href.starts_with('#')
        || lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
    {
        return None;
    }
    let joined = base.join(href).ok()?;
    normalize_url(joined.as_str())
}

/// Lowercased host with any leading `www.` removed.
pub fn bare_host(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    Some(strip_www(&host).to_string())
}

pub fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// True when `host` equals `suffix` or is a subdomain of it.
pub fn host_matches(host: &str, suffix: &str) -> bool {
    host == suffix
        || (host.len() > suffix.len()
            && host.ends_with(suffix)
            && host.as_bytes()[host.len() - suffix.len() - 1] == b'.')
}

/// Same site as the crawl root, subdomains included.
pub fn is_internal(url: &str, root_host: &str) -> bool {
    bare_host(url).is_some_and(|host| host_matches(&host, strip_www(root_host)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_fragment() {
        assert_eq!(
            normalize_url("https://Example.com/careers?team=eng#open").as_deref(),
            Some("https://example.com/careers?team=eng")
        );
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for raw in [
            "https://example.com",
            "http://EXAMPLE.com/a/../b/?x=1#frag",
            "https://example.com/jobs%20list",
            "https://sub.example.co.uk:8443/path/",
        ] {
            let once = normalize_url(raw).unwrap();
            assert_eq!(normalize_url(&once).as_deref(), Some(once.as_str()));
        }
    }

    #[test]
    fn test_normalize_rejects_non_http() {
        assert!(normalize_url("mailto:jobs@example.com").is_none());
        assert!(normalize_url("ftp://example.com/file").is_none());
        assert!(normalize_url("not a url").is_none());
    }

    #[test]
    fn test_resolve_href_relative() {
        let base = Url::parse("https://example.com/company/").unwrap();
        assert_eq!(
            resolve_href(&base, "../careers#top").as_deref(),
            Some("https://example.com/careers")
        );
        assert_eq!(
            resolve_href(&base, "/jobs/1").as_deref(),
            Some("https://example.com/jobs/1")
        );
    }

    #[test]
    fn test_resolve_href_skips_non_navigable() {
        let base = Url::parse("https://example.com/").unwrap();
        for href in ["#", "javascript:void(0)", "mailto:hr@example.com", "tel:+1555", ""] {
            assert!(resolve_href(&base, href).is_none(), "{href}");
        }
    }

    #[test]
    fn test_is_internal_allows_subdomains() {
        assert!(is_internal("https://www.acme.com/jobs", "acme.com"));
        assert!(is_internal("https://careers.acme.com/", "www.acme.com"));
        assert!(!is_internal("https://notacme.com/", "acme.com"));
        assert!(!is_internal("https://boards.greenhouse.io/acme", "acme.com"));
    }
}
