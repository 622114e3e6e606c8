use super::{bare_host, host_matches, strip_www};

/// Hosts that never carry a company's own job listings.
const BLOCKED_HOSTS: &[&str] = &[
    // Social
    "facebook.com",
    "fb.com",
    "messenger.com",
    "instagram.com",
    "linkedin.com",
    "twitter.com",
    "x.com",
    "tiktok.com",
    "youtube.com",
    "pinterest.com",
    "threads.net",
    "snapchat.com",
    // Publishing and site builders
    "medium.com",
    "substack.com",
    "blogger.com",
    "wordpress.com",
    "wix.com",
    "wixstatic.com",
    "squarespace.com",
    "vimeo.com",
    // Vendor marketing and tooling
    "hubspot.com",
    "canva.com",
    "figma.com",
    "notion.site",
    "eventbrite.com",
    "mailchimp.com",
    "intercom.help",
    "zendesk.com",
    // Analytics and ads
    "google.com",
    "gstatic.com",
    "doubleclick.net",
    "googletagmanager.com",
    // Large platforms
    "amazon.com",
    "apple.com",
    "microsoft.com",
    "reddit.com",
    "quora.com",
    "yelp.com",
    "godaddy.com",
];

#[derive(Debug, Clone)]
pub struct DomainBlocklist {
    hosts: Vec<String>,
}

impl Default for DomainBlocklist {
    fn default() -> Self {
        Self::new(BLOCKED_HOSTS.iter().map(|h| h.to_string()))
    }
}

impl DomainBlocklist {
    pub fn new(hosts: impl IntoIterator<Item = String>) -> Self {
        Self {
            hosts: hosts
                .into_iter()
                .map(|h| strip_www(&h.to_ascii_lowercase()).to_string())
                .collect(),
        }
    }

    /// Exact or suffix match on the URL's host. Unparseable URLs and
    /// `about:` pseudo-URLs count as blocked.
    pub fn is_blocked(&self, url: &str) -> bool {
        if url.trim().to_ascii_lowercase().starts_with("about:") {
            return true;
        }
        match bare_host(url) {
            Some(host) => self.is_blocked_host(&host),
            None => true,
        }
    }

    pub fn is_blocked_host(&self, host: &str) -> bool {
        let host = strip_www(host);
        self.hosts.iter().any(|blocked| host_matches(host, blocked))
    }
}
