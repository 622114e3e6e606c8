use std::time::Duration;

use async_trait::async_trait;
use rand::seq::IndexedRandom;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};

use crate::error::{AppError, FetchError};

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_6) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.6 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:132.0) Gecko/20100101 Firefox/132.0",
];

#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL as requested.
    pub url: String,
    /// URL after redirects.
    pub final_url: String,
    pub status: u16,
    pub body: String,
}

/// Source of page bodies. Production uses [`HttpFetcher`]; tests serve
/// fixtures from memory.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
    user_agent: Option<String>,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, user_agent: Option<String>) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client, user_agent })
    }

    fn pick_user_agent(&self) -> String {
        match &self.user_agent {
            Some(ua) => ua.clone(),
            None => USER_AGENTS
                .choose(&mut rand::rng())
                .copied()
                .unwrap_or(USER_AGENTS[0])
                .to_string(),
        }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, self.pick_user_agent())
            .header(
                ACCEPT,
                "text/html,application/xhtml+xml,application/json;q=0.9,*/*;q=0.8",
            )
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Body(e.to_string()))?;

        Ok(FetchedPage {
            url: url.to_string(),
            final_url,
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// In-memory fetcher serving fixture bodies; unknown URLs are 404s.
    #[derive(Default)]
    pub struct StubFetcher {
        pages: HashMap<String, Result<String, FetchErrorKind>>,
        log: Mutex<Vec<String>>,
    }

    #[derive(Clone, Copy)]
    pub enum FetchErrorKind {
        Timeout,
        Status(u16),
    }

    impl StubFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn page(mut self, url: &str, body: &str) -> Self {
            self.pages.insert(url.to_string(), Ok(body.to_string()));
            self
        }

        pub fn failing(mut self, url: &str, kind: FetchErrorKind) -> Self {
            self.pages.insert(url.to_string(), Err(kind));
            self
        }

        pub fn hits(&self, url: &str) -> usize {
            self.log.lock().unwrap().iter().filter(|u| *u == url).count()
        }

        pub fn requested(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageFetcher for StubFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
            self.log.lock().unwrap().push(url.to_string());
            match self.pages.get(url) {
                Some(Ok(body)) => Ok(FetchedPage {
                    url: url.to_string(),
                    final_url: url.to_string(),
                    status: 200,
                    body: body.clone(),
                }),
                Some(Err(FetchErrorKind::Timeout)) => Err(FetchError::Timeout),
                Some(Err(FetchErrorKind::Status(code))) => Err(FetchError::Status(*code)),
                None => Err(FetchError::Status(404)),
            }
        }
    }

    #[test]
    fn test_configured_user_agent_wins() {
        let fetcher = HttpFetcher::new(Duration::from_secs(5), Some("scout/1.0".into())).unwrap();
        assert_eq!(fetcher.pick_user_agent(), "scout/1.0");
    }

    #[test]
    fn test_rotated_user_agent_is_from_pool() {
        let fetcher = HttpFetcher::new(Duration::from_secs(5), None).unwrap();
        let ua = fetcher.pick_user_agent();
        assert!(USER_AGENTS.contains(&ua.as_str()));
    }
}
