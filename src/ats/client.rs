use std::sync::Arc;

use super::AtsProvider;
use super::providers::{Ashby, BoardApi, Greenhouse, Lever, Workable};
use crate::crawler::fetch::PageFetcher;
use crate::models::job::RawJob;

#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("no public board API for {0}")]
    Unsupported(AtsProvider),

    #[error("fetch failed: {0}")]
    Fetch(#[from] crate::error::FetchError),

    #[error("unreadable board response: {0}")]
    Parse(#[from] crate::error::ExtractError),
}

/// Fetches job boards straight from a provider's public API.
#[derive(Clone)]
pub struct AtsClient {
    apis: Vec<Arc<dyn BoardApi>>,
}

impl Default for AtsClient {
    fn default() -> Self {
        Self::new(vec![
            Arc::new(Greenhouse),
            Arc::new(Lever),
            Arc::new(Workable),
            Arc::new(Ashby),
        ])
    }
}

impl AtsClient {
    pub fn new(apis: Vec<Arc<dyn BoardApi>>) -> Self {
        Self { apis }
    }

    pub fn supports(&self, provider: AtsProvider) -> bool {
        self.api_for(provider).is_some()
    }

    fn api_for(&self, provider: AtsProvider) -> Option<&Arc<dyn BoardApi>> {
        self.apis.iter().find(|api| api.provider() == provider)
    }

    pub async fn fetch_jobs(
        &self,
        fetcher: &dyn PageFetcher,
        provider: AtsProvider,
        token: &str,
    ) -> Result<Vec<RawJob>, BoardError> {
        let api = self
            .api_for(provider)
            .ok_or(BoardError::Unsupported(provider))?;
        let endpoint = api.endpoint(token);
        tracing::info!("Fetching {provider} board '{token}' from {endpoint}");
        let page = fetcher.fetch(&endpoint).await?;
        let jobs = api.parse(&page.body)?;
        tracing::info!("{provider} board '{token}' returned {} jobs", jobs.len());
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::fetch::tests::StubFetcher;

    #[tokio::test]
    async fn test_fetch_greenhouse_board() {
        let fetcher = StubFetcher::new().page(
            "https://boards-api.greenhouse.io/v1/boards/acme/jobs?content=true",
            r#"{"jobs":[{"title":"HubSpot Developer","absolute_url":"https://boards.greenhouse.io/acme/jobs/7"}]}"#,
        );
        let jobs = AtsClient::default()
            .fetch_jobs(&fetcher, AtsProvider::Greenhouse, "acme")
            .await
            .unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].url.as_deref(), Some("https://boards.greenhouse.io/acme/jobs/7"));
    }

    #[tokio::test]
    async fn test_unsupported_provider() {
        let fetcher = StubFetcher::new();
        let client = AtsClient::default();
        assert!(!client.supports(AtsProvider::JazzHr));
        let err = client
            .fetch_jobs(&fetcher, AtsProvider::BambooHr, "acme")
            .await
            .unwrap_err();
        assert!(matches!(err, BoardError::Unsupported(AtsProvider::BambooHr)));
        assert!(fetcher.requested().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_error_propagates() {
        let fetcher = StubFetcher::new();
        let err = AtsClient::default()
            .fetch_jobs(&fetcher, AtsProvider::Lever, "nobody")
            .await
            .unwrap_err();
        assert!(matches!(err, BoardError::Fetch(_)));
    }
}
