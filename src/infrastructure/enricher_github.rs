use std::sync::Arc;

use log::{debug, info, warn};

use crate::{
    GitHubSession, RateLimitCategory, RateLimitError, RateLimitGuard, Record, RecordEnricher,
    RepositoryResolver, infrastructure::fetcher_rest::RestRepository,
};

/// Resolves contributor and commit counts with one request per detail resource.
pub struct GitHubDetailEnricher {
    session: Arc<GitHubSession>,
    guard: Arc<RateLimitGuard>,
}

impl GitHubDetailEnricher {
    /// Creates a new `GitHubDetailEnricher` instance.
    pub fn new(session: Arc<GitHubSession>, guard: Arc<RateLimitGuard>) -> Self {
        Self { session, guard }
    }

    /// Counts the entries of a JSON array resource. Any failure counts as zero.
    async fn count(&self, url: &str) -> u32 {
        let response = match self.session.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Request to {url} failed: {e}");
                return 0;
            }
        };
        if !response.status().is_success() {
            debug!("Request to {url} returned {}", response.status());
            return 0;
        }
        match response.json::<Vec<serde_json::Value>>().await {
            Ok(entries) => entries.len() as u32,
            Err(e) => {
                debug!("Unexpected body from {url}: {e}");
                0
            }
        }
    }
}

#[async_trait::async_trait]
impl RepositoryResolver for GitHubDetailEnricher {
    /// Builds the record of a GitHub repository with its detail counts.
    async fn resolve(&self, full_name: &str) -> Result<Option<Record>, RateLimitError> {
        self.guard
            .ensure_available(RateLimitCategory::Core)
            .await?;
        let url = format!("/repos/{full_name}");
        let response = match self.session.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Exception for {full_name}: {e}");
                return Ok(None);
            }
        };
        if !response.status().is_success() {
            warn!("Error for {full_name}: {}", response.status());
            return Ok(None);
        }
        let mut record = match response.json::<RestRepository>().await {
            Ok(repository) => Record::from(repository),
            Err(e) => {
                warn!("Unexpected repository body for {full_name}: {e}");
                return Ok(None);
            }
        };
        self.enrich(&mut record).await?;

        Ok(Some(record))
    }
}

#[async_trait::async_trait]
impl RecordEnricher for GitHubDetailEnricher {
    async fn enrich(&self, record: &mut Record) -> Result<(), RateLimitError> {
        let Some(api_url) = record.api_url.clone() else {
            debug!("No detail resource for {}", record.url);
            return Ok(());
        };
        self.guard
            .ensure_available(RateLimitCategory::Core)
            .await?;
        record.contributors = Some(self.count(&format!("{api_url}/contributors")).await);
        record.commits = Some(self.count(&format!("{api_url}/commits")).await);

        Ok(())
    }
}

/// Enriches every record in order, stopping only when the rate limit guard gives up.
pub async fn enrich_all(
    enricher: &dyn RecordEnricher,
    records: &mut [Record],
) -> Result<(), RateLimitError> {
    let total = records.len();
    for (index, record) in records.iter_mut().enumerate() {
        enricher.enrich(record).await?;
        info!("Enriched {}/{total}: {record}", index + 1);
    }

    Ok(())
}
