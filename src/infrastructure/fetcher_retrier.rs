use std::{sync::Arc, time::Duration};

use log::warn;
use tokio::time::sleep;

use crate::{FetchError, Page, PageFetcher, PageToken, SearchQuery};

/// A struct that retries a PageFetcher a specified number of times on transport failures with exponential backoff strategy.
///
/// Status, parse and rate limit errors are returned as soon as they occur.
pub struct FetcherRetrier {
    /// The fetcher to be retried.
    fetcher: Arc<dyn PageFetcher>,

    /// The maximum number of attempts for a request.
    max_retries: u32,

    /// The base delay for exponential backoff.
    base_delay: Duration,
}

impl FetcherRetrier {
    /// Creates a new `FetcherRetrier` instance with the given maximum number of retries.
    pub fn new(fetcher: Arc<dyn PageFetcher>, max_retries: u32, base_delay: Duration) -> Self {
        Self {
            fetcher,
            max_retries,
            base_delay,
        }
    }

    fn calculate_exponential_backoff_delay(&self, attempt: u32) -> Duration {
        self.base_delay * (2u32.pow(attempt.min(31)))
    }
}

#[async_trait::async_trait]
impl PageFetcher for FetcherRetrier {
    /// Retries the request if it fails transiently, up to the maximum number of retries.
    async fn fetch(
        &self,
        query: &SearchQuery,
        token: &PageToken,
        page_size: u16,
    ) -> Result<Page, FetchError> {
        let mut attempts = 0;

        loop {
            match self.fetcher.fetch(query, token, page_size).await {
                Err(e) if e.is_transient() => {
                    warn!("Fetch attempt #{} failed: {}", attempts + 1, e);
                    attempts += 1;
                    if attempts >= self.max_retries {
                        return Err(FetchError::Transport(format!(
                            "Failed after {attempts} attempts: {e}"
                        )));
                    }
                    sleep(self.calculate_exponential_backoff_delay(attempts)).await;
                }
                res => return res,
            }
        }
    }
}
