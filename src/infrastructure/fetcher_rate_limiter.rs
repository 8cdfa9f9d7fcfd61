use std::sync::Arc;

use crate::{
    FetchError, Page, PageFetcher, PageToken, RateLimitCategory, RateLimitGuard, SearchQuery,
};

/// This struct is responsible for checking the rate limit before each page request.
pub struct RateLimitedFetcher {
    /// The fetcher to be rate limited.
    fetcher: Arc<dyn PageFetcher>,

    /// The guard consulted before each request.
    guard: Arc<RateLimitGuard>,

    /// The quota the requests of the fetcher count against.
    category: RateLimitCategory,
}

impl RateLimitedFetcher {
    /// Creates a new `RateLimitedFetcher` instance with the given fetcher.
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        guard: Arc<RateLimitGuard>,
        category: RateLimitCategory,
    ) -> Self {
        Self {
            fetcher,
            guard,
            category,
        }
    }
}

#[async_trait::async_trait]
impl PageFetcher for RateLimitedFetcher {
    /// Waits for quota, then delegates to the wrapped fetcher.
    async fn fetch(
        &self,
        query: &SearchQuery,
        token: &PageToken,
        page_size: u16,
    ) -> Result<Page, FetchError> {
        self.guard.ensure_available(self.category).await?;

        self.fetcher.fetch(query, token, page_size).await
    }
}
