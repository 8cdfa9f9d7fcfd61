use crate::{FetchError, Page, PageToken, SearchQuery};

/// A trait for fetching one page of search results from a remote endpoint.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait PageFetcher: Sync + Send {
    /// Fetches the page at `token` for the query.
    async fn fetch(
        &self,
        query: &SearchQuery,
        token: &PageToken,
        page_size: u16,
    ) -> Result<Page, FetchError>;
}
