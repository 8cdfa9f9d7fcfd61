use crate::{Collection, CollectionAborted, CollectionLimits, SearchQuery};

/// A trait for collecting every result page of a query.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RecordCollector: Sync + Send {
    /// Collects the records of the query, up to the limits.
    async fn collect(
        &self,
        query: &SearchQuery,
        limits: CollectionLimits,
    ) -> Result<Collection, CollectionAborted>;
}
