use crate::{RateLimitError, Record};

/// A trait for resolving record fields absent from bulk search responses.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RecordEnricher: Sync + Send {
    /// Fills the detail fields of the record.
    async fn enrich(&self, record: &mut Record) -> Result<(), RateLimitError>;
}

/// A trait for building a record from a repository path such as `owner/name`.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RepositoryResolver: Sync + Send {
    /// Returns the record of the repository, or `None` when it is unavailable.
    async fn resolve(&self, full_name: &str) -> Result<Option<Record>, RateLimitError>;
}
