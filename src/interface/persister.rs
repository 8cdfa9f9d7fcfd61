use crate::{Record, StdResult};

/// A trait for persisting records to a storage medium.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RecordPersister: Sync + Send {
    /// Persists the records and returns how many were written.
    async fn persist(&self, records: &[Record]) -> StdResult<u32>;
}
