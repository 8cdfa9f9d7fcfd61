use super::{PageToken, Record};

/// One page of results returned by a search endpoint.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Page {
    /// Records of the page, in server order
    pub(crate) records: Vec<Record>,

    /// The token of the following page, if the endpoint exposes one
    pub(crate) next: Option<PageToken>,

    /// The total number of results reported by the server for the query
    pub(crate) total_count: Option<u64>,

    /// The number of items the server returned, including the ones that could not be mapped
    pub(crate) fetched: usize,
}

impl Page {
    /// Creates a new `Page` instance.
    pub fn new(records: Vec<Record>, next: Option<PageToken>, total_count: Option<u64>) -> Self {
        Self {
            fetched: records.len(),
            records,
            next,
            total_count,
        }
    }

    /// Sets the number of items the server returned, before unmappable ones were skipped.
    pub fn with_fetched(self, fetched: usize) -> Self {
        Self {
            fetched: fetched.max(self.records.len()),
            ..self
        }
    }

    /// Retrieves the records of the page.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Retrieves the token of the following page.
    pub fn next(&self) -> Option<&PageToken> {
        self.next.as_ref()
    }

    /// Retrieves the total reported by the server.
    pub fn total_count(&self) -> Option<u64> {
        self.total_count
    }

    /// Retrieves the number of items the server returned.
    pub fn fetched(&self) -> usize {
        self.fetched
    }

    /// Creates a dummy offset-paginated page of `size` records for testing purposes.
    #[cfg(test)]
    pub(crate) fn dummy(page: u32, size: usize, total_count: Option<u64>) -> Self {
        let records = (0..size)
            .map(|index| Record::dummy(&format!("repository-{page}-{index}")))
            .collect();

        Self::new(records, Some(PageToken::Offset(page + 1)), total_count)
    }
}
