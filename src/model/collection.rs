use std::fmt::Display;

use serde::Serialize;

use super::Record;

/// The states of a collection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CollectionState {
    /// A page request is in flight.
    Fetching,
    /// A page was received and its records are being appended.
    Accumulating,
    /// No more results are expected.
    Done,
    /// A page request failed; the records gathered so far are kept.
    Failed,
}

impl Display for CollectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            CollectionState::Fetching => "FETCHING",
            CollectionState::Accumulating => "ACCUMULATING",
            CollectionState::Done => "DONE",
            CollectionState::Failed => "FAILED",
        };
        write!(f, "{label}")
    }
}

/// The bounds of one collection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionLimits {
    /// The maximum number of records to return.
    pub cap: usize,
    /// The number of records requested per page.
    pub page_size: u16,
}

impl CollectionLimits {
    /// Creates a new `CollectionLimits` instance.
    pub fn new(cap: usize, page_size: u16) -> Self {
        Self { cap, page_size }
    }
}

/// The records accumulated by a collection run and the state it ended in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    records: Vec<Record>,
    state: CollectionState,
    pages_fetched: u32,
    total_count: Option<u64>,
}

impl Collection {
    /// Creates an empty collection in the `Fetching` state.
    pub fn new() -> Self {
        Self {
            records: vec![],
            state: CollectionState::Fetching,
            pages_fetched: 0,
            total_count: None,
        }
    }

    /// Creates a collection with the given records and final state.
    pub fn with_records(records: Vec<Record>, state: CollectionState) -> Self {
        Self {
            records,
            state,
            ..Self::new()
        }
    }

    /// Retrieves the accumulated records.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Consumes the collection and returns its records.
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// Retrieves the current state.
    pub fn state(&self) -> CollectionState {
        self.state
    }

    /// Retrieves the number of pages received.
    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    /// Retrieves the last total reported by the server.
    pub fn total_count(&self) -> Option<u64> {
        self.total_count
    }

    /// Whether the collection reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self.state, CollectionState::Done | CollectionState::Failed)
    }

    pub(crate) fn transition(&mut self, state: CollectionState) {
        self.state = state;
    }

    /// Appends the records of a page without exceeding `cap`.
    ///
    /// Returns the number of records appended.
    pub(crate) fn accumulate(
        &mut self,
        records: Vec<Record>,
        total_count: Option<u64>,
        cap: usize,
    ) -> usize {
        self.state = CollectionState::Accumulating;
        self.pages_fetched += 1;
        if total_count.is_some() {
            self.total_count = total_count;
        }
        let room = cap.saturating_sub(self.records.len());
        let appended = records.len().min(room);
        self.records.extend(records.into_iter().take(appended));

        appended
    }

    /// Appends the records of another collection, as an outer loop does with its windows.
    ///
    /// Window totals add up, since windows partition the query.
    pub(crate) fn absorb(&mut self, other: Collection) {
        self.pages_fetched += other.pages_fetched;
        if let Some(total) = other.total_count {
            self.total_count = Some(self.total_count.unwrap_or(0) + total);
        }
        self.records.extend(other.records);
    }
}

impl Default for Collection {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Collection: state={}, records={}, pages={}, total={}",
            self.state,
            self.records.len(),
            self.pages_fetched,
            self.total_count
                .map(|total| total.to_string())
                .unwrap_or("?".to_string())
        )
    }
}
