use std::sync::Arc;

use log::{info, warn};

use crate::{
    Clock, Collection, CollectionAborted, CollectionLimits, CollectionState, DateWindow,
    RecordCollector, SearchQuery,
};

/// A collector that partitions a query into monthly date windows.
///
/// Each window is collected independently by the inner collector, which works around
/// the maximum number of results a single query can return.
pub struct WindowedCollector {
    /// The collector run for every window
    collector: Arc<dyn RecordCollector>,

    /// The window the partition starts at
    first_window: DateWindow,

    clock: Arc<dyn Clock>,
}

impl WindowedCollector {
    /// Creates a new `WindowedCollector` instance starting at the given window.
    pub fn new(
        collector: Arc<dyn RecordCollector>,
        first_window: DateWindow,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            collector,
            first_window,
            clock,
        }
    }
}

#[async_trait::async_trait]
impl RecordCollector for WindowedCollector {
    async fn collect(
        &self,
        query: &SearchQuery,
        limits: CollectionLimits,
    ) -> Result<Collection, CollectionAborted> {
        let today = self.clock.now().date_naive();
        let mut collection = Collection::new();
        let mut window = Some(self.first_window);

        while let Some(current) = window.filter(|window| window.start() <= today) {
            let remaining = limits.cap.saturating_sub(collection.records().len());
            if remaining == 0 {
                break;
            }
            info!("Requesting repositories for {}", current.qualifier());
            let window_limits = CollectionLimits::new(remaining, limits.page_size);
            match self
                .collector
                .collect(&query.with_window(current), window_limits)
                .await
            {
                Ok(window_collection) => {
                    if window_collection.state() == CollectionState::Failed {
                        warn!(
                            "Window {} failed after {} records",
                            current.qualifier(),
                            window_collection.records().len()
                        );
                    }
                    collection.absorb(window_collection);
                }
                Err(aborted) => {
                    collection.absorb(aborted.partial);
                    collection.transition(CollectionState::Failed);
                    return Err(CollectionAborted {
                        partial: collection,
                        source: aborted.source,
                    });
                }
            }
            window = current.next();
        }
        collection.transition(CollectionState::Done);

        Ok(collection)
    }
}
