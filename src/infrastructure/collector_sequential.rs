use std::{collections::HashSet, sync::Arc, time::Duration};

use log::{error, info, warn};

use crate::{
    Clock, Collection, CollectionAborted, CollectionLimits, CollectionState, FetchError, Page,
    PageFetcher, PageToken, RecordCollector, SearchQuery,
};

/// The delay applied between two page requests of the same query.
pub const DEFAULT_PACING_DELAY: Duration = Duration::from_secs(1);

/// A collector that fetches the pages of a query one after the other.
pub struct SequentialCollector {
    fetcher: Arc<dyn PageFetcher>,
    clock: Arc<dyn Clock>,
    pacing_delay: Duration,
}

impl SequentialCollector {
    /// Creates a new `SequentialCollector` instance with the given fetcher and pacing delay.
    pub fn new(fetcher: Arc<dyn PageFetcher>, clock: Arc<dyn Clock>, pacing_delay: Duration) -> Self {
        Self {
            fetcher,
            clock,
            pacing_delay,
        }
    }

    /// Appends a page and decides which token to fetch next, if any.
    fn process_page(
        &self,
        page: Page,
        limits: &CollectionLimits,
        consumed: &HashSet<PageToken>,
        collection: &mut Collection,
    ) -> Option<PageToken> {
        let page_length = page.fetched;
        let total_count = page.total_count;
        collection.accumulate(page.records, total_count, limits.cap);
        let collected = collection.records().len();

        let is_done = collected >= limits.cap
            || page_length < limits.page_size as usize
            || collection
                .total_count()
                .is_some_and(|total| collected as u64 >= total);
        if is_done {
            return None;
        }
        match page.next {
            Some(next) if consumed.contains(&next) => {
                warn!("Continuation token already consumed, stopping: {next}");
                None
            }
            next => next,
        }
    }
}

#[async_trait::async_trait]
impl RecordCollector for SequentialCollector {
    async fn collect(
        &self,
        query: &SearchQuery,
        limits: CollectionLimits,
    ) -> Result<Collection, CollectionAborted> {
        let mut collection = Collection::new();
        if limits.cap == 0 {
            collection.transition(CollectionState::Done);
            return Ok(collection);
        }

        let mut consumed = HashSet::new();
        let mut token = PageToken::Start;
        loop {
            if collection.pages_fetched() > 0 {
                self.clock.sleep(self.pacing_delay).await;
            }
            collection.transition(CollectionState::Fetching);
            info!("Fetching {token} for {query}");
            consumed.insert(token.clone());
            match self.fetcher.fetch(query, &token, limits.page_size).await {
                Ok(page) => {
                    let next = self.process_page(page, &limits, &consumed, &mut collection);
                    info!(
                        "Collected records={}/{}, pages={}, total={:?}",
                        collection.records().len(),
                        limits.cap,
                        collection.pages_fetched(),
                        collection.total_count()
                    );
                    match next {
                        Some(next) => token = next,
                        None => {
                            collection.transition(CollectionState::Done);
                            break;
                        }
                    }
                }
                Err(FetchError::RateLimit(source)) => {
                    error!("Collection aborted for {query}: {source}");
                    collection.transition(CollectionState::Failed);
                    return Err(CollectionAborted {
                        partial: collection,
                        source,
                    });
                }
                Err(e) => {
                    error!("Collection stopped for {query}: {e}");
                    collection.transition(CollectionState::Failed);
                    break;
                }
            }
        }

        Ok(collection)
    }
}
