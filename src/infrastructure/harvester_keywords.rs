use std::sync::Arc;

use log::{error, info};

use crate::{
    CollectionLimits, HarvestError, Record, RecordCollector, RecordEnricher, RecordPersister,
    SearchQuery, deduplicate, enrich_all, exclude,
};

/// Searches a list of keywords one after the other and grows a dataset with their results.
///
/// Each record is tagged with the first keyword that found it. Only records new to the
/// dataset are enriched. With a checkpoint, the dataset is saved after every keyword.
pub struct KeywordHarvester {
    collector: Arc<dyn RecordCollector>,
    enricher: Option<Arc<dyn RecordEnricher>>,
    checkpoint: Option<Arc<dyn RecordPersister>>,
}

impl KeywordHarvester {
    /// Creates a new `KeywordHarvester` without enrichment nor checkpoint.
    pub fn new(collector: Arc<dyn RecordCollector>) -> Self {
        Self {
            collector,
            enricher: None,
            checkpoint: None,
        }
    }

    /// Enriches the new records of every keyword.
    pub fn with_enricher(self, enricher: Arc<dyn RecordEnricher>) -> Self {
        Self {
            enricher: Some(enricher),
            ..self
        }
    }

    /// Saves the whole dataset after every keyword.
    pub fn with_checkpoint(self, checkpoint: Arc<dyn RecordPersister>) -> Self {
        Self {
            checkpoint: Some(checkpoint),
            ..self
        }
    }

    async fn save(&self, dataset: &[Record]) -> Result<(), HarvestError> {
        if let Some(checkpoint) = &self.checkpoint {
            checkpoint.persist(dataset).await?;
        }

        Ok(())
    }

    /// Searches every keyword and returns `dataset` extended with the records it lacked.
    pub async fn harvest(
        &self,
        keywords: &[String],
        sort: Option<&str>,
        limits: CollectionLimits,
        dataset: Vec<Record>,
    ) -> Result<Vec<Record>, HarvestError> {
        let mut dataset = deduplicate(&dataset);
        for keyword in keywords {
            let query = SearchQuery::new(keyword, sort.map(str::to_string));
            let (collection, mut failure) = match self.collector.collect(&query, limits).await {
                Ok(collection) => (collection, None),
                Err(aborted) => (aborted.partial, Some(aborted.source)),
            };
            let tagged = collection
                .into_records()
                .into_iter()
                .map(|record| Record {
                    search_keyword: Some(keyword.clone()),
                    ..record
                })
                .collect::<Vec<_>>();
            let mut fresh = deduplicate(&exclude(&dataset, &tagged));
            if failure.is_none() {
                if let Some(enricher) = &self.enricher {
                    failure = enrich_all(enricher.as_ref(), &mut fresh).await.err();
                }
            }
            info!(
                "'{keyword}': {} repositories found, {} new",
                tagged.len(),
                fresh.len()
            );
            dataset.extend(fresh);

            if let Some(source) = failure {
                if let Err(e) = self.save(&dataset).await {
                    error!("Unable to save the dataset after the abort: {e}");
                }
                return Err(HarvestError::Aborted {
                    records: dataset,
                    source,
                });
            }
            self.save(&dataset).await?;
        }

        Ok(dataset)
    }
}
