use std::{collections::HashSet, sync::Arc};

use log::{error, info, warn};

use crate::{
    RateLimitError, Record, RepositoryResolver, exclude, github_repository_path, merge, overlap,
};

/// The datasets produced by merging a GitHub dataset with a Software Heritage dataset.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergedDatasets {
    /// GitHub records whose URL is also archived.
    pub duplicates: Vec<Record>,

    /// Records of archived GitHub repositories that were missing from the GitHub dataset.
    pub resolved: Vec<Record>,

    /// The union of both datasets and the resolved records, one record per URL.
    pub merged: Vec<Record>,

    /// The rate limit failure that stopped the resolution, if any.
    pub aborted: Option<RateLimitError>,
}

/// Merges a GitHub dataset with a Software Heritage dataset, optionally resolving
/// the archived GitHub repositories the GitHub dataset lacks.
pub struct DatasetMerger {
    resolver: Option<Arc<dyn RepositoryResolver>>,
}

impl DatasetMerger {
    /// Creates a new `DatasetMerger`. Without a resolver, nothing is fetched.
    pub fn new(resolver: Option<Arc<dyn RepositoryResolver>>) -> Self {
        Self { resolver }
    }

    /// Lists the `owner/name` paths of archived GitHub repositories absent from the GitHub dataset.
    pub fn resolution_candidates(github: &[Record], heritage: &[Record]) -> Vec<String> {
        let mut seen = github
            .iter()
            .filter_map(|record| github_repository_path(&record.url))
            .map(|path| path.to_lowercase())
            .collect::<HashSet<_>>();

        exclude(github, heritage)
            .iter()
            .filter_map(|record| github_repository_path(&record.url))
            .filter(|path| seen.insert(path.to_lowercase()))
            .collect()
    }

    /// Merges the datasets. GitHub fields win over resolved ones, which win over archived ones.
    pub async fn merge(&self, github: &[Record], heritage: &[Record]) -> MergedDatasets {
        let duplicates = overlap(github, heritage);
        info!("{} repositories are in both datasets", duplicates.len());

        let mut resolved = vec![];
        let mut aborted = None;
        if let Some(resolver) = &self.resolver {
            let candidates = Self::resolution_candidates(github, heritage);
            info!("Resolving {} archived GitHub repositories", candidates.len());
            for full_name in candidates {
                match resolver.resolve(&full_name).await {
                    Ok(Some(record)) => resolved.push(record),
                    Ok(None) => warn!("Skipping unavailable repository {full_name}"),
                    Err(e) => {
                        error!("Stopping resolution: {e}");
                        aborted = Some(e);
                        break;
                    }
                }
            }
            info!("Resolved {} archived GitHub repositories", resolved.len());
        }
        let merged = merge(&merge(github, &resolved), heritage);
        info!("Merged dataset holds {} repositories", merged.len());

        MergedDatasets {
            duplicates,
            resolved,
            merged,
            aborted,
        }
    }
}
