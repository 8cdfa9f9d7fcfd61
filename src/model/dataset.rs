//! Deduplication and merge of independently collected record sets.
//!
//! Records are identified by their normalized URL. None of the functions mutate
//! their inputs.

use std::collections::{HashMap, HashSet};

use super::Record;

const GITHUB_HOST: &str = "github.com/";

/// Normalizes a URL for comparison: trimmed and lower-cased.
pub fn normalize_url(url: &str) -> String {
    url.trim().to_lowercase()
}

/// Keeps the first record of each normalized URL, preserving order.
pub fn deduplicate(records: &[Record]) -> Vec<Record> {
    let mut seen = HashSet::new();

    records
        .iter()
        .filter(|record| seen.insert(record.key()))
        .cloned()
        .collect()
}

/// Merges two record sets with a left-biased field-wise fill.
///
/// Records present in both sets keep the fields of the left one and take the
/// missing ones from the right one. Left records come first, followed by the
/// right-only records in their original order.
pub fn merge(left: &[Record], right: &[Record]) -> Vec<Record> {
    let right_by_key = right
        .iter()
        .rev()
        .map(|record| (record.key(), record))
        .collect::<HashMap<_, _>>();
    let mut merged = deduplicate(left);
    for record in merged.iter_mut() {
        if let Some(other) = right_by_key.get(&record.key()) {
            record.fill_from(other);
        }
    }
    let left_keys = merged.iter().map(Record::key).collect::<HashSet<_>>();
    merged.extend(
        deduplicate(right)
            .into_iter()
            .filter(|record| !left_keys.contains(&record.key())),
    );

    merged
}

/// Returns the left records whose URL also appears in the right set.
pub fn overlap(left: &[Record], right: &[Record]) -> Vec<Record> {
    let right_keys = right.iter().map(Record::key).collect::<HashSet<_>>();

    left.iter()
        .filter(|record| right_keys.contains(&record.key()))
        .cloned()
        .collect()
}

/// Returns the right records whose URL does not appear in the left set.
pub fn exclude(left: &[Record], right: &[Record]) -> Vec<Record> {
    let left_keys = left.iter().map(Record::key).collect::<HashSet<_>>();

    right
        .iter()
        .filter(|record| !left_keys.contains(&record.key()))
        .cloned()
        .collect()
}

/// Extracts the `owner/repository` path of a GitHub URL.
pub fn github_repository_path(url: &str) -> Option<String> {
    let (_, path) = url.trim().split_once(GITHUB_HOST)?;
    let mut segments = path.split('/').filter(|segment| !segment.is_empty());
    let owner = segments.next()?;
    let repository = segments.next()?.trim_end_matches(".git");
    if repository.is_empty() {
        return None;
    }

    Some(format!("{owner}/{repository}"))
}
