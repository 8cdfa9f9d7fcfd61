use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};

use crate::{Record, RecordPersister, StdResult};

/// The column of the keyword database.
pub const KEYWORDS_COLUMN: &str = "Keywords";

/// One row of the records CSV file.
#[derive(Serialize, Deserialize, Debug)]
struct CsvRow {
    #[serde(rename = "Name")]
    name: Option<String>,
    #[serde(rename = "Stars")]
    stars: Option<u32>,
    #[serde(rename = "Forks")]
    forks: Option<u32>,
    #[serde(rename = "Language")]
    language: Option<String>,
    #[serde(rename = "Description")]
    description: Option<String>,
    #[serde(rename = "URL")]
    url: String,
    #[serde(rename = "Contributors")]
    contributors: Option<u32>,
    #[serde(rename = "Commits")]
    commits: Option<u32>,
    #[serde(rename = "Open Issues")]
    open_issues: Option<u32>,
    #[serde(rename = "Search Keyword", default)]
    search_keyword: Option<String>,
}

impl From<&Record> for CsvRow {
    fn from(record: &Record) -> Self {
        Self {
            name: record.name.clone(),
            stars: record.stars,
            forks: record.forks,
            language: record.language.clone(),
            description: record.description.clone(),
            url: record.url.clone(),
            contributors: record.contributors,
            commits: record.commits,
            open_issues: record.open_issues,
            search_keyword: record.search_keyword.clone(),
        }
    }
}

impl From<CsvRow> for Record {
    fn from(row: CsvRow) -> Self {
        Self {
            name: row.name,
            stars: row.stars,
            forks: row.forks,
            language: row.language,
            description: row.description,
            contributors: row.contributors,
            commits: row.commits,
            open_issues: row.open_issues,
            search_keyword: row.search_keyword,
            ..Record::new(&row.url)
        }
    }
}

/// Builds `<dir>/<prefix>_<YYYYmmdd_HHMMSS>.<extension>`, creating `dir` if needed.
pub fn timestamped_path(
    dir: &Path,
    prefix: &str,
    extension: &str,
    now: DateTime<Utc>,
) -> StdResult<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    Ok(dir.join(format!(
        "{prefix}_{}.{extension}",
        now.format("%Y%m%d_%H%M%S")
    )))
}

/// A persister that writes records to a CSV file, replacing its content.
pub struct CsvPersister {
    path: PathBuf,
}

impl CsvPersister {
    /// Creates a new `CsvPersister` instance for the given file.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

#[async_trait::async_trait]
impl RecordPersister for CsvPersister {
    async fn persist(&self, records: &[Record]) -> StdResult<u32> {
        let mut writer = csv::Writer::from_path(&self.path)
            .with_context(|| format!("Failed to create {}", self.path.display()))?;
        for record in records {
            writer.serialize(CsvRow::from(record))?;
        }
        writer.flush()?;
        info!("Saved {} records to {}", records.len(), self.path.display());

        Ok(records.len() as u32)
    }
}

/// Reads records from a CSV file written by `CsvPersister`.
pub fn read_records_csv(path: &Path) -> StdResult<Vec<Record>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    reader
        .deserialize::<CsvRow>()
        .map(|row| {
            row.map(Record::from)
                .with_context(|| format!("Invalid row in {}", path.display()))
        })
        .collect()
}

/// Reads the keyword database. A missing file is an empty database.
pub fn read_keywords(path: &Path) -> StdResult<Vec<String>> {
    if !path.exists() {
        return Ok(vec![]);
    }
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let column = reader
        .headers()?
        .iter()
        .position(|header| header == KEYWORDS_COLUMN)
        .with_context(|| format!("No {KEYWORDS_COLUMN} column in {}", path.display()))?;

    let mut keywords = vec![];
    for row in reader.records() {
        if let Some(keyword) = row?.get(column) {
            keywords.push(keyword.to_string());
        }
    }

    Ok(keywords)
}

/// Writes the keyword database, replacing its content.
pub fn write_keywords(path: &Path, keywords: &[String]) -> StdResult<()> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writer.write_record([KEYWORDS_COLUMN])?;
    for keyword in keywords {
        writer.write_record([keyword])?;
    }
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[tokio::test]
    async fn persist_writes_fixed_header_and_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("repositories.csv");
        let records = vec![
            Record {
                description: Some("Twin, with a comma".to_string()),
                contributors: Some(12),
                ..Record::dummy("a")
            },
            Record::new("https://github.com/org-1/b"),
        ];

        let written = CsvPersister::new(&path).persist(&records).await.unwrap();
        let content = fs::read_to_string(&path).unwrap();
        let read = read_records_csv(&path).unwrap();

        assert_eq!(2, written);
        assert!(content.starts_with(
            "Name,Stars,Forks,Language,Description,URL,Contributors,Commits,Open Issues,Search Keyword\n"
        ));
        assert_eq!(
            Some("Twin, with a comma".to_string()),
            read[0].description
        );
        assert_eq!(Some(12), read[0].contributors);
        assert_eq!(None, read[1].stars);
        assert_eq!("https://github.com/org-1/b", read[1].url);
    }

    #[test]
    fn timestamped_path_embeds_time() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap();

        let path = timestamped_path(&dir.path().join("out"), "repos", "csv", now).unwrap();

        assert_eq!(
            dir.path().join("out").join("repos_20250304_050607.csv"),
            path
        );
        assert!(dir.path().join("out").is_dir());
    }

    #[test]
    fn keywords_round_trip_through_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keywords_database.csv");
        let keywords = vec!["digital twin".to_string(), "cyber-physical system".to_string()];

        write_keywords(&path, &keywords).unwrap();

        assert_eq!(keywords, read_keywords(&path).unwrap());
        assert!(
            read_keywords(&dir.path().join("missing.csv"))
                .unwrap()
                .is_empty()
        );
    }
}
