use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
};

use anyhow::Context;
use log::info;

use crate::{Record, RecordPersister, StdResult};

/// A persister that writes the raw record list to a JSON file.
pub struct JsonPersister {
    path: PathBuf,
}

impl JsonPersister {
    /// Creates a new `JsonPersister` instance for the given file.
    pub fn new(path: &std::path::Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

#[async_trait::async_trait]
impl RecordPersister for JsonPersister {
    async fn persist(&self, records: &[Record]) -> StdResult<u32> {
        let file = File::create(&self.path)
            .with_context(|| format!("Failed to create {}", self.path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, records)?;
        writer.flush()?;
        info!("Saved {} records to {}", records.len(), self.path.display());

        Ok(records.len() as u32)
    }
}
