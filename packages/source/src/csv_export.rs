//! Snapshot source backed by an exported CSV event table.
//!
//! Upstream exports use the warehouse column names (`vesselid`,
//! `eez_overall`, `event_start`, ...); these are mapped onto the run schema
//! by the shared table reader.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use jam_watch_run_models::RawSnapshot;
use jam_watch_store::table;

use crate::{SnapshotSource, SourceError};

/// Reads the event table from a CSV file on every fetch.
#[derive(Debug, Clone)]
pub struct CsvExportSource {
    id: String,
    path: PathBuf,
}

impl CsvExportSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            id: "csv_export".to_owned(),
            path: path.into(),
        }
    }

    /// Overrides the source identifier.
    #[must_use]
    pub fn with_id(mut self, id: &str) -> Self {
        id.clone_into(&mut self.id);
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SnapshotSource for CsvExportSource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn fetch(&self) -> Result<RawSnapshot, SourceError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| SourceError::Io {
                path: self.path.clone(),
                source,
            })?;

        log::debug!("Read {} bytes from {}", bytes.len(), self.path.display());

        let snapshot = table::read_events(bytes.as_slice())?;

        log::info!(
            "Fetched {} events from {} ({})",
            snapshot.len(),
            self.id,
            self.path.display()
        );

        Ok(snapshot)
    }
}
