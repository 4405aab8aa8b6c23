#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Upstream data sources for run snapshots.
//!
//! A source produces the raw jamming-event table for one run. How the table
//! is obtained (warehouse query, API, exported file) is up to each
//! [`SnapshotSource`] implementation; the monitor only relies on the event
//! schema of the returned [`RawSnapshot`].

pub mod csv_export;

use std::path::PathBuf;

use async_trait::async_trait;
use jam_watch_run_models::RawSnapshot;
use jam_watch_store::table::TableError;

pub use csv_export::CsvExportSource;

/// Errors that can occur while fetching a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The source file could not be read.
    #[error("I/O error reading {}: {source}", path.display())]
    Io {
        /// Path being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The fetched table does not match the event schema.
    #[error("Schema error: {0}")]
    Schema(#[from] TableError),
}

/// Trait that all snapshot sources must implement.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Returns a unique identifier for this source (e.g., `"csv_export"`).
    fn id(&self) -> &str;

    /// Fetches the current event table.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the table cannot be read or does not match
    /// the event schema.
    async fn fetch(&self) -> Result<RawSnapshot, SourceError>;
}
