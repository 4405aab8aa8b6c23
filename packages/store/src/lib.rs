#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! On-disk storage of run snapshots.
//!
//! Every fetch is written to its own CSV file under the runs directory,
//! named `run_YYYYMMDD_HHMMSS.csv` after the save time. The directory is
//! append-only: the store never rewrites or deletes a run file.

pub mod table;

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, SubsecRound as _, Utc};
use jam_watch_run_models::{RawSnapshot, RunFile, SkippedRun};

/// Largest collision suffix tried before a save gives up.
const MAX_SEQUENCE: u32 = 999;

/// Errors that can occur during run storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The runs directory or a run file could not be read or written.
    #[error("Storage error at {}: {source}", path.display())]
    Storage {
        /// Path that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A run file does not match the event schema.
    #[error("Corrupt run file {}: {message}", path.display())]
    CorruptRun {
        /// Path of the corrupt file.
        path: PathBuf,
        /// Description of what went wrong.
        message: String,
    },

    /// Encoding the CSV body failed for a reason other than I/O.
    #[error("CSV write error at {}: {source}", path.display())]
    Csv {
        /// Path being written.
        path: PathBuf,
        /// Underlying CSV error.
        #[source]
        source: csv::Error,
    },

    /// Every collision suffix for one second is taken.
    #[error("No free run file name left for {saved_at}")]
    NamesExhausted {
        /// Save time whose names are exhausted.
        saved_at: DateTime<Utc>,
    },
}

impl StoreError {
    fn storage(path: &Path, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.to_path_buf(),
            source,
        }
    }

    /// I/O failures surfacing through the CSV writer are storage errors.
    fn csv(path: &Path, source: csv::Error) -> Self {
        if !source.is_io_error() {
            return Self::Csv {
                path: path.to_path_buf(),
                source,
            };
        }
        match source.into_kind() {
            csv::ErrorKind::Io(e) => Self::storage(path, e),
            kind => Self::storage(path, std::io::Error::other(format!("{kind:?}"))),
        }
    }

    /// Whether the error only concerns a single unreadable run file.
    #[must_use]
    pub const fn is_corrupt_run(&self) -> bool {
        matches!(self, Self::CorruptRun { .. })
    }
}

/// A run file together with its decoded snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedRun {
    pub run: RunFile,
    pub snapshot: RawSnapshot,
}

/// Result of loading a window of recent runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowLoad {
    /// Successfully loaded runs, oldest first.
    pub runs: Vec<LoadedRun>,
    /// Runs in the window that were skipped because they are corrupt.
    pub skipped: Vec<SkippedRun>,
}

/// Manages the append-only directory of run files.
#[derive(Debug, Clone)]
pub struct RunStore {
    dir: PathBuf,
}

impl RunStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The runs directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persists a snapshot as a new run file stamped with the current time.
    ///
    /// # Errors
    ///
    /// * [`StoreError::Storage`] if the runs directory is not writable
    /// * [`StoreError::Storage`] if the body cannot be written; the partial
    ///   file is removed
    /// * [`StoreError::Csv`] if the body cannot be encoded
    pub fn save(&self, snapshot: &RawSnapshot) -> Result<RunFile, StoreError> {
        self.save_at(snapshot, Utc::now())
    }

    /// Persists a snapshot as a new run file stamped with `now`, truncated
    /// to whole seconds.
    ///
    /// Saves within the same second never overwrite each other: later saves
    /// get a `_NNN` suffix.
    ///
    /// # Errors
    ///
    /// * [`StoreError::Storage`] if the runs directory is not writable
    /// * [`StoreError::Storage`] if the body cannot be written; the partial
    ///   file is removed
    /// * [`StoreError::Csv`] if the body cannot be encoded
    /// * [`StoreError::NamesExhausted`] if every suffix for that second is
    ///   already taken
    pub fn save_at(
        &self,
        snapshot: &RawSnapshot,
        now: DateTime<Utc>,
    ) -> Result<RunFile, StoreError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| StoreError::storage(&self.dir, e))?;

        let saved_at = now.trunc_subsecs(0);

        for sequence in 0..=MAX_SEQUENCE {
            let name = RunFile::file_name(saved_at, sequence);
            let path = self.dir.join(&name);

            let file = match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    log::debug!("Run file {name} already exists, trying next suffix");
                    continue;
                }
                Err(e) => return Err(StoreError::storage(&path, e)),
            };

            write_or_discard(&path, BufWriter::new(file), snapshot)?;

            log::info!("Saved run {name} ({} events)", snapshot.len());

            return Ok(RunFile {
                path,
                name,
                saved_at,
                sequence,
            });
        }

        Err(StoreError::NamesExhausted { saved_at })
    }

    /// Lists all run files, oldest first.
    ///
    /// A missing or unreadable directory yields an empty list: having no
    /// runs yet is the first-run condition, not an error. Files that do not
    /// follow the run naming convention are ignored.
    #[must_use]
    pub fn list_runs(&self) -> Vec<RunFile> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                if e.kind() != ErrorKind::NotFound {
                    log::warn!("Cannot read runs directory {}: {e}", self.dir.display());
                }
                return Vec::new();
            }
        };

        let mut runs: Vec<RunFile> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
            .filter_map(|entry| RunFile::from_path(&entry.path()))
            .collect();

        runs.sort();
        runs
    }

    /// The last `n` runs, oldest first.
    #[must_use]
    pub fn latest(&self, n: usize) -> Vec<RunFile> {
        let mut runs = self.list_runs();
        let start = runs.len().saturating_sub(n);
        runs.drain(..start);
        runs
    }

    /// Reads a run file back into a snapshot.
    ///
    /// # Errors
    ///
    /// * [`StoreError::Storage`] if the file cannot be opened
    /// * [`StoreError::CorruptRun`] if the file does not match the event
    ///   schema
    pub fn load(&self, run: &RunFile) -> Result<RawSnapshot, StoreError> {
        let file = File::open(&run.path).map_err(|e| StoreError::storage(&run.path, e))?;

        let snapshot = table::read_events(BufReader::new(file)).map_err(|e| {
            StoreError::CorruptRun {
                path: run.path.clone(),
                message: e.to_string(),
            }
        })?;

        log::debug!("Loaded run {} ({} events)", run.name, snapshot.len());

        Ok(snapshot)
    }

    /// Loads each of the given runs, skipping corrupt ones.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Storage`] if a file cannot be read at all.
    /// Corrupt files are reported in [`WindowLoad::skipped`] instead.
    pub fn load_all(&self, runs: &[RunFile]) -> Result<WindowLoad, StoreError> {
        let mut window = WindowLoad::default();

        for run in runs {
            match self.load(run) {
                Ok(snapshot) => window.runs.push(LoadedRun {
                    run: run.clone(),
                    snapshot,
                }),
                Err(e) if e.is_corrupt_run() => {
                    log::warn!("Skipping run: {e}");
                    window.skipped.push(SkippedRun {
                        name: run.name.clone(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        Ok(window)
    }

    /// Loads the last `n` runs, oldest first, skipping corrupt ones.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Storage`] if a file cannot be read at all.
    pub fn load_window(&self, n: usize) -> Result<WindowLoad, StoreError> {
        self.load_all(&self.latest(n))
    }
}

/// Writes the body of a freshly created run file. On failure the partial
/// file is removed so it is never listed as a run.
fn write_or_discard<W: Write>(
    path: &Path,
    mut writer: W,
    snapshot: &RawSnapshot,
) -> Result<(), StoreError> {
    let written = table::write_events(&mut writer, snapshot)
        .map_err(|e| StoreError::csv(path, e))
        .and_then(|()| writer.flush().map_err(|e| StoreError::storage(path, e)));

    if written.is_err() {
        drop(writer);
        if let Err(e) = std::fs::remove_file(path) {
            log::warn!("Cannot remove partial run file {}: {e}", path.display());
        }
    }

    written
}
