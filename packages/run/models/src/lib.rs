#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Detection event and run snapshot types.
//!
//! A run is one fetch of the upstream jamming-event table. The fetched rows
//! form a [`RawSnapshot`], which is persisted verbatim as a [`RunFile`]
//! whose name embeds the save time at second precision.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter};

/// Identifier of a tracked entity (a vessel).
pub type EntityId = i64;

/// Prefix shared by every run file name.
pub const RUN_FILE_PREFIX: &str = "run_";

/// Extension shared by every run file name.
pub const RUN_FILE_EXTENSION: &str = ".csv";

/// `chrono` format of the timestamp embedded in run file names.
pub const RUN_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// One detection record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Entity the detection belongs to.
    pub entity_id: EntityId,
    /// Region (EEZ) the detection was attributed to. `None` when the
    /// upstream row had no region.
    pub region: Option<String>,
    /// When the detection started.
    pub timestamp: DateTime<Utc>,
    /// Latitude (WGS84), if known.
    pub latitude: Option<f64>,
    /// Longitude (WGS84), if known.
    pub longitude: Option<f64>,
}

impl Event {
    /// Creates an event without coordinates. The region is normalised with
    /// [`Self::clean_region`].
    #[must_use]
    pub fn new(entity_id: EntityId, region: Option<&str>, timestamp: DateTime<Utc>) -> Self {
        Self {
            entity_id,
            region: Self::clean_region(region),
            timestamp,
            latitude: None,
            longitude: None,
        }
    }

    /// Trims a region name. Blank names become `None`.
    ///
    /// Run files store regions in this form, so events must be normalised
    /// before a fresh fetch can be compared with a reloaded run.
    #[must_use]
    pub fn clean_region(region: Option<&str>) -> Option<String> {
        region
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(ToOwned::to_owned)
    }

    /// The event with its region normalised.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.region = Self::clean_region(self.region.as_deref());
        self
    }

    /// Attaches a position to the event.
    #[must_use]
    pub const fn with_position(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }
}

/// The ordered rows captured by a single fetch.
///
/// May hold several events per entity. Never mutated once created.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSnapshot {
    events: Vec<Event>,
}

impl RawSnapshot {
    #[must_use]
    pub const fn new(events: Vec<Event>) -> Self {
        Self { events }
    }

    /// Events in fetch order.
    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[must_use]
    pub fn into_events(self) -> Vec<Event> {
        self.events
    }

    /// The snapshot as it reads back from a run file.
    #[must_use]
    pub fn normalized(self) -> Self {
        self.events.into_iter().map(Event::normalized).collect()
    }
}

impl FromIterator<Event> for RawSnapshot {
    fn from_iter<T: IntoIterator<Item = Event>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// A persisted run snapshot on disk.
///
/// Ordered by embedded save time, then by collision sequence. This matches
/// the lexicographic order of the file names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunFile {
    /// Full path of the file.
    pub path: PathBuf,
    /// File name (e.g. `run_20250301_120000.csv`).
    pub name: String,
    /// Save time embedded in the file name.
    pub saved_at: DateTime<Utc>,
    /// Collision sequence. `0` for the first save within a second.
    pub sequence: u32,
}

impl RunFile {
    /// Builds the file name for a save at `saved_at`.
    ///
    /// A non-zero `sequence` appends a zero-padded suffix so that names
    /// still sort chronologically.
    #[must_use]
    pub fn file_name(saved_at: DateTime<Utc>, sequence: u32) -> String {
        let stamp = saved_at.format(RUN_TIMESTAMP_FORMAT);
        if sequence == 0 {
            format!("{RUN_FILE_PREFIX}{stamp}{RUN_FILE_EXTENSION}")
        } else {
            format!("{RUN_FILE_PREFIX}{stamp}_{sequence:03}{RUN_FILE_EXTENSION}")
        }
    }

    /// Parses a run file from its path. Returns `None` when the file name
    /// does not follow the run naming convention.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let stem = name
            .strip_prefix(RUN_FILE_PREFIX)?
            .strip_suffix(RUN_FILE_EXTENSION)?;

        // "YYYYMMDD_HHMMSS" is 15 bytes; anything after is "_NNN".
        let (stamp, rest) = stem.split_at_checked(15)?;
        let sequence = if rest.is_empty() {
            0
        } else {
            let digits = rest.strip_prefix('_')?;
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            digits.parse().ok()?
        };

        let saved_at = NaiveDateTime::parse_from_str(stamp, RUN_TIMESTAMP_FORMAT)
            .ok()?
            .and_utc();

        Some(Self {
            path: path.to_path_buf(),
            name: name.to_owned(),
            saved_at,
            sequence,
        })
    }
}

impl PartialOrd for RunFile {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RunFile {
    fn cmp(&self, other: &Self) -> Ordering {
        self.saved_at
            .cmp(&other.saved_at)
            .then(self.sequence.cmp(&other.sequence))
            .then_with(|| self.name.cmp(&other.name))
    }
}

/// A run file that was left out of a computation because it could not be
/// parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedRun {
    /// File name of the skipped run.
    pub name: String,
    /// Why the file was skipped.
    pub reason: String,
}

/// Canonical columns of a run table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, AsRefStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Column {
    EntityId,
    Region,
    Timestamp,
    Latitude,
    Longitude,
}

impl Column {
    /// Columns a table must provide to be a valid snapshot.
    pub const REQUIRED: [Self; 3] = [Self::EntityId, Self::Region, Self::Timestamp];

    /// All columns in the order they are written to run files.
    pub const ALL: [Self; 5] = [
        Self::EntityId,
        Self::Region,
        Self::Timestamp,
        Self::Latitude,
        Self::Longitude,
    ];

    /// Resolves a header to a column.
    ///
    /// Returns the column and whether the header was the canonical name (as
    /// opposed to an upstream alias such as `vesselid`). A leading byte
    /// order mark is ignored.
    #[must_use]
    pub fn from_header(header: &str) -> Option<(Self, bool)> {
        let header = header
            .trim_start_matches('\u{feff}')
            .trim()
            .to_ascii_lowercase();
        let resolved = match header.as_str() {
            "entity_id" => (Self::EntityId, true),
            "region" => (Self::Region, true),
            "timestamp" => (Self::Timestamp, true),
            "latitude" => (Self::Latitude, true),
            "longitude" => (Self::Longitude, true),
            "vesselid" | "vessel_id" => (Self::EntityId, false),
            "eez_overall" | "opened_eez" => (Self::Region, false),
            "event_start" => (Self::Timestamp, false),
            "start_latitude" => (Self::Latitude, false),
            "start_longitude" => (Self::Longitude, false),
            _ => return None,
        };
        Some(resolved)
    }
}
