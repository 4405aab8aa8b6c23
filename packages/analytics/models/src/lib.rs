#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Result types for run-over-run analytics.
//!
//! These are plain values handed to the presentation layer. Nothing here is
//! cached or persisted; every type is recomputed from run snapshots on
//! demand.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use jam_watch_run_models::{EntityId, Event, RawSnapshot};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Default percentage increase in entity count that raises a surge alert.
pub const DEFAULT_SURGE_THRESHOLD_PCT: f64 = 10.0;

/// Latest known event per entity.
///
/// Each entity appears exactly once, keyed by its ID.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReducedState {
    latest: BTreeMap<EntityId, Event>,
}

impl ReducedState {
    /// Wraps a map of entity ID to that entity's latest event.
    ///
    /// Callers must key every event by its own `entity_id`.
    #[must_use]
    pub const fn from_latest(latest: BTreeMap<EntityId, Event>) -> Self {
        Self { latest }
    }

    /// Number of distinct entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.latest.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.latest.is_empty()
    }

    #[must_use]
    pub fn get(&self, entity_id: EntityId) -> Option<&Event> {
        self.latest.get(&entity_id)
    }

    #[must_use]
    pub fn contains(&self, entity_id: EntityId) -> bool {
        self.latest.contains_key(&entity_id)
    }

    /// Entity IDs in ascending order.
    pub fn entity_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.latest.keys().copied()
    }

    /// Latest events, ordered by entity ID.
    pub fn events(&self) -> impl Iterator<Item = &Event> + '_ {
        self.latest.values()
    }

    /// Regions present in the state.
    #[must_use]
    pub fn regions(&self) -> RegionSet {
        let mut regions = RegionSet::default();
        for event in self.latest.values() {
            match &event.region {
                Some(region) => {
                    regions.named.insert(region.clone());
                }
                None => regions.unclassified += 1,
            }
        }
        regions
    }

    /// Turns the state back into a snapshot with one row per entity,
    /// ordered by entity ID.
    #[must_use]
    pub fn to_snapshot(&self) -> RawSnapshot {
        self.latest.values().cloned().collect()
    }
}

/// Region values of a state.
///
/// Rows without a region do not take part in region set algebra; they are
/// counted in the `unclassified` bucket instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionSet {
    /// Distinct named regions.
    pub named: BTreeSet<String>,
    /// Number of entities with no region.
    pub unclassified: usize,
}

impl RegionSet {
    /// Number of active regions, counting the unclassified bucket as one
    /// region when it is non-empty.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.named.len() + usize::from(self.unclassified > 0)
    }
}

/// Set differences between the current and the previous reduced state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffResult {
    /// `true` when there was no previous run to compare against. All
    /// differences are then baseline rather than anomalies.
    pub first_run: bool,
    /// Entities in the current state but not the previous one.
    pub new_entities: BTreeSet<EntityId>,
    /// Entities in the previous state but not the current one.
    pub removed_entities: BTreeSet<EntityId>,
    /// Named regions in the current state but not the previous one.
    pub new_regions: BTreeSet<String>,
    /// Named regions in the previous state but not the current one.
    pub resolved_regions: BTreeSet<String>,
    /// Number of entities in the current state.
    pub current_count: usize,
    /// Number of entities in the previous state.
    pub previous_count: usize,
    /// Entities without a region in the current state.
    pub unclassified_current: usize,
    /// Entities without a region in the previous state.
    pub unclassified_previous: usize,
}

impl DiffResult {
    /// Percentage change in entity count from the previous state.
    ///
    /// `None` when the previous state had no entities.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn change_pct(&self) -> Option<f64> {
        if self.previous_count == 0 {
            return None;
        }
        let current = self.current_count as f64;
        let previous = self.previous_count as f64;
        Some((current - previous) / previous * 100.0)
    }
}

/// Alert thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertConfig {
    /// Entity-count increase (in percent) that must be exceeded to raise
    /// [`Alert::VesselSurge`].
    pub surge_threshold_pct: f64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            surge_threshold_pct: DEFAULT_SURGE_THRESHOLD_PCT,
        }
    }
}

/// A condition derived from a [`DiffResult`] worth bringing to attention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Alert {
    /// A region with detections that had none in the previous run.
    #[serde(rename_all = "camelCase")]
    RegionAppeared {
        /// Region name.
        region: String,
    },
    /// A region from the previous run with no detections now.
    #[serde(rename_all = "camelCase")]
    RegionResolved {
        /// Region name.
        region: String,
    },
    /// Entity count grew by more than the configured threshold.
    #[serde(rename_all = "camelCase")]
    VesselSurge {
        /// Entities in the previous run.
        previous_count: usize,
        /// Entities in the current run.
        current_count: usize,
        /// Percentage increase.
        increase_pct: f64,
    },
}

impl std::fmt::Display for Alert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RegionAppeared { region } => write!(f, "New region detected: {region}"),
            Self::RegionResolved { region } => write!(f, "Region resolved: {region}"),
            Self::VesselSurge { increase_pct, .. } => {
                write!(f, "> {increase_pct:.0}% increase in jammed vessels")
            }
        }
    }
}

/// Entity count of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    /// When the run was saved.
    pub run_time: DateTime<Utc>,
    /// Distinct entities in the run.
    pub entity_count: usize,
}

/// Entity counts across runs, ascending by run time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrendSeries {
    pub points: Vec<TrendPoint>,
}

/// How a region relates to the previous run.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RegionStatus {
    /// Present now, absent in the previous run.
    New,
    /// Present in both runs.
    Active,
    /// Present in the previous run only.
    Resolved,
}

/// Distinct entity counts for one region in the current and previous run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionCount {
    /// Region name. `None` is the unclassified bucket.
    pub region: Option<String>,
    /// Distinct entities in the current run.
    pub current_count: usize,
    /// Distinct entities in the previous run.
    pub previous_count: usize,
    /// Relation to the previous run.
    pub status: RegionStatus,
}

/// How many runs of a window an entity appeared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityAppearance {
    pub entity_id: EntityId,
    pub appearances: usize,
}

/// Headline numbers for the active run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kpis {
    /// Distinct entities in the current run.
    pub total_entities: usize,
    /// Entities not present in the previous run. Zero on a first run.
    pub new_entities: usize,
    /// Regions with detections, including the unclassified bucket.
    pub active_regions: usize,
}

/// Criteria for looking up events in a reduced state. Unset fields match
/// everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFilter {
    /// Exact entity ID.
    pub entity_id: Option<EntityId>,
    /// Case-insensitive substring of the region name.
    pub region_contains: Option<String>,
    /// First calendar day (UTC) to include.
    pub from: Option<NaiveDate>,
    /// Last calendar day (UTC) to include.
    pub to: Option<NaiveDate>,
}
