//! The assembled per-run report handed to the presentation layer.

use chrono::{DateTime, Utc};
use jam_watch_analytics_models::{
    Alert, DiffResult, EntityAppearance, Kpis, RegionCount, TrendSeries,
};
use jam_watch_run_models::{Event, SkippedRun};
use serde::{Deserialize, Serialize};

use crate::context::RunLifecycle;

/// Everything computed for the active run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// File name of the active run.
    pub run_name: String,
    /// Save time of the active run.
    pub run_time: DateTime<Utc>,
    /// File name of the run compared against, if any.
    pub previous_run_name: Option<String>,
    /// Lifecycle stage of the active run.
    pub lifecycle: RunLifecycle,
    /// Headline numbers.
    pub kpis: Kpis,
    /// Set differences against the previous run.
    pub diff: DiffResult,
    /// Alerts raised by the diff. Empty on a first run.
    pub alerts: Vec<Alert>,
    /// Latest events of newly detected entities. Empty on a first run.
    pub new_entities: Vec<Event>,
    /// Per-region counts in both runs.
    pub regions: Vec<RegionCount>,
    /// Percentage of previous regions still active. `None` on a first run.
    pub stability_pct: Option<f64>,
    /// Appearance counts across the window, most persistent first.
    pub persistence: Vec<EntityAppearance>,
    /// Entity counts across the window, oldest first.
    pub trend: TrendSeries,
    /// Runs left out because they could not be parsed.
    pub skipped_runs: Vec<SkippedRun>,
}

impl RunReport {
    /// Whether the report is baseline-only (no previous run compared).
    #[must_use]
    pub const fn is_first_run(&self) -> bool {
        self.diff.first_run
    }
}
