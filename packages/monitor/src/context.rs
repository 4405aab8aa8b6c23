//! Session state carried explicitly between monitor calls.

use jam_watch_analytics_models::ReducedState;
use jam_watch_run_models::{RawSnapshot, RunFile};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};

/// Where the monitor is in its run history.
///
/// `NoRunsYet -> FirstRunCaptured -> SteadyState`, after which every capture
/// stays in `SteadyState`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RunLifecycle {
    /// Nothing has been captured.
    #[default]
    NoRunsYet,
    /// The active run is the only run on disk.
    FirstRunCaptured,
    /// The active run has predecessors to compare against.
    SteadyState,
}

impl RunLifecycle {
    /// Lifecycle of a newly active run, given whether any earlier run
    /// exists.
    #[must_use]
    pub const fn after_capture(has_earlier_runs: bool) -> Self {
        if has_earlier_runs {
            Self::SteadyState
        } else {
            Self::FirstRunCaptured
        }
    }
}

/// The run that reports are computed for.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveRun {
    /// The run's file on disk.
    pub run: RunFile,
    /// The rows as fetched.
    pub snapshot: RawSnapshot,
    /// Latest event per entity.
    pub state: ReducedState,
}

/// Caller-owned session context: the active run and the lifecycle stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonitorContext {
    active: Option<ActiveRun>,
    lifecycle: RunLifecycle,
}

impl MonitorContext {
    /// A context with nothing captured yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn active(&self) -> Option<&ActiveRun> {
        self.active.as_ref()
    }

    #[must_use]
    pub const fn lifecycle(&self) -> RunLifecycle {
        self.lifecycle
    }

    /// Makes `run` the active run.
    pub(crate) fn activate(&mut self, run: ActiveRun, has_earlier_runs: bool) {
        self.lifecycle = RunLifecycle::after_capture(has_earlier_runs);
        self.active = Some(run);
    }
}
