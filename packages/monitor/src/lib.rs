#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Run capture and reporting.
//!
//! A [`Monitor`] ties the run store to the analytics: it persists fetched
//! snapshots, tracks the active run in a caller-owned [`MonitorContext`],
//! and assembles a [`RunReport`] comparing the active run with its
//! predecessor and with the recent window of runs.

pub mod config;
pub mod context;
pub mod report;

use chrono::{DateTime, Utc};
use jam_watch_analytics::{
    build_trend, derive_alerts, diff, kpis, lookup, new_entity_events, persistence,
    ranked_appearances, reduce, region_counts, stability,
};
use jam_watch_analytics_models::{EventFilter, ReducedState};
use jam_watch_run_models::{Event, RawSnapshot, RunFile, SkippedRun};
use jam_watch_source::{SnapshotSource, SourceError};
use jam_watch_store::{RunStore, StoreError};

pub use config::MonitorConfig;
pub use context::{ActiveRun, MonitorContext, RunLifecycle};
pub use report::RunReport;

/// Errors that can occur while capturing or reporting runs.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// Run storage failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The data source failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Invalid configuration.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },

    /// A report or lookup was requested before any run was captured.
    #[error("No active run. Fetch a snapshot to create one")]
    NoActiveRun,
}

/// Captures runs and computes reports against the run history.
#[derive(Debug, Clone)]
pub struct Monitor {
    store: RunStore,
    config: MonitorConfig,
}

impl Monitor {
    #[must_use]
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            store: RunStore::new(&config.runs_dir),
            config,
        }
    }

    #[must_use]
    pub const fn store(&self) -> &RunStore {
        &self.store
    }

    #[must_use]
    pub const fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Fetches a snapshot from `source` and captures it as a new run.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError`] if the fetch or the save fails.
    pub async fn fetch(
        &self,
        ctx: &mut MonitorContext,
        source: &dyn SnapshotSource,
    ) -> Result<RunFile, MonitorError> {
        log::info!("Fetching snapshot from {}", source.id());
        let snapshot = source.fetch().await?;
        self.capture(ctx, snapshot)
    }

    /// Persists `snapshot` as a new run and makes it the active run.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Store`] if the run cannot be saved.
    pub fn capture(
        &self,
        ctx: &mut MonitorContext,
        snapshot: RawSnapshot,
    ) -> Result<RunFile, MonitorError> {
        self.capture_at(ctx, snapshot, Utc::now())
    }

    /// Like [`Self::capture`], with an explicit save time.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Store`] if the run cannot be saved.
    pub fn capture_at(
        &self,
        ctx: &mut MonitorContext,
        snapshot: RawSnapshot,
        now: DateTime<Utc>,
    ) -> Result<RunFile, MonitorError> {
        let snapshot = snapshot.normalized();
        let has_earlier_runs = !self.store.list_runs().is_empty();
        let run = self.store.save_at(&snapshot, now)?;
        let state = reduce(&snapshot);

        ctx.activate(
            ActiveRun {
                run: run.clone(),
                snapshot,
                state,
            },
            has_earlier_runs,
        );

        log::info!("Active run is now {} ({})", run.name, ctx.lifecycle());

        Ok(run)
    }

    /// Rebuilds a context from the most recent run on disk.
    ///
    /// With no runs on disk the context is left in
    /// [`RunLifecycle::NoRunsYet`].
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Store`] if the latest run cannot be loaded.
    pub fn resume(&self) -> Result<MonitorContext, MonitorError> {
        let mut ctx = MonitorContext::new();
        let runs = self.store.list_runs();

        if let Some((latest, earlier)) = runs.split_last() {
            let snapshot = self.store.load(latest)?;
            let state = reduce(&snapshot);
            ctx.activate(
                ActiveRun {
                    run: latest.clone(),
                    snapshot,
                    state,
                },
                !earlier.is_empty(),
            );
        }

        Ok(ctx)
    }

    /// Finds the most recent loadable run among `earlier` (oldest first),
    /// recording corrupt runs passed over on the way.
    fn previous_state(
        &self,
        earlier: &[RunFile],
        skipped: &mut Vec<SkippedRun>,
    ) -> Result<Option<(RunFile, ReducedState)>, MonitorError> {
        for run in earlier.iter().rev() {
            match self.store.load(run) {
                Ok(snapshot) => return Ok(Some((run.clone(), reduce(&snapshot)))),
                Err(e) if e.is_corrupt_run() => {
                    log::warn!("Skipping previous run candidate: {e}");
                    skipped.push(SkippedRun {
                        name: run.name.clone(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(None)
    }

    /// Computes the report for the active run.
    ///
    /// The previous run is the most recent loadable run older than the
    /// active one. Without one (or with `compare_previous` off) the report
    /// is a first run: alerts are suppressed and stability is absent. Trend
    /// and persistence cover the last [`MonitorConfig::window`] runs up to
    /// and including the active run; corrupt runs in that window are
    /// skipped and listed in the report.
    ///
    /// # Errors
    ///
    /// * [`MonitorError::NoActiveRun`] if nothing has been captured
    /// * [`MonitorError::Store`] if a run file cannot be read at all
    pub fn report(&self, ctx: &MonitorContext) -> Result<RunReport, MonitorError> {
        let active = ctx.active().ok_or(MonitorError::NoActiveRun)?;
        let current = &active.state;

        let earlier: Vec<RunFile> = self
            .store
            .list_runs()
            .into_iter()
            .filter(|run| run < &active.run)
            .collect();

        let mut skipped = Vec::new();

        let previous = if self.config.compare_previous {
            self.previous_state(&earlier, &mut skipped)?
        } else {
            None
        };
        let previous_state = previous.as_ref().map(|(_, state)| state);

        let result = diff(current, previous_state);
        let alerts = derive_alerts(&result, &self.config.alert_config());

        for alert in &alerts {
            log::warn!("{alert}");
        }

        let window_start = earlier.len().saturating_sub(self.config.window() - 1);
        let loaded = self.store.load_all(&earlier[window_start..])?;

        for run in loaded.skipped {
            if !skipped.contains(&run) {
                skipped.push(run);
            }
        }

        let mut window: Vec<(DateTime<Utc>, ReducedState)> = loaded
            .runs
            .iter()
            .map(|run| (run.run.saved_at, reduce(&run.snapshot)))
            .collect();
        window.push((active.run.saved_at, current.clone()));

        let states: Vec<ReducedState> = window.iter().map(|(_, state)| state.clone()).collect();

        Ok(RunReport {
            run_name: active.run.name.clone(),
            run_time: active.run.saved_at,
            previous_run_name: previous.as_ref().map(|(run, _)| run.name.clone()),
            lifecycle: ctx.lifecycle(),
            kpis: kpis(current, &result),
            alerts,
            new_entities: new_entity_events(current, &result),
            regions: region_counts(current, previous_state, &result),
            stability_pct: previous_state.map(|previous| stability(current, previous)),
            persistence: ranked_appearances(&persistence(&states)),
            trend: build_trend(&window),
            skipped_runs: skipped,
            diff: result,
        })
    }

    /// Looks up events of the active run.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::NoActiveRun`] if nothing has been captured.
    pub fn lookup(
        &self,
        ctx: &MonitorContext,
        filter: &EventFilter,
    ) -> Result<Vec<Event>, MonitorError> {
        let active = ctx.active().ok_or(MonitorError::NoActiveRun)?;
        Ok(lookup(&active.state, filter).into_iter().cloned().collect())
    }
}
