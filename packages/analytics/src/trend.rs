//! Entity-count trend across runs.

use chrono::{DateTime, Utc};
use jam_watch_analytics_models::{ReducedState, TrendPoint, TrendSeries};

/// Maps each run of the window to its entity count, ascending by run time.
///
/// The window is re-sorted rather than trusted to be in order. The sort is
/// stable, so runs saved at the same instant keep their relative order.
#[must_use]
pub fn build_trend(window: &[(DateTime<Utc>, ReducedState)]) -> TrendSeries {
    let mut points: Vec<TrendPoint> = window
        .iter()
        .map(|(run_time, state)| TrendPoint {
            run_time: *run_time,
            entity_count: state.len(),
        })
        .collect();

    points.sort_by_key(|point| point.run_time);

    TrendSeries { points }
}
