//! Event lookup over a reduced state.

use jam_watch_analytics_models::{EventFilter, ReducedState};
use jam_watch_run_models::Event;

fn matches(filter: &EventFilter, needle: Option<&str>, event: &Event) -> bool {
    if filter.entity_id.is_some_and(|id| id != event.entity_id) {
        return false;
    }

    if let Some(needle) = needle {
        let region = event.region.as_deref().unwrap_or_default().to_lowercase();
        if !region.contains(needle) {
            return false;
        }
    }

    let day = event.timestamp.date_naive();
    if filter.from.is_some_and(|from| day < from) || filter.to.is_some_and(|to| day > to) {
        return false;
    }

    true
}

/// Returns the latest events matching `filter`, ordered by entity ID.
///
/// Region matching is a case-insensitive substring test; entities without a
/// region only match an empty needle. Date bounds are inclusive calendar
/// days in UTC.
#[must_use]
pub fn lookup<'a>(state: &'a ReducedState, filter: &EventFilter) -> Vec<&'a Event> {
    let needle = filter.region_contains.as_deref().map(str::to_lowercase);
    state
        .events()
        .filter(|event| matches(filter, needle.as_deref(), event))
        .collect()
}
