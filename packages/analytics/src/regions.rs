//! Per-region breakdowns and headline numbers for the active run.

use std::collections::BTreeMap;

use jam_watch_analytics_models::{DiffResult, Kpis, ReducedState, RegionCount, RegionStatus};
use jam_watch_run_models::Event;

fn counts_by_region(state: &ReducedState) -> BTreeMap<Option<String>, usize> {
    let mut counts = BTreeMap::new();
    for event in state.events() {
        *counts.entry(event.region.clone()).or_insert(0) += 1;
    }
    counts
}

/// Distinct entity counts per region in both runs, with each region's
/// status relative to the previous run.
///
/// Regions from either side are included; a side without the region counts
/// zero. Rows without a region form the unclassified bucket (`region:
/// None`), which is never reported as new. On a first run every region is
/// [`RegionStatus::Active`].
#[must_use]
pub fn region_counts(
    current: &ReducedState,
    previous: Option<&ReducedState>,
    diff: &DiffResult,
) -> Vec<RegionCount> {
    let mut merged: BTreeMap<Option<String>, (usize, usize)> = BTreeMap::new();

    for (region, count) in counts_by_region(current) {
        merged.entry(region).or_default().0 = count;
    }
    if let Some(previous) = previous {
        for (region, count) in counts_by_region(previous) {
            merged.entry(region).or_default().1 = count;
        }
    }

    merged
        .into_iter()
        .map(|(region, (current_count, previous_count))| {
            let status = match region.as_deref() {
                _ if diff.first_run => RegionStatus::Active,
                Some(name) if diff.new_regions.contains(name) => RegionStatus::New,
                Some(name) if diff.resolved_regions.contains(name) => RegionStatus::Resolved,
                None if current_count == 0 => RegionStatus::Resolved,
                _ => RegionStatus::Active,
            };
            RegionCount {
                region,
                current_count,
                previous_count,
                status,
            }
        })
        .collect()
}

/// Latest events of the entities that are new in this run.
///
/// Empty on a first run, where every entity is baseline.
#[must_use]
pub fn new_entity_events(current: &ReducedState, diff: &DiffResult) -> Vec<Event> {
    if diff.first_run {
        return Vec::new();
    }
    diff.new_entities
        .iter()
        .filter_map(|&id| current.get(id))
        .cloned()
        .collect()
}

/// Headline numbers for the active run.
#[must_use]
pub fn kpis(current: &ReducedState, diff: &DiffResult) -> Kpis {
    Kpis {
        total_entities: current.len(),
        new_entities: if diff.first_run {
            0
        } else {
            diff.new_entities.len()
        },
        active_regions: current.regions().active_count(),
    }
}
