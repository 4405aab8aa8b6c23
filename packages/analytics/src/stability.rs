//! Region stability between two runs and entity persistence across a
//! window of runs.

use std::collections::BTreeMap;

use jam_watch_analytics_models::{EntityAppearance, ReducedState};
use jam_watch_run_models::EntityId;

/// Percentage of the previous run's regions still present in the current
/// run, in `[0, 100]`.
///
/// Only named regions count. A previous run with no regions is vacuously
/// stable (100%).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn stability(current: &ReducedState, previous: &ReducedState) -> f64 {
    let previous_regions = previous.regions().named;
    if previous_regions.is_empty() {
        return 100.0;
    }

    let current_regions = current.regions().named;
    let persisted = previous_regions.intersection(&current_regions).count();

    persisted as f64 / previous_regions.len() as f64 * 100.0
}

/// Counts, for each entity seen anywhere in the window, how many of the
/// window's states contain it.
///
/// Only membership matters, so the order of `window` does not affect the
/// counts. Every count lies in `[1, window.len()]`.
#[must_use]
pub fn persistence(window: &[ReducedState]) -> BTreeMap<EntityId, usize> {
    let mut counts = BTreeMap::new();
    for state in window {
        for entity_id in state.entity_ids() {
            *counts.entry(entity_id).or_insert(0) += 1;
        }
    }
    counts
}

/// Flattens a persistence map into rows, most persistent first. Ties are
/// ordered by entity ID.
#[must_use]
pub fn ranked_appearances(counts: &BTreeMap<EntityId, usize>) -> Vec<EntityAppearance> {
    let mut rows: Vec<EntityAppearance> = counts
        .iter()
        .map(|(&entity_id, &appearances)| EntityAppearance {
            entity_id,
            appearances,
        })
        .collect();
    rows.sort_by(|a, b| {
        b.appearances
            .cmp(&a.appearances)
            .then(a.entity_id.cmp(&b.entity_id))
    });
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ids, state};

    #[test]
    fn identical_states_are_fully_stable() {
        let a = state(&[(1, Some("EEZ_A")), (2, Some("EEZ_B")), (3, None)]);
        assert!((stability(&a, &a) - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_previous_is_vacuously_stable() {
        let a = ids(&[1, 2]);
        assert!((stability(&a, &ReducedState::default()) - 100.0).abs() < f64::EPSILON);

        let unclassified_only = state(&[(1, None)]);
        assert!((stability(&a, &unclassified_only) - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn partial_region_overlap() {
        let previous = state(&[(1, Some("EEZ_A")), (2, Some("EEZ_B")), (3, Some("EEZ_C"))]);
        let current = state(&[(1, Some("EEZ_A")), (9, Some("EEZ_Z"))]);

        let pct = stability(&current, &previous);
        assert!((pct - 100.0 / 3.0).abs() < 1e-9);
        assert!(stability(&ReducedState::default(), &previous).abs() < f64::EPSILON);
    }

    #[test]
    fn new_regions_do_not_reduce_stability() {
        let previous = state(&[(1, Some("EEZ_A")), (2, Some("EEZ_A")), (3, Some("EEZ_A"))]);
        let current = state(&[
            (1, Some("EEZ_A")),
            (2, Some("EEZ_A")),
            (4, Some("EEZ_B")),
            (5, Some("EEZ_B")),
        ]);
        assert!((stability(&current, &previous) - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn counts_appearances_across_window() {
        let window = vec![ids(&[7, 1]), ids(&[1]), ids(&[7, 1, 2])];
        let counts = persistence(&window);

        assert_eq!(counts[&7], 2);
        assert_eq!(counts[&1], 3);
        assert_eq!(counts[&2], 1);
        assert!(counts.values().all(|&c| (1..=window.len()).contains(&c)));
    }

    #[test]
    fn window_order_does_not_matter() {
        let mut window = vec![ids(&[1, 2]), ids(&[2, 3]), ids(&[3, 4, 1])];
        let forward = persistence(&window);
        window.reverse();
        assert_eq!(persistence(&window), forward);
    }

    #[test]
    fn empty_window_has_no_appearances() {
        assert!(persistence(&[]).is_empty());
    }

    #[test]
    fn ranks_most_persistent_first() {
        let counts = persistence(&[ids(&[5, 3]), ids(&[3]), ids(&[3, 4])]);
        let ranked: Vec<(EntityId, usize)> = ranked_appearances(&counts)
            .into_iter()
            .map(|r| (r.entity_id, r.appearances))
            .collect();
        assert_eq!(ranked, vec![(3, 3), (4, 1), (5, 1)]);
    }
}
