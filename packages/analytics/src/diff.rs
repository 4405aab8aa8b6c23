//! Set differences between two reduced states and the alerts they raise.

use jam_watch_analytics_models::{Alert, AlertConfig, DiffResult, ReducedState};

/// Compares the current state against the previous one.
///
/// A `previous` of `None` means no earlier run exists: the diff is taken
/// against the empty state and flagged as a first run. The set algebra is
/// still computed in that case, but [`derive_alerts`] ignores it.
#[must_use]
pub fn diff(current: &ReducedState, previous: Option<&ReducedState>) -> DiffResult {
    let empty = ReducedState::default();
    let first_run = previous.is_none();
    let previous = previous.unwrap_or(&empty);

    let new_entities = current
        .entity_ids()
        .filter(|id| !previous.contains(*id))
        .collect();
    let removed_entities = previous
        .entity_ids()
        .filter(|id| !current.contains(*id))
        .collect();

    let current_regions = current.regions();
    let previous_regions = previous.regions();

    DiffResult {
        first_run,
        new_entities,
        removed_entities,
        new_regions: current_regions
            .named
            .difference(&previous_regions.named)
            .cloned()
            .collect(),
        resolved_regions: previous_regions
            .named
            .difference(&current_regions.named)
            .cloned()
            .collect(),
        current_count: current.len(),
        previous_count: previous.len(),
        unclassified_current: current_regions.unclassified,
        unclassified_previous: previous_regions.unclassified,
    }
}

/// Derives alerts from a diff.
///
/// First runs raise nothing: every entity and region is baseline. A surge
/// needs a non-empty previous run, a growing entity count and an increase
/// strictly above the threshold.
#[must_use]
pub fn derive_alerts(diff: &DiffResult, config: &AlertConfig) -> Vec<Alert> {
    if diff.first_run {
        return Vec::new();
    }

    let mut alerts: Vec<Alert> = diff
        .new_regions
        .iter()
        .map(|region| Alert::RegionAppeared {
            region: region.clone(),
        })
        .chain(diff.resolved_regions.iter().map(|region| Alert::RegionResolved {
            region: region.clone(),
        }))
        .collect();

    if let Some(increase_pct) = diff.change_pct()
        && diff.current_count > diff.previous_count
        && increase_pct > config.surge_threshold_pct
    {
        alerts.push(Alert::VesselSurge {
            previous_count: diff.previous_count,
            current_count: diff.current_count,
            increase_pct,
        });
    }

    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ids, state};
    use std::collections::BTreeSet;

    fn scenario() -> (ReducedState, ReducedState) {
        let previous = state(&[(1, Some("EEZ_A")), (2, Some("EEZ_A")), (3, Some("EEZ_A"))]);
        let current = state(&[
            (1, Some("EEZ_A")),
            (2, Some("EEZ_A")),
            (4, Some("EEZ_B")),
            (5, Some("EEZ_B")),
        ]);
        (current, previous)
    }

    #[test]
    fn reports_new_entities_and_regions() {
        let (current, previous) = scenario();
        let result = diff(&current, Some(&previous));

        assert_eq!(result.new_entities, BTreeSet::from([4, 5]));
        assert_eq!(result.removed_entities, BTreeSet::from([3]));
        assert_eq!(result.new_regions, BTreeSet::from(["EEZ_B".to_string()]));
        assert!(result.resolved_regions.is_empty());
        assert_eq!(result.current_count, 4);
        assert_eq!(result.previous_count, 3);
    }

    #[test]
    fn surge_above_threshold_alerts() {
        let (current, previous) = scenario();
        let alerts = derive_alerts(&diff(&current, Some(&previous)), &AlertConfig::default());

        assert_eq!(alerts.len(), 2);
        assert_eq!(
            alerts[0],
            Alert::RegionAppeared {
                region: "EEZ_B".to_string()
            }
        );
        match &alerts[1] {
            Alert::VesselSurge {
                previous_count,
                current_count,
                increase_pct,
            } => {
                assert_eq!((*previous_count, *current_count), (3, 4));
                assert!((increase_pct - 33.333).abs() < 0.001);
            }
            other => panic!("expected surge, got {other:?}"),
        }
    }

    #[test]
    fn surge_must_exceed_threshold() {
        let previous = ids(&(1..=10).collect::<Vec<_>>());
        let current = ids(&(1..=11).collect::<Vec<_>>());
        let result = diff(&current, Some(&previous));

        let at_threshold = AlertConfig {
            surge_threshold_pct: 10.0,
        };
        assert!(derive_alerts(&result, &at_threshold).is_empty());

        let below = AlertConfig {
            surge_threshold_pct: 9.5,
        };
        assert_eq!(derive_alerts(&result, &below).len(), 1);
    }

    #[test]
    fn decrease_never_surges() {
        let result = diff(&ids(&[1]), Some(&ids(&[1, 2, 3])));
        assert!(derive_alerts(&result, &AlertConfig::default()).is_empty());
    }

    #[test]
    fn non_positive_threshold_needs_growth() {
        let zero = AlertConfig {
            surge_threshold_pct: 0.0,
        };
        let negative = AlertConfig {
            surge_threshold_pct: -50.0,
        };
        let flat = diff(&ids(&[1, 2, 3]), Some(&ids(&[4, 5, 6])));
        let shrinking = diff(&ids(&[1]), Some(&ids(&[1, 2, 3])));

        for result in [&flat, &shrinking] {
            for config in [&zero, &negative] {
                assert!(
                    !derive_alerts(result, config)
                        .iter()
                        .any(|a| matches!(a, Alert::VesselSurge { .. })),
                    "{result:?}"
                );
            }
        }

        let growing = diff(&ids(&[1, 2, 3, 4]), Some(&ids(&[1, 2, 3])));
        assert!(
            derive_alerts(&growing, &zero)
                .iter()
                .any(|a| matches!(a, Alert::VesselSurge { .. }))
        );
    }

    #[test]
    fn resolved_regions_alert() {
        let previous = state(&[(1, Some("EEZ_A")), (2, Some("EEZ_C"))]);
        let current = state(&[(1, Some("EEZ_A")), (2, Some("EEZ_A"))]);
        let alerts = derive_alerts(&diff(&current, Some(&previous)), &AlertConfig::default());

        assert_eq!(
            alerts,
            vec![Alert::RegionResolved {
                region: "EEZ_C".to_string()
            }]
        );
    }

    #[test]
    fn first_run_suppresses_alerts() {
        let current = state(&[(1, Some("EEZ_A")), (2, Some("EEZ_B"))]);
        let result = diff(&current, None);

        assert!(result.first_run);
        assert_eq!(result.new_entities, BTreeSet::from([1, 2]));
        assert_eq!(result.new_regions.len(), 2);
        assert!(derive_alerts(&result, &AlertConfig::default()).is_empty());
    }

    #[test]
    fn empty_previous_state_never_surges() {
        let result = diff(&ids(&[1, 2]), Some(&ReducedState::default()));
        let alerts = derive_alerts(&result, &AlertConfig::default());
        assert!(
            !alerts
                .iter()
                .any(|a| matches!(a, Alert::VesselSurge { .. }))
        );
    }

    #[test]
    fn null_regions_do_not_appear_as_regions() {
        let previous = state(&[(1, Some("EEZ_A"))]);
        let current = state(&[(1, Some("EEZ_A")), (2, None)]);
        let result = diff(&current, Some(&previous));

        assert!(result.new_regions.is_empty());
        assert_eq!(result.unclassified_current, 1);
        assert_eq!(result.unclassified_previous, 0);
    }

    #[test]
    fn new_entities_never_overlap_previous() {
        let a = ids(&[1, 2, 3, 8]);
        let b = ids(&[2, 3, 9]);

        let result = diff(&a, Some(&b));
        assert!(result.new_entities.iter().all(|id| !b.contains(*id)));
        assert!(diff(&a, Some(&a)).new_entities.is_empty());
    }
}
