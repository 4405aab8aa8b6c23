//! Reduction of a raw snapshot to the latest event per entity.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use jam_watch_analytics_models::ReducedState;
use jam_watch_run_models::RawSnapshot;

/// Keeps, for every entity, the event with the greatest timestamp.
///
/// Ties go to the event that comes last in snapshot order. Regions are
/// normalised with [`jam_watch_run_models::Event::clean_region`], so a fresh fetch and its
/// reloaded run file reduce to the same state.
#[must_use]
pub fn reduce(snapshot: &RawSnapshot) -> ReducedState {
    let mut latest = BTreeMap::new();

    for event in snapshot.events() {
        match latest.entry(event.entity_id) {
            Entry::Vacant(slot) => {
                slot.insert(event.clone().normalized());
            }
            Entry::Occupied(mut slot) => {
                if event.timestamp >= slot.get().timestamp {
                    slot.insert(event.clone().normalized());
                }
            }
        }
    }

    log::trace!(
        "Reduced {} events to {} entities",
        snapshot.len(),
        latest.len()
    );

    ReducedState::from_latest(latest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::at;
    use jam_watch_run_models::Event;

    #[test]
    fn keeps_latest_event_per_entity() {
        let snapshot = RawSnapshot::new(vec![
            Event::new(1, Some("EEZ_A"), at(2, 0)),
            Event::new(2, Some("EEZ_B"), at(1, 0)),
            Event::new(1, Some("EEZ_C"), at(3, 0)),
            Event::new(1, Some("EEZ_D"), at(1, 0)),
        ]);

        let state = reduce(&snapshot);

        assert_eq!(state.len(), 2);
        assert_eq!(state.get(1).unwrap().region.as_deref(), Some("EEZ_C"));
        assert_eq!(state.get(2).unwrap().region.as_deref(), Some("EEZ_B"));
    }

    #[test]
    fn timestamp_ties_go_to_the_last_row() {
        let snapshot = RawSnapshot::new(vec![
            Event::new(5, Some("first"), at(1, 12)),
            Event::new(5, Some("second"), at(1, 12)),
            Event::new(5, Some("older"), at(1, 11)),
        ]);

        let state = reduce(&snapshot);

        assert_eq!(state.get(5).unwrap().region.as_deref(), Some("second"));
    }

    #[test]
    fn padded_and_blank_regions_are_normalised() {
        let raw = |id, region: &str| Event {
            entity_id: id,
            region: Some(region.to_string()),
            timestamp: at(1, 0),
            latitude: None,
            longitude: None,
        };
        let state = reduce(&RawSnapshot::new(vec![raw(1, " EEZ_A"), raw(2, "")]));

        assert_eq!(state.get(1).unwrap().region.as_deref(), Some("EEZ_A"));
        assert_eq!(state.get(2).unwrap().region, None);
    }

    #[test]
    fn empty_snapshot_reduces_to_empty_state() {
        assert!(reduce(&RawSnapshot::default()).is_empty());
    }

    #[test]
    fn every_entity_keeps_its_maximum_timestamp() {
        let snapshot = RawSnapshot::new(
            (0..40)
                .map(|i| Event::new(i % 7, None, at(1 + (i * 5 % 11) as u32, 0)))
                .collect(),
        );

        let state = reduce(&snapshot);

        assert_eq!(state.len(), 7);
        for event in state.events() {
            let max = snapshot
                .events()
                .iter()
                .filter(|e| e.entity_id == event.entity_id)
                .map(|e| e.timestamp)
                .max()
                .unwrap();
            assert_eq!(event.timestamp, max);
        }
    }

    #[test]
    fn reduction_is_idempotent() {
        let snapshot = RawSnapshot::new(vec![
            Event::new(3, Some("EEZ_A"), at(2, 0)),
            Event::new(1, None, at(1, 0)),
            Event::new(3, Some("EEZ_B"), at(2, 0)),
            Event::new(1, Some("EEZ_A"), at(4, 0)),
        ]);

        let once = reduce(&snapshot);
        let twice = reduce(&once.to_snapshot());

        assert_eq!(once, twice);
    }
}
