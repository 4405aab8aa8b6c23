//! CSV codec for run tables.
//!
//! Run files hold a header row followed by one row per event. Reading
//! accepts both the canonical headers and the upstream aliases understood
//! by [`Column::from_header`]; writing always emits canonical headers.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use jam_watch_run_models::{Column, EntityId, Event, RawSnapshot};

/// Errors raised while decoding a run table.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    /// CSV framing error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The header row lacks required columns.
    #[error("missing required columns: {}", join_columns(.0))]
    MissingColumns(Vec<Column>),

    /// A cell could not be parsed.
    #[error("invalid {column} '{value}' on line {line}")]
    InvalidValue {
        /// Column of the offending cell.
        column: Column,
        /// Raw cell contents.
        value: String,
        /// 1-based line number in the file.
        line: u64,
    },
}

fn join_columns(columns: &[Column]) -> String {
    columns
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

/// Parses an event timestamp.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[.f]+HH:MM`, and naive
/// `YYYY-MM-DD[T ]HH:MM:SS[.f]` values, which are taken as UTC.
#[must_use]
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Entity IDs sometimes arrive float-formatted (`"1234.0"`) from upstream
/// exports.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::float_cmp
)]
fn parse_entity_id(s: &str) -> Option<EntityId> {
    if let Ok(id) = s.parse::<EntityId>() {
        return Some(id);
    }
    let float = s.parse::<f64>().ok()?;
    let id = float as EntityId;
    (float.fract() == 0.0 && id as f64 == float).then_some(id)
}

fn cell<'r>(
    columns: &BTreeMap<Column, usize>,
    record: &'r csv::StringRecord,
    column: Column,
) -> Option<&'r str> {
    columns.get(&column).and_then(|&idx| record.get(idx))
}

fn optional_cell(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Maps each canonical column to the index of the header that feeds it.
///
/// A canonical header always takes precedence over an alias; among equals
/// the first header wins.
fn resolve_headers(headers: &csv::StringRecord) -> BTreeMap<Column, usize> {
    let mut resolved: BTreeMap<Column, (usize, bool)> = BTreeMap::new();

    for (idx, header) in headers.iter().enumerate() {
        let Some((column, canonical)) = Column::from_header(header) else {
            continue;
        };
        match resolved.get(&column).copied() {
            Some((_, true)) => {}
            Some((_, false)) if !canonical => {}
            _ => {
                resolved.insert(column, (idx, canonical));
            }
        }
    }

    resolved
        .into_iter()
        .map(|(column, (idx, _))| (column, idx))
        .collect()
}

/// Decodes a run table into a [`RawSnapshot`], preserving row order.
///
/// # Errors
///
/// Returns [`TableError`] if the header row lacks a required column or a
/// cell cannot be parsed.
pub fn read_events<R: Read>(reader: R) -> Result<RawSnapshot, TableError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);

    let columns = resolve_headers(reader.headers()?);

    let missing: Vec<Column> = Column::REQUIRED
        .into_iter()
        .filter(|c| !columns.contains_key(c))
        .collect();
    if !missing.is_empty() {
        return Err(TableError::MissingColumns(missing));
    }

    let mut events = Vec::new();

    for result in reader.records() {
        let record = result?;
        let line = record.position().map_or(0, csv::Position::line);

        let invalid = |column: Column, value: Option<&str>| TableError::InvalidValue {
            column,
            value: value.unwrap_or_default().to_owned(),
            line,
        };

        let raw_id = cell(&columns, &record, Column::EntityId);
        let entity_id = optional_cell(raw_id)
            .and_then(parse_entity_id)
            .ok_or_else(|| invalid(Column::EntityId, raw_id))?;

        let raw_ts = cell(&columns, &record, Column::Timestamp);
        let timestamp = optional_cell(raw_ts)
            .and_then(parse_timestamp)
            .ok_or_else(|| invalid(Column::Timestamp, raw_ts))?;

        let region = Event::clean_region(cell(&columns, &record, Column::Region));

        let coordinate = |column: Column| -> Result<Option<f64>, TableError> {
            let raw = cell(&columns, &record, column);
            optional_cell(raw)
                .map(|v| v.parse::<f64>().map_err(|_| invalid(column, raw)))
                .transpose()
        };
        let latitude = coordinate(Column::Latitude)?;
        let longitude = coordinate(Column::Longitude)?;

        events.push(Event {
            entity_id,
            region,
            timestamp,
            latitude,
            longitude,
        });
    }

    Ok(RawSnapshot::new(events))
}

/// Encodes a snapshot as a run table with canonical headers.
///
/// # Errors
///
/// Returns [`csv::Error`] if writing fails.
pub fn write_events<W: Write>(writer: W, snapshot: &RawSnapshot) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(writer);

    writer.write_record(Column::ALL.iter().map(AsRef::<str>::as_ref))?;

    for event in snapshot.events() {
        writer.write_record([
            event.entity_id.to_string(),
            Event::clean_region(event.region.as_deref()).unwrap_or_default(),
            event.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            event.latitude.map(|v| v.to_string()).unwrap_or_default(),
            event.longitude.map(|v| v.to_string()).unwrap_or_default(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    #[test]
    fn parses_supported_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 3, 1, 14, 30, 0).unwrap();
        for raw in [
            "2025-03-01T14:30:00Z",
            "2025-03-01T14:30:00+00:00",
            "2025-03-01T16:30:00+02:00",
            "2025-03-01 14:30:00+00:00",
            "2025-03-01T14:30:00",
            "2025-03-01T14:30:00.000",
            "2025-03-01 14:30:00",
        ] {
            assert_eq!(parse_timestamp(raw), Some(expected), "{raw}");
        }
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn reads_upstream_export_with_aliases() {
        let csv = "vesselid,eez_overall,event_start,start_latitude,start_longitude,speed\n\
                   101,EEZ_A,2025-03-01 10:00:00,12.5,-40.25,9\n\
                   102,,2025-03-01 11:00:00,,,3\n";
        let snapshot = read_events(csv.as_bytes()).unwrap();
        let events = snapshot.events();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].entity_id, 101);
        assert_eq!(events[0].region.as_deref(), Some("EEZ_A"));
        assert_eq!(events[0].latitude, Some(12.5));
        assert_eq!(events[0].longitude, Some(-40.25));
        assert_eq!(events[1].region, None);
        assert_eq!(events[1].latitude, None);
    }

    #[test]
    fn reads_export_with_byte_order_mark() {
        let csv = "\u{feff}vesselid,eez_overall,event_start\n7,EEZ_A,2025-03-01 10:00:00\n";
        let snapshot = read_events(csv.as_bytes()).unwrap();
        assert_eq!(snapshot.events()[0].entity_id, 7);
    }

    #[test]
    fn padded_regions_are_written_normalised() {
        let t = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        let snapshot = RawSnapshot::new(vec![
            Event {
                entity_id: 1,
                region: Some(" EEZ_A ".to_string()),
                timestamp: t,
                latitude: None,
                longitude: None,
            },
            Event {
                entity_id: 2,
                region: Some(String::new()),
                timestamp: t,
                latitude: None,
                longitude: None,
            },
        ]);

        let mut buf = Vec::new();
        write_events(&mut buf, &snapshot).unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.contains("\n1,EEZ_A,"), "{text}");

        assert_eq!(read_events(buf.as_slice()).unwrap(), snapshot.normalized());
    }

    #[test]
    fn canonical_header_wins_over_alias() {
        let csv = "opened_eez,entity_id,region,timestamp\n\
                   EEZ_OLD,5,EEZ_NEW,2025-03-01T00:00:00Z\n";
        let snapshot = read_events(csv.as_bytes()).unwrap();
        assert_eq!(snapshot.events()[0].region.as_deref(), Some("EEZ_NEW"));
    }

    #[test]
    fn accepts_float_formatted_entity_ids() {
        let csv = "entity_id,region,timestamp\n42.0,EEZ_A,2025-03-01T00:00:00Z\n";
        let snapshot = read_events(csv.as_bytes()).unwrap();
        assert_eq!(snapshot.events()[0].entity_id, 42);

        let csv = "entity_id,region,timestamp\n42.5,EEZ_A,2025-03-01T00:00:00Z\n";
        assert!(matches!(
            read_events(csv.as_bytes()),
            Err(TableError::InvalidValue {
                column: Column::EntityId,
                ..
            })
        ));
    }

    #[test]
    fn reports_missing_required_columns() {
        let csv = "entity_id,latitude\n1,2.0\n";
        match read_events(csv.as_bytes()) {
            Err(TableError::MissingColumns(missing)) => {
                assert_eq!(missing, vec![Column::Region, Column::Timestamp]);
            }
            other => panic!("expected MissingColumns, got {other:?}"),
        }
    }

    #[test]
    fn reports_line_of_bad_timestamp() {
        let csv = "entity_id,region,timestamp\n\
                   1,EEZ_A,2025-03-01T00:00:00Z\n\
                   2,EEZ_A,not-a-time\n";
        match read_events(csv.as_bytes()) {
            Err(TableError::InvalidValue { column, value, line }) => {
                assert_eq!(column, Column::Timestamp);
                assert_eq!(value, "not-a-time");
                assert_eq!(line, 3);
            }
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn header_only_table_is_an_empty_snapshot() {
        let snapshot = read_events("entity_id,region,timestamp\n".as_bytes()).unwrap();
        assert!(snapshot.is_empty());
    }

    #[test]
    fn written_table_reads_back_identically() {
        let t = Utc.with_ymd_and_hms(2025, 3, 1, 8, 15, 30).unwrap();
        let snapshot = RawSnapshot::new(vec![
            Event::new(3, Some("EEZ_B"), t).with_position(-1.25, 100.5),
            Event::new(1, None, t),
            Event::new(3, Some("EEZ, with comma"), t),
        ]);

        let mut buf = Vec::new();
        write_events(&mut buf, &snapshot).unwrap();

        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.starts_with("entity_id,region,timestamp,latitude,longitude\n"));

        assert_eq!(read_events(buf.as_slice()).unwrap(), snapshot);
    }
}
