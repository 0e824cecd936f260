//! Normalization of raw readings into canonical rows.
//!
//! Pure mapping, no I/O. Missing numeric fields default rather than
//! fail so a day's partition row count always equals the extractor's
//! returned count. The one exception is the timestamp, which has no
//! sensible default; a malformed timestamp fails the whole run rather
//! than mis-place a row on the calendar.

use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;

use voltaic_core::error::{Error, Result};
use voltaic_core::{MeterRow, RawReading};

/// Maps every raw reading to a canonical row. Never drops a row.
///
/// `ingested_at` is captured once by the caller and stamped onto every
/// row of the run.
///
/// # Errors
///
/// Returns [`Error::Transform`] when a record timestamp cannot be
/// parsed.
pub fn transform_readings(
    readings: &[RawReading],
    tz: Tz,
    source_default: &str,
    ingested_at: DateTime<Utc>,
) -> Result<Vec<MeterRow>> {
    readings
        .iter()
        .map(|reading| transform_reading(reading, tz, source_default, ingested_at))
        .collect()
}

fn transform_reading(
    reading: &RawReading,
    tz: Tz,
    source_default: &str,
    ingested_at: DateTime<Utc>,
) -> Result<MeterRow> {
    let ts_utc = parse_ts_utc(&reading.time)?;
    let source = match reading.source.as_deref() {
        Some(tag) if !tag.is_empty() => tag.to_string(),
        _ => source_default.to_string(),
    };
    Ok(MeterRow {
        ts_utc,
        ts_local: ts_utc.with_timezone(&tz),
        source,
        instant_power_w: reading
            .power_w
            .or(reading.instant_power_w)
            .unwrap_or(0.0),
        energy_import_kwh: reading.energy_import_kwh.unwrap_or(0.0),
        energy_export_kwh: reading.energy_export_kwh.unwrap_or(0.0),
        ingested_at,
    })
}

/// Parses a store timestamp into UTC.
///
/// Offset-carrying timestamps are converted; offset-less ones are
/// treated as already-UTC, matching what the store emits.
fn parse_ts_utc(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(Error::transform(format!("unparseable timestamp: {value}")))
}
