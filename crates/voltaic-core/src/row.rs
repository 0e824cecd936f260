//! Row model for the archival pipeline.
//!
//! [`RawReading`] is the narrow, defensively-decoded shape of one
//! record as returned by the time-series store. [`MeterRow`] is the
//! canonical archive row written into partitions and the analytical
//! database. Raw readings exist only between extraction and
//! transformation; canonical rows are immutable once built.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// One record as returned by the time-series store.
///
/// Every field except the timestamp is optional; the transformer
/// applies the documented defaults rather than dropping rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawReading {
    /// Record timestamp as returned by the store (RFC 3339, or a naive
    /// local form treated as UTC).
    pub time: String,
    /// Source tag, when the record carries one.
    pub source: Option<String>,
    /// Instantaneous power in watts under the primary field name.
    pub power_w: Option<f64>,
    /// Instantaneous power under the alternate field name used by
    /// older writers.
    pub instant_power_w: Option<f64>,
    /// Cumulative imported energy in kWh.
    pub energy_import_kwh: Option<f64>,
    /// Cumulative exported energy in kWh.
    pub energy_export_kwh: Option<f64>,
}

/// One canonical archive row.
///
/// The fixed field order here is the partition column order and the
/// `raw_meter_readings` table column order.
#[derive(Debug, Clone, PartialEq)]
pub struct MeterRow {
    /// Reading instant in UTC.
    pub ts_utc: DateTime<Utc>,
    /// Reading instant in the configured local zone.
    pub ts_local: DateTime<Tz>,
    /// Source tag (defaulted when the raw record carried none).
    pub source: String,
    /// Instantaneous power in watts.
    pub instant_power_w: f64,
    /// Cumulative imported energy in kWh.
    pub energy_import_kwh: f64,
    /// Cumulative exported energy in kWh.
    pub energy_export_kwh: f64,
    /// When this archive run executed; identical across all rows of
    /// one run.
    pub ingested_at: DateTime<Utc>,
}

/// Column names of the canonical row, in schema order.
pub const COLUMN_NAMES: [&str; 7] = [
    "ts_utc",
    "ts_local",
    "source",
    "instant_power_w",
    "energy_import_kwh",
    "energy_export_kwh",
    "ingested_at",
];
