//! Runtime configuration for an archival run.
//!
//! The configuration is environment-sourced by the binary, validated
//! here exactly once at startup, and passed by reference into every
//! pipeline component. There is no process-global configuration state.

use std::path::PathBuf;
use std::str::FromStr;

use chrono_tz::Tz;

use crate::error::{Error, Result};

/// Compression codec applied to partition shard files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionCodec {
    /// Zstandard (default; best ratio for archival workloads).
    #[default]
    Zstd,
    /// Snappy (faster, larger files).
    Snappy,
    /// No compression.
    None,
}

impl FromStr for CompressionCodec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "zstd" => Ok(Self::Zstd),
            "snappy" => Ok(Self::Snappy),
            "none" | "uncompressed" => Ok(Self::None),
            other => Err(Error::config(format!(
                "unknown compression codec: {other} (expected zstd, snappy, or none)"
            ))),
        }
    }
}

/// Settings for one archival run, validated at startup.
#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    /// Base URL of the time-series store (e.g. `http://influxdb:8086`).
    pub influx_url: String,
    /// Database (bucket) name in the time-series store.
    pub influx_db: String,
    /// Token credential, if the store uses token auth.
    pub influx_token: Option<String>,
    /// Username, if the store uses basic auth.
    pub influx_user: Option<String>,
    /// Password, if the store uses basic auth.
    pub influx_password: Option<String>,
    /// Measurement (table) queried for readings.
    pub measurement: String,
    /// Source tag applied to records that carry none.
    pub source_default: String,
    /// Path of the live analytical database file.
    pub database_path: PathBuf,
    /// Base directory under which date partitions are published.
    pub partition_base_dir: PathBuf,
    /// Compression codec for partition shards.
    pub codec: CompressionCodec,
    /// Maximum rows per partition shard file.
    pub max_rows_per_shard: usize,
    /// Time zone defining calendar-day boundaries.
    pub timezone: Tz,
}

impl ArchiveConfig {
    /// Parses a time zone identifier (e.g. `Asia/Tokyo`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for identifiers not in the tz database.
    pub fn parse_timezone(name: &str) -> Result<Tz> {
        name.parse::<Tz>()
            .map_err(|_| Error::config(format!("invalid time zone identifier: {name}")))
    }

    /// Validates cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when a required setting is empty or
    /// out of range.
    pub fn validate(&self) -> Result<()> {
        if self.influx_url.is_empty() {
            return Err(Error::config("time-series store URL must not be empty"));
        }
        if self.influx_db.is_empty() {
            return Err(Error::config("time-series database name must not be empty"));
        }
        if self.measurement.is_empty() {
            return Err(Error::config("measurement name must not be empty"));
        }
        if self.max_rows_per_shard == 0 {
            return Err(Error::config("max rows per shard must be at least 1"));
        }
        Ok(())
    }

    /// Returns the IANA name of the configured time zone, as stored in
    /// partition schema metadata.
    #[must_use]
    pub fn timezone_name(&self) -> &'static str {
        self.timezone.name()
    }
}
