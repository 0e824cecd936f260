//! Extraction from the time-series store.
//!
//! The store is an external collaborator reached over its HTTP query
//! API. One range query is issued per run; the connection is opened and
//! closed per call, with no persistent session. Any connection, auth,
//! or query failure is [`Error::SourceUnavailable`] and fatal for the
//! run; extraction is never retried internally.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use voltaic_core::error::{Error, Result};
use voltaic_core::{ArchiveConfig, ArchiveWindow, RawReading};

/// A source of raw readings for one archive window.
///
/// The production implementation is [`InfluxSource`]; tests substitute
/// in-memory sources.
pub trait ReadingSource {
    /// Returns all readings whose timestamps fall in
    /// `[window.start_utc, window.end_utc)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SourceUnavailable`] on any connection, auth, or
    /// query failure.
    fn fetch(&self, window: &ArchiveWindow) -> Result<Vec<RawReading>>;
}

/// Reads from an InfluxDB 1.x-compatible store over its `/query`
/// endpoint.
#[derive(Debug)]
pub struct InfluxSource {
    config: ArchiveConfig,
}

impl InfluxSource {
    /// Creates a source bound to the configured store.
    #[must_use]
    pub fn new(config: &ArchiveConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    fn range_query(&self, window: &ArchiveWindow) -> String {
        let start = window.start_utc.format("%Y-%m-%dT%H:%M:%SZ");
        let end = window.end_utc.format("%Y-%m-%dT%H:%M:%SZ");
        format!(
            "SELECT power_w, instant_power_w, energy_import_kwh, energy_export_kwh, source \
             FROM \"{}\" WHERE time >= '{start}' AND time < '{end}'",
            self.config.measurement
        )
    }
}

impl ReadingSource for InfluxSource {
    fn fetch(&self, window: &ArchiveWindow) -> Result<Vec<RawReading>> {
        let query = self.range_query(window);
        debug!(query = %query, "issuing range query");

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| Error::source_unavailable_with("failed to build HTTP client", e))?;

        let url = format!("{}/query", self.config.influx_url.trim_end_matches('/'));
        let mut request = client
            .get(&url)
            .query(&[("db", self.config.influx_db.as_str()), ("q", query.as_str())]);
        if let Some(token) = &self.config.influx_token {
            request = request.header("Authorization", format!("Token {token}"));
        } else if let Some(user) = &self.config.influx_user {
            request = request.basic_auth(user, self.config.influx_password.as_deref());
        }

        let response = request
            .send()
            .map_err(|e| Error::source_unavailable_with("query request failed", e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::source_unavailable(format!(
                "query returned {status}: {body}"
            )));
        }

        let body: QueryResponse = response
            .json()
            .map_err(|e| Error::source_unavailable_with("malformed query response", e))?;
        decode_query_response(&body)
    }
}

// ============================================================================
// Wire shapes (decoded defensively at the store boundary)
// ============================================================================

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<QueryResult>,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    #[serde(default)]
    series: Vec<Series>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Series {
    columns: Vec<String>,
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// Decodes the store's `results/series/columns/values` shape into
/// narrow [`RawReading`]s. A day with no readings decodes to an empty
/// vector, not an error.
fn decode_query_response(body: &QueryResponse) -> Result<Vec<RawReading>> {
    let mut readings = Vec::new();
    for result in &body.results {
        if let Some(message) = &result.error {
            return Err(Error::source_unavailable(format!(
                "store rejected query: {message}"
            )));
        }
        for series in &result.series {
            let index_of = |name: &str| series.columns.iter().position(|c| c == name);
            let time_idx = index_of("time").ok_or_else(|| {
                Error::source_unavailable("query response has no time column")
            })?;
            let source_idx = index_of("source");
            let power_idx = index_of("power_w");
            let alt_power_idx = index_of("instant_power_w");
            let import_idx = index_of("energy_import_kwh");
            let export_idx = index_of("energy_export_kwh");

            for value_row in &series.values {
                let time = value_row
                    .get(time_idx)
                    .and_then(serde_json::Value::as_str)
                    .ok_or_else(|| {
                        Error::source_unavailable("record has a non-string time value")
                    })?
                    .to_string();
                readings.push(RawReading {
                    time,
                    source: string_at(value_row, source_idx),
                    power_w: float_at(value_row, power_idx),
                    instant_power_w: float_at(value_row, alt_power_idx),
                    energy_import_kwh: float_at(value_row, import_idx),
                    energy_export_kwh: float_at(value_row, export_idx),
                });
            }
        }
    }
    Ok(readings)
}

fn float_at(row: &[serde_json::Value], index: Option<usize>) -> Option<f64> {
    index.and_then(|i| row.get(i)).and_then(serde_json::Value::as_f64)
}

fn string_at(row: &[serde_json::Value], index: Option<usize>) -> Option<String> {
    index
        .and_then(|i| row.get(i))
        .and_then(serde_json::Value::as_str)
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(json: &str) -> Result<Vec<RawReading>> {
        let body: QueryResponse = serde_json::from_str(json).unwrap();
        decode_query_response(&body)
    }

    #[test]
    fn decodes_series_rows() {
        let readings = decode(
            r#"{"results": [{"series": [{
                "name": "power",
                "columns": ["time", "power_w", "instant_power_w",
                            "energy_import_kwh", "energy_export_kwh", "source"],
                "values": [
                    ["2025-01-10T00:00:00Z", 100.5, null, 1.2, null, "meter1"],
                    ["2025-01-10T00:00:30Z", null, 150.0, null, null, null]
                ]
            }]}]}"#,
        )
        .unwrap();

        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].time, "2025-01-10T00:00:00Z");
        assert_eq!(readings[0].power_w, Some(100.5));
        assert_eq!(readings[0].source.as_deref(), Some("meter1"));
        assert_eq!(readings[1].instant_power_w, Some(150.0));
        assert_eq!(readings[1].power_w, None);
    }

    #[test]
    fn empty_day_decodes_to_no_readings() {
        let readings = decode(r#"{"results": [{}]}"#).unwrap();
        assert!(readings.is_empty());
    }

    #[test]
    fn store_error_is_source_unavailable() {
        let result = decode(r#"{"results": [{"error": "authorization failed"}]}"#);
        assert!(matches!(result, Err(Error::SourceUnavailable { .. })));
    }

    #[test]
    fn missing_time_column_is_rejected() {
        let result = decode(
            r#"{"results": [{"series": [{
                "columns": ["power_w"], "values": [[1.0]]
            }]}]}"#,
        );
        assert!(matches!(result, Err(Error::SourceUnavailable { .. })));
    }

    #[test]
    fn missing_optional_columns_decode_to_none() {
        let readings = decode(
            r#"{"results": [{"series": [{
                "columns": ["time", "power_w"],
                "values": [["2025-01-10T00:00:00Z", 42.0]]
            }]}]}"#,
        )
        .unwrap();

        assert_eq!(readings[0].power_w, Some(42.0));
        assert_eq!(readings[0].energy_import_kwh, None);
        assert_eq!(readings[0].source, None);
    }

    #[test]
    fn range_query_bounds_are_half_open() {
        let config = test_config();
        let source = InfluxSource::new(&config);
        let window = ArchiveWindow::for_date(
            chrono_tz::Asia::Tokyo,
            chrono::NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
        )
        .unwrap();

        let query = source.range_query(&window);

        assert!(query.contains("time >= '2025-01-09T15:00:00Z'"));
        assert!(query.contains("time < '2025-01-10T15:00:00Z'"));
        assert!(query.contains("FROM \"power\""));
    }

    fn test_config() -> ArchiveConfig {
        ArchiveConfig {
            influx_url: "http://localhost:8086".into(),
            influx_db: "home_energy".into(),
            influx_token: None,
            influx_user: None,
            influx_password: None,
            measurement: "power".into(),
            source_default: "meter1".into(),
            database_path: "/tmp/db.duckdb".into(),
            partition_base_dir: "/tmp/partitions".into(),
            codec: voltaic_core::CompressionCodec::Zstd,
            max_rows_per_shard: 100_000,
            timezone: chrono_tz::Asia::Tokyo,
        }
    }
}
