//! Crash-safety tests for the shadow-copy / validate / swap protocol.
//!
//! # Invariants Tested
//!
//! 1. **Live database untouched on merge failure**: any failure before
//!    the swap leaves the live file byte-identical to its pre-run state
//! 2. **Shadow retained for inspection**: a failed merge leaves a
//!    populated shadow at the `.next` path
//! 3. **One backup generation**: a successful swap retires the prior
//!    database to `.prev`, replacing any older backup

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, TimeZone, Utc};
use duckdb::Connection;

use voltaic_archive::merge::merge_partition;
use voltaic_archive::partition::write_partition;
use voltaic_core::error::Error;
use voltaic_core::{ArchiveConfig, CompressionCodec, MeterRow};

fn test_config(base: &Path) -> ArchiveConfig {
    ArchiveConfig {
        influx_url: "http://localhost:8086".into(),
        influx_db: "home_energy".into(),
        influx_token: None,
        influx_user: None,
        influx_password: None,
        measurement: "power".into(),
        source_default: "meter1".into(),
        database_path: base.join("home_energy.duckdb"),
        partition_base_dir: base.join("parquet"),
        codec: CompressionCodec::Zstd,
        max_rows_per_shard: 100_000,
        timezone: chrono_tz::Asia::Tokyo,
    }
}

fn rows_for(date: NaiveDate, powers: &[f64]) -> Vec<MeterRow> {
    let tz = chrono_tz::Asia::Tokyo;
    let ingested_at = Utc.with_ymd_and_hms(2025, 1, 11, 0, 0, 0).unwrap();
    powers
        .iter()
        .enumerate()
        .map(|(i, &power)| {
            let ts_local = tz
                .from_local_datetime(&date.and_hms_opt(9, u32::try_from(i).unwrap(), 0).unwrap())
                .unwrap();
            MeterRow {
                ts_utc: ts_local.with_timezone(&Utc),
                ts_local,
                source: "meter1".into(),
                instant_power_w: power,
                energy_import_kwh: 0.0,
                energy_export_kwh: 0.0,
                ingested_at,
            }
        })
        .collect()
}

fn publish(config: &ArchiveConfig, date: NaiveDate, powers: &[f64]) -> PathBuf {
    write_partition(config, date, &rows_for(date, powers)).unwrap()
}

fn count_for_date(db_path: &Path, date: NaiveDate) -> i64 {
    let conn = Connection::open(db_path).unwrap();
    conn.query_row(
        "SELECT COUNT(*) FROM raw_meter_readings WHERE CAST(ts_local AS DATE) = CAST(? AS DATE)",
        [date.to_string()],
        |row| row.get(0),
    )
    .unwrap()
}

fn jan10() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 10).unwrap()
}

#[test]
fn first_merge_creates_database_without_backup() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let partition = publish(&config, jan10(), &[100.0, 150.0]);

    let report = merge_partition(&config, jan10(), &partition).unwrap();

    assert_eq!(report.inserted, 2);
    assert_eq!(count_for_date(&config.database_path, jan10()), 2);
    let backup = dir.path().join("home_energy.duckdb.prev");
    assert!(!backup.exists());
}

#[test]
fn successful_merge_leaves_no_shadow() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let partition = publish(&config, jan10(), &[100.0]);

    merge_partition(&config, jan10(), &partition).unwrap();

    assert!(!dir.path().join("home_energy.duckdb.next").exists());
    assert!(!dir.path().join("home_energy.duckdb.next.wal").exists());
}

#[test]
fn swap_retains_exactly_one_backup_generation() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let backup = dir.path().join("home_energy.duckdb.prev");

    let partition = publish(&config, jan10(), &[100.0, 150.0, 200.0]);
    merge_partition(&config, jan10(), &partition).unwrap();

    let partition = publish(&config, jan10(), &[80.0, 90.0]);
    merge_partition(&config, jan10(), &partition).unwrap();

    // The backup is the generation that held three rows.
    assert_eq!(count_for_date(&config.database_path, jan10()), 2);
    assert_eq!(count_for_date(&backup, jan10()), 3);

    let partition = publish(&config, jan10(), &[1.0]);
    merge_partition(&config, jan10(), &partition).unwrap();

    // Overwritten, not accumulated.
    assert_eq!(count_for_date(&backup, jan10()), 2);
}

#[test]
fn merge_is_idempotent_for_a_reused_partition() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let partition = publish(&config, jan10(), &[100.0, 150.0]);

    let first = merge_partition(&config, jan10(), &partition).unwrap();
    let second = merge_partition(&config, jan10(), &partition).unwrap();

    assert_eq!(first.inserted, 2);
    assert_eq!(second.deleted, Some(2));
    assert_eq!(second.inserted, 2);
    assert_eq!(count_for_date(&config.database_path, jan10()), 2);
}

#[test]
fn failed_merge_leaves_live_database_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    let partition = publish(&config, jan10(), &[100.0, 150.0]);
    merge_partition(&config, jan10(), &partition).unwrap();
    let before = fs::read(&config.database_path).unwrap();

    // A partition whose shard is not valid parquet fails the merge
    // during row decoding, after the shadow copy was taken.
    let corrupt_dir = config
        .partition_base_dir
        .join("raw_meter_readings")
        .join("dt=2025-01-11");
    fs::create_dir_all(&corrupt_dir).unwrap();
    fs::write(corrupt_dir.join("part-0000.parquet"), b"not parquet").unwrap();

    let jan11 = NaiveDate::from_ymd_opt(2025, 1, 11).unwrap();
    let result = merge_partition(&config, jan11, &corrupt_dir);

    assert!(matches!(result, Err(Error::MergeFailed { .. })));
    assert_eq!(fs::read(&config.database_path).unwrap(), before);
}

#[test]
fn failed_merge_leaves_populated_shadow_for_inspection() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    let partition = publish(&config, jan10(), &[100.0]);
    merge_partition(&config, jan10(), &partition).unwrap();

    let corrupt_dir = dir.path().join("corrupt");
    fs::create_dir_all(&corrupt_dir).unwrap();
    fs::write(corrupt_dir.join("part-0000.parquet"), b"not parquet").unwrap();

    let jan11 = NaiveDate::from_ymd_opt(2025, 1, 11).unwrap();
    merge_partition(&config, jan11, &corrupt_dir).unwrap_err();

    let shadow = dir.path().join("home_energy.duckdb.next");
    assert!(shadow.exists());
    // The shadow is the pre-merge copy of the live database.
    assert_eq!(count_for_date(&shadow, jan10()), 1);
}

#[test]
fn stale_shadow_from_failed_run_is_replaced_on_retry() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    // Leftover shadow from an interrupted run.
    fs::create_dir_all(dir.path()).unwrap();
    fs::write(dir.path().join("home_energy.duckdb.next"), b"stale").unwrap();
    fs::write(dir.path().join("home_energy.duckdb.next.wal"), b"stale").unwrap();

    let partition = publish(&config, jan10(), &[42.0]);
    let report = merge_partition(&config, jan10(), &partition).unwrap();

    assert_eq!(report.inserted, 1);
    assert_eq!(count_for_date(&config.database_path, jan10()), 1);
    assert!(!dir.path().join("home_energy.duckdb.next").exists());
}
