//! Merge of a published partition into the analytical database.
//!
//! The live database file is never mutated in place. The merge builds a
//! shadow copy at `<db>.next`, applies delete-then-insert for the
//! target date, commits, checkpoints, verifies, and only then promotes
//! the shadow with a sequence of atomic renames, retaining the prior
//! generation at `<db>.prev`. A crash at any point leaves the live path
//! holding either the pre-run or the fully-merged database.
//!
//! ```text
//! live ──copy──► <db>.next ──delete/insert/checkpoint/verify──┐
//!                                                             ▼
//! live ──rename──► <db>.prev          <db>.next ──rename──► live
//! ```
//!
//! Failures before the swap leave the live database untouched and the
//! shadow on disk for forensic inspection. The merge is idempotent per
//! date because rows for the target date are deleted before insertion.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use duckdb::{params, Connection};
use tracing::{debug, warn};

use voltaic_core::error::{Error, Result};
use voltaic_core::fs_atomic::{copy_if_exists, remove_file_if_exists, rename_if_exists};
use voltaic_core::ArchiveConfig;

use crate::partition::read_partition;

const DDL: &str = "
CREATE TABLE IF NOT EXISTS raw_meter_readings (
  ts_utc TIMESTAMP,
  ts_local TIMESTAMP,
  source VARCHAR,
  instant_power_w DOUBLE,
  energy_import_kwh DOUBLE,
  energy_export_kwh DOUBLE,
  ingested_at TIMESTAMP
);
";

const INSERT_SQL: &str = "
INSERT INTO raw_meter_readings (
  ts_utc, ts_local, source, instant_power_w,
  energy_import_kwh, energy_export_kwh, ingested_at
) VALUES (
  make_timestamp(?), make_timestamp(?), ?, ?, ?, ?, make_timestamp(?)
)";

const DELETE_SQL: &str =
    "DELETE FROM raw_meter_readings WHERE CAST(ts_local AS DATE) = CAST(? AS DATE)";

const COUNT_SQL: &str =
    "SELECT COUNT(*) FROM raw_meter_readings WHERE CAST(ts_local AS DATE) = CAST(? AS DATE)";

/// Row counts reported by a completed merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeReport {
    /// Rows deleted for the target date, when the engine reported a
    /// count.
    pub deleted: Option<u64>,
    /// Rows present for the target date after the merge, reread from
    /// the shadow before the swap.
    pub inserted: u64,
}

/// Merges one published partition into the live database.
///
/// After success, the database's rows for `target_date` equal exactly
/// the partition's rows and the previous database generation sits at
/// `<db>.prev`.
///
/// Residual risk: a crash between the two renames of the swap leaves
/// the live name vacant, with the prior generation complete at
/// `<db>.prev` and the verified new generation complete at `<db>.next`;
/// recovery is a manual rename of either.
///
/// # Errors
///
/// Returns [`Error::MergeFailed`] for any failure before the swap (the
/// live database is unmodified and the shadow is left on disk), or
/// [`Error::SwapFailed`] if a rename in the swap sequence fails.
pub fn merge_partition(
    config: &ArchiveConfig,
    target_date: NaiveDate,
    partition_dir: &Path,
) -> Result<MergeReport> {
    if !partition_dir.is_dir() {
        return Err(Error::merge_failed(format!(
            "partition not found: {}",
            partition_dir.display()
        )));
    }

    let live = config.database_path.as_path();
    if let Some(parent) = live.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            Error::merge_failed_with(format!("create database directory {}", parent.display()), e)
        })?;
    }
    let shadow = sibling(live, ".next");
    let backup = sibling(live, ".prev");

    prepare_shadow(live, &shadow)?;
    let report = build_shadow(config, target_date, partition_dir, &shadow)?;
    swap_live(live, &shadow, &backup)?;

    debug!(
        deleted = report.deleted,
        inserted = report.inserted,
        live = %live.display(),
        "merge complete"
    );
    Ok(report)
}

/// Appends a suffix to the final path component, keeping the original
/// extension (`db.duckdb` becomes `db.duckdb.next`).
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Write-ahead log sidecar path for a database file.
fn wal(path: &Path) -> PathBuf {
    sibling(path, ".wal")
}

/// Step 1: discard any stale shadow, then byte-copy the live database
/// (and its sidecar) to the shadow path. A missing live database means
/// a first-ever run; the shadow starts empty.
fn prepare_shadow(live: &Path, shadow: &Path) -> Result<()> {
    let shadow_wal = wal(shadow);
    remove_file_if_exists(shadow)
        .map_err(|e| Error::merge_failed_with(format!("clean {}", shadow.display()), e))?;
    remove_file_if_exists(&shadow_wal).map_err(|e| {
        Error::merge_failed_with(format!("clean {}", shadow_wal.display()), e)
    })?;
    copy_if_exists(live, shadow).map_err(|e| {
        Error::merge_failed_with(format!("shadow copy to {}", shadow.display()), e)
    })?;
    copy_if_exists(&wal(live), &shadow_wal).map_err(|e| {
        Error::merge_failed_with(format!("shadow copy to {}", shadow_wal.display()), e)
    })?;
    Ok(())
}

/// Steps 2–5: schema ensure, delete-then-insert in one transaction,
/// commit and checkpoint, integrity verification. The shadow is the
/// only file touched.
fn build_shadow(
    config: &ArchiveConfig,
    target_date: NaiveDate,
    partition_dir: &Path,
    shadow: &Path,
) -> Result<MergeReport> {
    let rows = read_partition(partition_dir, config.timezone)?;

    let mut conn = Connection::open(shadow)
        .map_err(|e| Error::merge_failed_with(format!("open shadow {}", shadow.display()), e))?;
    conn.execute_batch(DDL)
        .map_err(|e| Error::merge_failed_with("ensure schema", e))?;

    let date_key = target_date.to_string();
    let tx = conn
        .transaction()
        .map_err(|e| Error::merge_failed_with("begin transaction", e))?;

    let deleted = tx
        .execute(DELETE_SQL, params![date_key])
        .map_err(|e| Error::merge_failed_with("delete target date", e))?;
    {
        let mut insert = tx
            .prepare(INSERT_SQL)
            .map_err(|e| Error::merge_failed_with("prepare insert", e))?;
        for row in &rows {
            insert
                .execute(params![
                    row.ts_utc.timestamp_micros(),
                    row.ts_local.naive_local().and_utc().timestamp_micros(),
                    row.source.as_str(),
                    row.instant_power_w,
                    row.energy_import_kwh,
                    row.energy_export_kwh,
                    row.ingested_at.timestamp_micros(),
                ])
                .map_err(|e| Error::merge_failed_with("insert partition row", e))?;
        }
    }
    let inserted: i64 = tx
        .query_row(COUNT_SQL, params![date_key], |row| row.get(0))
        .map_err(|e| Error::merge_failed_with("count inserted rows", e))?;

    tx.commit()
        .map_err(|e| Error::merge_failed_with("commit merge transaction", e))?;
    conn.execute_batch("CHECKPOINT")
        .map_err(|e| Error::merge_failed_with("checkpoint shadow", e))?;
    verify_integrity(&conn)?;
    conn.close()
        .map_err(|(_, e)| Error::merge_failed_with("close shadow database", e))?;

    Ok(MergeReport {
        deleted: Some(u64::try_from(deleted).unwrap_or(0)),
        inserted: u64::try_from(inserted).unwrap_or(0),
    })
}

/// Step 5: the engine's structural consistency check. Anything other
/// than a single "ok" report aborts the merge; an engine that does not
/// implement the pragma gets a forced checkpoint instead.
fn verify_integrity(conn: &Connection) -> Result<()> {
    let mut stmt = match conn.prepare("PRAGMA integrity_check") {
        Ok(stmt) => stmt,
        Err(e) if is_unsupported_pragma(&e) => return force_checkpoint_fallback(conn),
        Err(e) => return Err(Error::merge_failed_with("run integrity_check", e)),
    };
    let reports = match stmt.query_map([], |row| row.get::<_, String>(0)) {
        Ok(mapped) => mapped
            .collect::<duckdb::Result<Vec<String>>>()
            .map_err(|e| Error::merge_failed_with("read integrity_check report", e))?,
        Err(e) if is_unsupported_pragma(&e) => return force_checkpoint_fallback(conn),
        Err(e) => return Err(Error::merge_failed_with("run integrity_check", e)),
    };
    evaluate_integrity_reports(&reports)
}

/// A healthy database reports exactly one row reading "ok". Anything
/// else, including an empty report, aborts the merge before the swap.
fn evaluate_integrity_reports(reports: &[String]) -> Result<()> {
    if reports.is_empty() {
        return Err(Error::merge_failed("integrity_check returned no rows"));
    }
    if reports.len() == 1 && reports[0] == "ok" {
        return Ok(());
    }
    Err(Error::merge_failed(format!(
        "integrity_check failed: {}",
        reports.join(", ")
    )))
}

fn force_checkpoint_fallback(conn: &Connection) -> Result<()> {
    warn!("integrity_check is not supported by this engine; forcing a checkpoint instead");
    conn.execute_batch("FORCE CHECKPOINT")
        .map_err(|e| Error::merge_failed_with("force checkpoint", e))
}

fn is_unsupported_pragma(error: &duckdb::Error) -> bool {
    let message = error.to_string();
    message.contains("Catalog") || message.contains("not recognized")
}

/// Step 6: the swap. Pure renames ordered so that at every instant
/// exactly one of {original, backup} occupies the live name, except the
/// instant between the two final renames.
fn swap_live(live: &Path, shadow: &Path, backup: &Path) -> Result<()> {
    let backup_wal = wal(backup);
    remove_file_if_exists(backup)
        .map_err(|e| Error::swap_failed_with(format!("remove {}", backup.display()), e))?;
    remove_file_if_exists(&backup_wal)
        .map_err(|e| Error::swap_failed_with(format!("remove {}", backup_wal.display()), e))?;

    rename_if_exists(live, backup).map_err(|e| {
        Error::swap_failed_with(
            format!("retire {} -> {}", live.display(), backup.display()),
            e,
        )
    })?;
    rename_if_exists(&wal(live), &backup_wal).map_err(|e| {
        Error::swap_failed_with(format!("retire {}", wal(live).display()), e)
    })?;

    fs::rename(shadow, live).map_err(|e| {
        Error::swap_failed_with(
            format!("promote {} -> {}", shadow.display(), live.display()),
            e,
        )
    })?;
    rename_if_exists(&wal(shadow), &wal(live)).map_err(|e| {
        Error::swap_failed_with(format!("promote {}", wal(shadow).display()), e)
    })?;
    Ok(())
}
