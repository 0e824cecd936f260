//! Orchestration of one archive run.
//!
//! Sequences window → extract → transform → partition → merge and
//! emits one structured log line per milestone. The run is the unit of
//! retry: there is no partial success and no in-process retry; a
//! failed run is rerun by the external scheduler and is idempotent for
//! its target date.

use std::path::PathBuf;

use chrono::{NaiveDate, Utc};
use tracing::info;

use voltaic_core::error::Result;
use voltaic_core::observability::archive_span;
use voltaic_core::{ArchiveConfig, ArchiveWindow};

use crate::extract::ReadingSource;
use crate::merge::merge_partition;
use crate::partition::write_partition;
use crate::transform::transform_readings;

/// Counts and artifacts of one completed run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// The local calendar date archived.
    pub target_date: NaiveDate,
    /// Rows returned by the extractor.
    pub extracted: usize,
    /// Canonical partition directory published this run.
    pub partition_dir: PathBuf,
    /// Rows deleted from the database for the target date, when known.
    pub deleted: Option<u64>,
    /// Rows present in the database for the target date after the run.
    pub inserted: u64,
}

/// Executes one full archive run.
///
/// With no explicit `target_date`, archives "yesterday" in the
/// configured zone. Either every step completes and the database
/// reflects the new day, or an error is returned and the live database
/// is unchanged.
///
/// # Errors
///
/// Propagates the first failing stage's error unchanged; see
/// [`voltaic_core::Error`] for the taxonomy.
pub fn run_archive(
    config: &ArchiveConfig,
    source: &dyn ReadingSource,
    target_date: Option<NaiveDate>,
) -> Result<RunSummary> {
    config.validate()?;
    let window = match target_date {
        Some(date) => ArchiveWindow::for_date(config.timezone, date)?,
        None => ArchiveWindow::yesterday(config.timezone, Utc::now())?,
    };

    let span = archive_span(&window.target_date.to_string(), &config.measurement);
    let _guard = span.enter();
    info!(
        start_utc = %window.start_utc,
        end_utc = %window.end_utc,
        "archive window computed"
    );

    let readings = source.fetch(&window)?;
    info!(rows = readings.len(), "readings extracted");

    let ingested_at = Utc::now();
    let rows = transform_readings(
        &readings,
        config.timezone,
        &config.source_default,
        ingested_at,
    )?;

    let partition_dir = write_partition(config, window.target_date, &rows)?;
    info!(path = %partition_dir.display(), rows = rows.len(), "partition written");

    let report = merge_partition(config, window.target_date, &partition_dir)?;
    info!(
        deleted = report.deleted,
        inserted = report.inserted,
        "merge swap completed"
    );

    Ok(RunSummary {
        target_date: window.target_date,
        extracted: readings.len(),
        partition_dir,
        deleted: report.deleted,
        inserted: report.inserted,
    })
}
