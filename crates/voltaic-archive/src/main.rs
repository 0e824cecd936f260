//! # voltaic-archive
//!
//! Scheduled entry point for the daily meter archival run.
//!
//! No arguments are required: every setting comes from `VOLTAIC_*`
//! environment variables (each also available as a flag). Exit code 0
//! means the database reflects the new day; any other exit code means
//! the run failed and the live database is provably unchanged.
//!
//! ```bash
//! # Archive yesterday (the scheduled invocation)
//! voltaic-archive
//!
//! # Re-archive a specific day
//! voltaic-archive --date 2025-01-10
//! ```

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use chrono::NaiveDate;
use clap::Parser;
use tracing::{error, info};

use voltaic_archive::extract::InfluxSource;
use voltaic_archive::pipeline::{run_archive, RunSummary};
use voltaic_core::observability::{init_logging, LogFormat};
use voltaic_core::{ArchiveConfig, CompressionCodec};

/// Daily archival of power-meter readings into parquet and DuckDB.
#[derive(Debug, Parser)]
#[command(name = "voltaic-archive")]
#[command(about = "Archives one local calendar day of meter readings")]
#[command(version)]
struct Args {
    /// Time-series store URL.
    #[arg(long, env = "VOLTAIC_INFLUX_URL", default_value = "http://influxdb:8086")]
    influx_url: String,

    /// Time-series database (bucket) name.
    #[arg(long, env = "VOLTAIC_INFLUX_DB", default_value = "home_energy")]
    influx_db: String,

    /// Token credential for the store.
    #[arg(long, env = "VOLTAIC_INFLUX_TOKEN")]
    influx_token: Option<String>,

    /// Username for basic auth against the store.
    #[arg(long, env = "VOLTAIC_INFLUX_USERNAME")]
    influx_username: Option<String>,

    /// Password for basic auth against the store.
    #[arg(long, env = "VOLTAIC_INFLUX_PASSWORD")]
    influx_password: Option<String>,

    /// Measurement queried for readings.
    #[arg(long, env = "VOLTAIC_MEASUREMENT", default_value = "power")]
    measurement: String,

    /// Source tag for records that carry none.
    #[arg(long, env = "VOLTAIC_SOURCE_DEFAULT", default_value = "meter1")]
    source_default: String,

    /// Path of the live analytical database file.
    #[arg(
        long,
        env = "VOLTAIC_DB_PATH",
        default_value = "/data/duckdb/home_energy.duckdb"
    )]
    database_path: PathBuf,

    /// Base directory for date partitions.
    #[arg(long, env = "VOLTAIC_PARTITION_DIR", default_value = "/data/parquet")]
    partition_dir: PathBuf,

    /// Compression codec for partition shards (zstd, snappy, none).
    #[arg(long, env = "VOLTAIC_COMPRESSION", default_value = "zstd")]
    compression: String,

    /// Maximum rows per partition shard file.
    #[arg(long, env = "VOLTAIC_MAX_SHARD_ROWS", default_value = "1000000")]
    max_shard_rows: usize,

    /// Time zone defining calendar-day boundaries.
    #[arg(long, env = "VOLTAIC_TZ", default_value = "Asia/Tokyo")]
    timezone: String,

    /// Explicit target date (YYYY-MM-DD); defaults to local yesterday.
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Log output format (pretty, json).
    #[arg(long, env = "VOLTAIC_LOG_FORMAT", default_value = "pretty")]
    log_format: String,
}

impl Args {
    fn config(&self) -> Result<ArchiveConfig> {
        let config = ArchiveConfig {
            influx_url: self.influx_url.clone(),
            influx_db: self.influx_db.clone(),
            influx_token: self.influx_token.clone(),
            influx_user: self.influx_username.clone(),
            influx_password: self.influx_password.clone(),
            measurement: self.measurement.clone(),
            source_default: self.source_default.clone(),
            database_path: self.database_path.clone(),
            partition_base_dir: self.partition_dir.clone(),
            codec: self.compression.parse::<CompressionCodec>()?,
            max_rows_per_shard: self.max_shard_rows,
            timezone: ArchiveConfig::parse_timezone(&self.timezone)?,
        };
        config.validate()?;
        Ok(config)
    }
}

fn execute(args: &Args) -> Result<RunSummary> {
    let config = args.config()?;
    let source = InfluxSource::new(&config);
    Ok(run_archive(&config, &source, args.date)?)
}

fn main() -> ExitCode {
    let args = Args::parse();
    let format = if args.log_format.eq_ignore_ascii_case("json") {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    init_logging(format);

    match execute(&args) {
        Ok(summary) => {
            info!(
                target_date = %summary.target_date,
                extracted = summary.extracted,
                deleted = summary.deleted,
                inserted = summary.inserted,
                partition = %summary.partition_dir.display(),
                "archive run succeeded"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "archive run failed");
            ExitCode::FAILURE
        }
    }
}
