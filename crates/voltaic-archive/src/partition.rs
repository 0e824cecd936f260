//! Parquet partition publication.
//!
//! One partition holds one local calendar day of canonical rows at
//! `<base>/raw_meter_readings/dt=<YYYY-MM-DD>/part-NNNN.parquet`.
//! Rows are serialized into a sibling temporary directory first; the
//! directory rename at the end is the single commit point, so a
//! partial partition is never visible at the canonical path. Reruns
//! for the same date replace the partition wholesale.
//!
//! The column schema carries explicit time-zone metadata (`ts_utc` and
//! `ingested_at` in UTC, `ts_local` in the configured zone) so
//! downstream readers recover calendar semantics without re-deriving
//! them.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, StringArray, TimestampMicrosecondArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;

use voltaic_core::error::{Error, Result};
use voltaic_core::fs_atomic::remove_dir_all_if_exists;
use voltaic_core::{ArchiveConfig, CompressionCodec, MeterRow};

/// The dataset directory name under the partition base.
pub const DATASET_NAME: &str = "raw_meter_readings";

/// Serializes `rows` into a date-keyed parquet partition and publishes
/// it atomically.
///
/// Returns the canonical partition directory. An empty day still
/// produces a partition with one empty shard, so a rerun can erase a
/// previously archived day.
///
/// # Errors
///
/// Returns [`Error::WriteFailed`] on any serialization or rename
/// failure; the temporary directory is cleaned up and a canonical
/// partition from a previous run is left untouched.
pub fn write_partition(
    config: &ArchiveConfig,
    target_date: NaiveDate,
    rows: &[MeterRow],
) -> Result<PathBuf> {
    let dataset_dir = config.partition_base_dir.join(DATASET_NAME);
    let partition_dir = dataset_dir.join(format!("dt={target_date}"));
    let tmp_dir = dataset_dir.join(format!("dt={target_date}__tmp__"));

    // Stale temp directory from an interrupted run.
    remove_dir_all_if_exists(&tmp_dir)
        .map_err(|e| Error::write_failed_with(format!("clean {}", tmp_dir.display()), e))?;
    fs::create_dir_all(&tmp_dir)
        .map_err(|e| Error::write_failed_with(format!("create {}", tmp_dir.display()), e))?;

    if let Err(e) = write_shards(config, &tmp_dir, rows) {
        let _ = fs::remove_dir_all(&tmp_dir);
        return Err(e);
    }

    // Commit point: supersede any prior partition, then one rename.
    let published = remove_dir_all_if_exists(&partition_dir)
        .map_err(|e| {
            Error::write_failed_with(format!("supersede {}", partition_dir.display()), e)
        })
        .and_then(|_| {
            fs::rename(&tmp_dir, &partition_dir).map_err(|e| {
                Error::write_failed_with(format!("publish {}", partition_dir.display()), e)
            })
        });
    if let Err(e) = published {
        let _ = fs::remove_dir_all(&tmp_dir);
        return Err(e);
    }

    Ok(partition_dir)
}

fn write_shards(config: &ArchiveConfig, tmp_dir: &Path, rows: &[MeterRow]) -> Result<()> {
    let schema = partition_schema(config.timezone_name());
    let props = writer_properties(config.codec);

    let shard_rows = config.max_rows_per_shard.max(1);
    let shards: Vec<&[MeterRow]> = if rows.is_empty() {
        vec![&[]]
    } else {
        rows.chunks(shard_rows).collect()
    };

    for (index, shard) in shards.iter().enumerate() {
        let path = tmp_dir.join(format!("part-{index:04}.parquet"));
        let batch = to_record_batch(&schema, shard, config.timezone_name())?;
        let file = File::create(&path)
            .map_err(|e| Error::write_failed_with(format!("create {}", path.display()), e))?;
        let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props.clone()))
            .map_err(|e| Error::write_failed_with("open parquet writer", e))?;
        writer
            .write(&batch)
            .map_err(|e| Error::write_failed_with(format!("write {}", path.display()), e))?;
        writer
            .close()
            .map_err(|e| Error::write_failed_with(format!("finish {}", path.display()), e))?;
    }
    Ok(())
}

/// Reads every shard of a published partition back into canonical
/// rows, in shard order.
///
/// This is the merge path's view of the partition: the published files
/// are the source of truth, not the rows that produced them.
///
/// # Errors
///
/// Returns [`Error::MergeFailed`] when the partition is absent or a
/// shard cannot be decoded.
pub fn read_partition(partition_dir: &Path, tz: Tz) -> Result<Vec<MeterRow>> {
    let mut shard_paths: Vec<PathBuf> = fs::read_dir(partition_dir)
        .map_err(|e| {
            Error::merge_failed_with(format!("open partition {}", partition_dir.display()), e)
        })?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "parquet"))
        .collect();
    shard_paths.sort();

    if shard_paths.is_empty() {
        return Err(Error::merge_failed(format!(
            "partition {} contains no shard files",
            partition_dir.display()
        )));
    }

    let mut rows = Vec::new();
    for path in shard_paths {
        let file = File::open(&path)
            .map_err(|e| Error::merge_failed_with(format!("open {}", path.display()), e))?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .map_err(|e| Error::merge_failed_with(format!("read {}", path.display()), e))?
            .build()
            .map_err(|e| Error::merge_failed_with(format!("read {}", path.display()), e))?;
        for batch in reader {
            let batch = batch
                .map_err(|e| Error::merge_failed_with(format!("decode {}", path.display()), e))?;
            decode_batch(&batch, tz, &mut rows)?;
        }
    }
    Ok(rows)
}

// ============================================================================
// Schema and batch conversion
// ============================================================================

fn partition_schema(tz_name: &str) -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(
            "ts_utc",
            DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
            false,
        ),
        Field::new(
            "ts_local",
            DataType::Timestamp(TimeUnit::Microsecond, Some(tz_name.into())),
            false,
        ),
        Field::new("source", DataType::Utf8, false),
        Field::new("instant_power_w", DataType::Float64, false),
        Field::new("energy_import_kwh", DataType::Float64, false),
        Field::new("energy_export_kwh", DataType::Float64, false),
        Field::new(
            "ingested_at",
            DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
            false,
        ),
    ]))
}

fn writer_properties(codec: CompressionCodec) -> WriterProperties {
    let compression = match codec {
        CompressionCodec::Zstd => Compression::ZSTD(ZstdLevel::default()),
        CompressionCodec::Snappy => Compression::SNAPPY,
        CompressionCodec::None => Compression::UNCOMPRESSED,
    };
    WriterProperties::builder()
        .set_compression(compression)
        .set_created_by("voltaic-archive".to_string())
        .build()
}

fn to_record_batch(schema: &SchemaRef, rows: &[MeterRow], tz_name: &str) -> Result<RecordBatch> {
    let ts_utc = TimestampMicrosecondArray::from(
        rows.iter()
            .map(|r| r.ts_utc.timestamp_micros())
            .collect::<Vec<_>>(),
    )
    .with_timezone("UTC");
    let ts_local = TimestampMicrosecondArray::from(
        rows.iter()
            .map(|r| r.ts_local.timestamp_micros())
            .collect::<Vec<_>>(),
    )
    .with_timezone(tz_name);
    let source = StringArray::from(rows.iter().map(|r| r.source.clone()).collect::<Vec<_>>());
    let instant_power_w =
        Float64Array::from(rows.iter().map(|r| r.instant_power_w).collect::<Vec<_>>());
    let energy_import_kwh =
        Float64Array::from(rows.iter().map(|r| r.energy_import_kwh).collect::<Vec<_>>());
    let energy_export_kwh =
        Float64Array::from(rows.iter().map(|r| r.energy_export_kwh).collect::<Vec<_>>());
    let ingested_at = TimestampMicrosecondArray::from(
        rows.iter()
            .map(|r| r.ingested_at.timestamp_micros())
            .collect::<Vec<_>>(),
    )
    .with_timezone("UTC");

    let columns: Vec<ArrayRef> = vec![
        Arc::new(ts_utc),
        Arc::new(ts_local),
        Arc::new(source),
        Arc::new(instant_power_w),
        Arc::new(energy_import_kwh),
        Arc::new(energy_export_kwh),
        Arc::new(ingested_at),
    ];
    RecordBatch::try_new(schema.clone(), columns)
        .map_err(|e| Error::write_failed_with("assemble record batch", e))
}

fn decode_batch(batch: &RecordBatch, tz: Tz, rows: &mut Vec<MeterRow>) -> Result<()> {
    let ts_utc = timestamp_column(batch, 0)?;
    let ts_local = timestamp_column(batch, 1)?;
    let source = batch
        .column(2)
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| Error::merge_failed("source column is not utf8"))?;
    let instant_power_w = float_column(batch, 3)?;
    let energy_import_kwh = float_column(batch, 4)?;
    let energy_export_kwh = float_column(batch, 5)?;
    let ingested_at = timestamp_column(batch, 6)?;

    for i in 0..batch.num_rows() {
        rows.push(MeterRow {
            ts_utc: utc_from_micros(ts_utc.value(i))?,
            ts_local: utc_from_micros(ts_local.value(i))?.with_timezone(&tz),
            source: source.value(i).to_string(),
            instant_power_w: instant_power_w.value(i),
            energy_import_kwh: energy_import_kwh.value(i),
            energy_export_kwh: energy_export_kwh.value(i),
            ingested_at: utc_from_micros(ingested_at.value(i))?,
        });
    }
    Ok(())
}

fn timestamp_column(batch: &RecordBatch, index: usize) -> Result<&TimestampMicrosecondArray> {
    batch
        .column(index)
        .as_any()
        .downcast_ref::<TimestampMicrosecondArray>()
        .ok_or_else(|| {
            Error::merge_failed(format!("column {index} is not a microsecond timestamp"))
        })
}

fn float_column(batch: &RecordBatch, index: usize) -> Result<&Float64Array> {
    batch
        .column(index)
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| Error::merge_failed(format!("column {index} is not float64")))
}

fn utc_from_micros(micros: i64) -> Result<DateTime<chrono::Utc>> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| Error::merge_failed(format!("timestamp out of range: {micros}")))
}
