//! # voltaic-archive
//!
//! The daily archival pipeline for power-meter readings.
//!
//! One run extracts a local calendar day of readings from the
//! time-series store, normalizes them into canonical rows, publishes
//! them as an immutable date-keyed parquet partition, and merges the
//! partition into a local DuckDB file through a copy-validate-swap
//! protocol. Data flows strictly left to right:
//!
//! ```text
//! window ──► extract ──► transform ──► partition ──► merge
//!                            (supervised by pipeline)
//! ```
//!
//! Every durable state transition is gated behind an atomic rename, so
//! killing the process at any point leaves the filesystem in either the
//! pre-run or the fully-merged post-run state, never a torn one.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod extract;
pub mod merge;
pub mod partition;
pub mod pipeline;
pub mod transform;

pub use extract::{InfluxSource, ReadingSource};
pub use merge::{merge_partition, MergeReport};
pub use partition::{read_partition, write_partition};
pub use pipeline::{run_archive, RunSummary};
pub use transform::transform_readings;
