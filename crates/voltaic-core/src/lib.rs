//! # voltaic-core
//!
//! Shared primitives for the Voltaic meter archival pipeline.
//!
//! This crate provides the foundational types used across the archival
//! components:
//!
//! - **Error Types**: one error taxonomy per pipeline failure class
//! - **Configuration**: the runtime configuration value, built once at
//!   startup and passed by reference into every component
//! - **Archive Window**: UTC bounds of one local calendar day
//! - **Row Model**: raw store records and canonical archive rows
//! - **Filesystem Helpers**: idempotent operations used by the
//!   copy-validate-swap protocol
//! - **Observability**: structured logging initialization
//!
//! ## Crate Boundary
//!
//! `voltaic-core` holds everything shared between pipeline stages and
//! nothing stage-specific: no network, columnar, or database code lives
//! here.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod fs_atomic;
pub mod observability;
pub mod row;
pub mod window;

pub use config::{ArchiveConfig, CompressionCodec};
pub use error::{Error, Result};
pub use row::{MeterRow, RawReading};
pub use window::ArchiveWindow;
