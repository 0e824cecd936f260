//! Idempotent filesystem helpers for the swap protocol.
//!
//! Every helper here treats an absent path as success rather than an
//! error, so the copy-validate-swap sequence can be written as a
//! straight-line protocol without existence branching at each call
//! site. Helpers return plain [`std::io::Result`]; each pipeline stage
//! wraps failures into its own error class at its boundary.

use std::fs;
use std::io;
use std::path::Path;

/// Removes a file. Absent is success.
///
/// Returns whether the file existed.
///
/// # Errors
///
/// Returns any I/O failure other than the path being absent.
pub fn remove_file_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Removes a directory tree. Absent is success.
///
/// Returns whether the directory existed.
///
/// # Errors
///
/// Returns any I/O failure other than the path being absent.
pub fn remove_dir_all_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Byte-copies `from` to `to` when `from` exists. Absent source is
/// success.
///
/// Returns whether a copy happened.
///
/// # Errors
///
/// Returns any I/O failure other than the source being absent.
pub fn copy_if_exists(from: &Path, to: &Path) -> io::Result<bool> {
    match fs::copy(from, to) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Atomically renames `from` to `to` when `from` exists. Absent source
/// is success.
///
/// Returns whether a rename happened.
///
/// # Errors
///
/// Returns any I/O failure other than the source being absent.
pub fn rename_if_exists(from: &Path, to: &Path) -> io::Result<bool> {
    match fs::rename(from, to) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
