//! # Petri IO
//!
//! Persistence layer for petri populations.
//!
//! This crate provides:
//! - Structured error handling with custom error types
//! - Validated JSON serialization helpers, plain or gzip-compressed
//! - Versioned population snapshot files stamped with a config fingerprint

/// Error types and result aliases for I/O operations
pub mod error;
/// Population snapshot files
pub mod persistence;
/// Validated serialization helpers for JSON, plain or gzip
pub mod serialization;

pub use error::{IoError, Result};
pub use persistence::{load_snapshot, save_snapshot, SnapshotFile, SNAPSHOT_FORMAT_VERSION};
pub use serialization::{from_json, read_json_file, to_json, to_json_pretty, write_json_file};
