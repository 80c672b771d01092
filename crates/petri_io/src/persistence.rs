//! Versioned population snapshot files.
//!
//! A snapshot file wraps a [`PopulationSnapshot`] with a format version, a run
//! identifier and the fingerprint of the configuration that produced it, so a
//! reload can refuse a snapshot taken under a different world layout.

use crate::error::{IoError, Result};
use crate::serialization::{read_json_file, write_json_file};
use petri_data::PopulationSnapshot;
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotFile {
    pub version: u32,
    pub run_id: Uuid,
    pub config_fingerprint: String,
    pub snapshot: PopulationSnapshot,
}

impl SnapshotFile {
    pub fn new(snapshot: PopulationSnapshot, config_fingerprint: impl Into<String>) -> Self {
        Self {
            version: SNAPSHOT_FORMAT_VERSION,
            run_id: Uuid::new_v4(),
            config_fingerprint: config_fingerprint.into(),
            snapshot,
        }
    }
}

/// Writes `snapshot` to `path`; `.gz` paths are gzip-compressed.
pub fn save_snapshot<P: AsRef<Path>>(
    snapshot: &PopulationSnapshot,
    config_fingerprint: &str,
    path: P,
) -> Result<Uuid> {
    let file = SnapshotFile::new(snapshot.clone(), config_fingerprint);
    write_json_file(&file, path)?;
    Ok(file.run_id)
}

/// Loads a snapshot file, checking its version and, when given, the config fingerprint.
pub fn load_snapshot<P: AsRef<Path>>(
    path: P,
    expected_fingerprint: Option<&str>,
) -> Result<SnapshotFile> {
    let file: SnapshotFile = read_json_file(path)?;
    if file.version != SNAPSHOT_FORMAT_VERSION {
        return Err(IoError::validation(format!(
            "unsupported snapshot version {} (expected {})",
            file.version, SNAPSHOT_FORMAT_VERSION
        )));
    }
    if let Some(expected) = expected_fingerprint {
        if file.config_fingerprint != expected {
            return Err(IoError::validation(format!(
                "config fingerprint mismatch: snapshot {} vs current {}",
                file.config_fingerprint, expected
            )));
        }
    }
    let snap = &file.snapshot;
    let cells = snap.width * snap.height;
    if let Some(bad) = snap.organisms.iter().find(|o| o.cell_id >= cells) {
        return Err(IoError::validation(format!(
            "organism cell {} outside {}x{} world",
            bad.cell_id, snap.width, snap.height
        )));
    }
    Ok(file)
}
