//! Serialization utilities with error handling.

use crate::error::{IoError, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::Path;

/// Serializes data to JSON.
pub fn to_json<T>(data: &T) -> Result<String>
where
    T: Serialize,
{
    serde_json::to_string(data)
        .map_err(|e| IoError::serialization(format!("JSON serialization failed: {}", e)))
}

/// Serializes data to pretty-printed JSON.
pub fn to_json_pretty<T>(data: &T) -> Result<String>
where
    T: Serialize,
{
    serde_json::to_string_pretty(data)
        .map_err(|e| IoError::serialization(format!("JSON serialization failed: {}", e)))
}

/// Deserializes data from a JSON string.
///
/// # Returns
/// `IoError::Validation` for empty input, `IoError::Serialization` for malformed JSON.
pub fn from_json<T>(json: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    if json.trim().is_empty() {
        return Err(IoError::validation("Empty JSON string"));
    }

    serde_json::from_str(json)
        .map_err(|e| IoError::serialization(format!("JSON deserialization failed: {}", e)))
}

fn is_gzip(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "gz")
}

/// Writes JSON to a file, gzip-compressed when the path ends in `.gz`.
pub fn write_json_file<T, P>(data: &T, path: P) -> Result<()>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let json = to_json_pretty(data)?;
    let context = || format!("writing JSON to {:?}", path);
    if is_gzip(path) {
        let file = std::fs::File::create(path).map_err(|e| IoError::FileSystem(e).with_context(context()))?;
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder
            .write_all(json.as_bytes())
            .and_then(|_| encoder.finish().map(|_| ()))
            .map_err(|e| IoError::compression(e.to_string()).with_context(context()))?;
    } else {
        std::fs::write(path, json).map_err(|e| IoError::FileSystem(e).with_context(context()))?;
    }
    Ok(())
}

/// Reads JSON from a file, decompressing `.gz` paths.
pub fn read_json_file<T, P>(path: P) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if !path.exists() {
        return Err(IoError::not_found(path.display().to_string()));
    }
    let context = || format!("reading JSON from {:?}", path);
    let json = if is_gzip(path) {
        let file = std::fs::File::open(path).map_err(|e| IoError::FileSystem(e).with_context(context()))?;
        let mut json = String::new();
        GzDecoder::new(file)
            .read_to_string(&mut json)
            .map_err(|e| IoError::compression(e.to_string()).with_context(context()))?;
        json
    } else {
        std::fs::read_to_string(path).map_err(|e| IoError::FileSystem(e).with_context(context()))?
    };
    from_json(&json)
}
