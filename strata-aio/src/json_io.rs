// strata-aio/src/json_io.rs
use std::path::Path;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use strata_common::error::{Result, StrataError};
use tracing::debug;

/// Writes serializable data to a JSON file (pretty-printed, atomic).
pub fn write_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    debug!("Writing JSON to: {}", path.display());
    let json_bytes = serde_json::to_vec_pretty(data).map_err(|e| StrataError::Json(Arc::new(e)))?;
    crate::fs::atomic_write_file(path, &json_bytes)
}

/// Reads and deserializes data from a JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    debug!("Reading JSON from: {}", path.display());
    let json_bytes = crate::fs::read_to_bytes(path)?;
    serde_json::from_slice(&json_bytes).map_err(|e| StrataError::Json(Arc::new(e)))
}

/// Asynchronously writes serializable data to a JSON file (pretty-printed).
pub async fn write_json_async<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    debug!("Async Writing JSON to: {}", path.display());
    let json_bytes = serde_json::to_vec_pretty(data).map_err(|e| StrataError::Json(Arc::new(e)))?;
    crate::fs::atomic_write_file_async(path, &json_bytes).await
}

/// Asynchronously reads and deserializes data from a JSON file.
pub async fn read_json_async<T: DeserializeOwned>(path: &Path) -> Result<T> {
    debug!("Async Reading JSON from: {}", path.display());
    let json_bytes = crate::fs::read_to_bytes_async(path).await?;
    serde_json::from_slice(&json_bytes).map_err(|e| StrataError::Json(Arc::new(e)))
}
