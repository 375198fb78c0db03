/*
File: strata-aio/src/fs.rs
Purpose: Primitive filesystem operations.
*/
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::{fs, io};

use strata_common::error::{Result, StrataError};
use tempfile::NamedTempFile;
use tracing::{debug, error};

/// Creates a directory and all its parent components if they are missing.
pub fn create_dir_all(path: &Path) -> Result<()> {
    debug!("Creating directory recursively: {}", path.display());
    fs::create_dir_all(path).map_err(|e| {
        error!("Failed create dir {}: {}", path.display(), e);
        StrataError::from(e)
    })
}

/// Removes a directory and all its contents recursively. Missing is fine.
pub fn remove_directory_recursive(path: &Path) -> Result<()> {
    debug!("Removing directory recursively: {}", path.display());
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => {
            error!("Failed remove dir_all {}: {}", path.display(), e);
            Err(StrataError::from(e))
        }
    }
}

/// Reads the entire contents of a file into a byte vector.
pub fn read_to_bytes(path: &Path) -> Result<Vec<u8>> {
    debug!("Reading file to bytes: {}", path.display());
    fs::read(path).map_err(|e| {
        error!("Failed read file {}: {}", path.display(), e);
        StrataError::from(e)
    })
}

/// Asynchronously reads the entire contents of a file into a byte vector.
pub async fn read_to_bytes_async(path: &Path) -> Result<Vec<u8>> {
    debug!("Async Reading file to bytes: {}", path.display());
    tokio::fs::read(path).await.map_err(|e| {
        error!("Async Failed read file {}: {}", path.display(), e);
        StrataError::from(e)
    })
}

/// Atomically writes data to a file using a temporary file in the same
/// directory, so readers never observe a half-written file.
pub fn atomic_write_file(original_path: &Path, content: &[u8]) -> Result<()> {
    let dir = original_path.parent().ok_or_else(|| {
        StrataError::Generic(format!(
            "Cannot get parent directory for {}",
            original_path.display()
        ))
    })?;
    create_dir_all(dir)?;

    let mut temp_file = NamedTempFile::new_in(dir)?;
    debug!(
        "Atomically writing {} bytes to {} via temp file {}",
        content.len(),
        original_path.display(),
        temp_file.path().display()
    );
    temp_file.write_all(content)?;
    temp_file.flush()?;
    temp_file.as_file().sync_all()?;

    temp_file.persist(original_path).map_err(|e| {
        error!(
            "Failed to persist temporary file over {}: {}",
            original_path.display(),
            e.error
        );
        StrataError::Io(Arc::new(e.error))
    })?;
    Ok(())
}

/// Asynchronous wrapper over the atomic write; serialization callers run
/// inside a tokio runtime.
pub async fn atomic_write_file_async(original_path: &Path, content: &[u8]) -> Result<()> {
    let path = original_path.to_path_buf();
    let content = content.to_vec();
    tokio::task::spawn_blocking(move || atomic_write_file(&path, &content))
        .await
        .map_err(|e| StrataError::Generic(format!("atomic write task panicked: {e}")))?
}

/// Replaces `published` with `staging` in one rename. The previously
/// published directory, if any, is removed first; callers only invoke this
/// after a fully successful build has written its receipt into staging.
pub fn promote_directory(staging: &Path, published: &Path) -> Result<()> {
    debug!(
        "Promoting {} -> {}",
        staging.display(),
        published.display()
    );
    if let Some(parent) = published.parent() {
        create_dir_all(parent)?;
    }
    remove_directory_recursive(published)?;
    fs::rename(staging, published).map_err(|e| {
        error!(
            "Failed promote {} over {}: {}",
            staging.display(),
            published.display(),
            e
        );
        StrataError::from(e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/dir/file.json");
        atomic_write_file(&target, b"{}").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"{}");
    }

    #[test]
    fn promote_replaces_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("staging");
        let published = dir.path().join("published");
        fs::create_dir_all(&staging).unwrap();
        fs::write(staging.join("new"), b"new").unwrap();
        fs::create_dir_all(&published).unwrap();
        fs::write(published.join("old"), b"old").unwrap();

        promote_directory(&staging, &published).unwrap();
        assert!(published.join("new").exists());
        assert!(!published.join("old").exists());
        assert!(!staging.exists());
    }

    #[test]
    fn remove_missing_directory_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        assert!(remove_directory_recursive(&dir.path().join("absent")).is_ok());
    }
}
