/*
File: strata-aio/src/git.rs
Purpose: Synchronous Git operations using git2.
*/
use std::path::Path;

use git2::{FetchOptions, Repository};
use strata_common::error::{Result, StrataError};
use tracing::{debug, error};

/// Materializes a VCS requirement: clones `url` into `dest` (or fetches if
/// the checkout already exists) and detaches at `rev` when one is pinned.
/// Contains blocking network and filesystem I/O.
pub fn ensure_checkout(url: &str, rev: Option<&str>, dest: &Path) -> Result<()> {
    let repo = if dest.join(".git").exists() {
        debug!("Reusing checkout at {}", dest.display());
        let repo = Repository::open(dest).map_err(|e| {
            error!("Failed open checkout {}: {}", dest.display(), e);
            StrataError::Checkout(format!("failed to open checkout: {e}"))
        })?;
        {
            let mut remote = repo.find_remote("origin").map_err(|e| {
                error!("Failed find remote 'origin' in {}: {}", dest.display(), e);
                StrataError::Checkout(format!("failed to find remote 'origin': {e}"))
            })?;
            let mut fetch_options = FetchOptions::new();
            debug!("Fetching updates for {}", dest.display());
            remote
                .fetch(
                    &["refs/heads/*:refs/remotes/origin/*", "refs/tags/*:refs/tags/*"],
                    Some(&mut fetch_options),
                    None,
                )
                .map_err(|e| {
                    error!("Failed fetch {}: {}", dest.display(), e);
                    StrataError::Checkout(format!("failed to fetch updates: {e}"))
                })?;
        }
        repo
    } else {
        debug!("Cloning {} into {}", url, dest.display());
        if let Some(parent) = dest.parent() {
            crate::fs::create_dir_all(parent)?;
        }
        Repository::clone(url, dest).map_err(|e| {
            error!("Failed clone {}: {}", url, e);
            StrataError::Checkout(format!("failed to clone '{url}': {e}"))
        })?
    };

    if let Some(rev) = rev {
        debug!("Checking out rev '{}' in {}", rev, dest.display());
        let object = repo.revparse_single(rev).map_err(|e| {
            error!("Failed resolve rev '{}' in {}: {}", rev, dest.display(), e);
            StrataError::Checkout(format!("failed to resolve rev '{rev}': {e}"))
        })?;
        repo.checkout_tree(&object, Some(git2::build::CheckoutBuilder::default().force()))
            .map_err(|e| {
                error!("Failed checkout rev '{}': {}", rev, e);
                StrataError::Checkout(format!("failed to check out rev '{rev}': {e}"))
            })?;
        repo.set_head_detached(object.id()).map_err(|e| {
            error!("Failed detach HEAD at '{}': {}", rev, e);
            StrataError::Checkout(format!("failed to detach HEAD at '{rev}': {e}"))
        })?;
    }

    Ok(())
}
