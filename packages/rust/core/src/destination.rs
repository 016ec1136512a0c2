//! Destination directory preparation.

use std::path::Path;

use tracing::{debug, info};

use nimefetch_shared::{NimeFetchError, Result};

/// What [`prepare_destination`] found on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationStatus {
    /// The directory (and any missing parents) was created.
    Created,
    /// Something already exists at the path; used as-is.
    Existing,
}

/// Make sure `path` exists, creating it and its parents if needed.
///
/// An existing path is not checked for being a writable directory.
pub fn prepare_destination(path: &Path) -> Result<DestinationStatus> {
    if path.exists() {
        debug!(path = %path.display(), "destination already exists");
        return Ok(DestinationStatus::Existing);
    }

    std::fs::create_dir_all(path).map_err(|e| NimeFetchError::setup(path, e))?;
    info!(path = %path.display(), "created destination directory");
    Ok(DestinationStatus::Created)
}
