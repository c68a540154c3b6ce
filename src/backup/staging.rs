// s3dump/src/backup/staging.rs
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::errors::{BackupError, Result};

#[cfg(unix)]
const STAGING_DIR_MODE: u32 = 0o777;

/// Creates the staging directory and any missing parents. Calling it on an
/// existing directory is a no-op.
pub fn ensure(path: &Path) -> Result<()> {
    if path.is_dir() {
        debug!("Staging directory {} already exists", path.display());
        return Ok(());
    }

    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(STAGING_DIR_MODE);
    }

    builder
        .create(path)
        .map_err(|source| BackupError::StagingUnavailable {
            path: path.to_path_buf(),
            source,
        })?;
    debug!("Created staging directory {}", path.display());
    Ok(())
}

/// Removes `path` and everything below it, deepest entries first.
///
/// Entries that disappear between listing and removal are skipped. A `path`
/// that no longer exists counts as removed.
pub fn destroy(path: &Path) -> Result<()> {
    let cleanup_failed = |source: io::Error| BackupError::CleanupFailed {
        path: path.to_path_buf(),
        source,
    };

    if !path.exists() {
        warn!("Staging directory {} is already gone", path.display());
        return Ok(());
    }

    for entry in WalkDir::new(path).contents_first(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if is_vanished(&e) => continue,
            Err(e) => {
                let source = e
                    .into_io_error()
                    .unwrap_or_else(|| io::Error::other("filesystem loop detected"));
                return Err(cleanup_failed(source));
            }
        };

        remove_entry(entry.path(), entry.file_type().is_dir()).map_err(cleanup_failed)?;
    }

    debug!("Removed staging directory {}", path.display());
    Ok(())
}

// An entry that is already gone is as good as removed.
fn remove_entry(path: &Path, is_dir: bool) -> io::Result<()> {
    let removed = if is_dir {
        fs::remove_dir(path)
    } else {
        fs::remove_file(path)
    };

    match removed {
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("{} vanished before removal", path.display());
            Ok(())
        }
        other => other,
    }
}

fn is_vanished(error: &walkdir::Error) -> bool {
    error
        .io_error()
        .is_some_and(|e| e.kind() == io::ErrorKind::NotFound)
}
