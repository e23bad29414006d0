//! Reads, locks and writes back Dockerfiles.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use a3s_lock_core::config::LockMode;
use a3s_lock_core::error::{LockError, Result};
use futures::future::join_all;

use crate::dockerfile::DockerfileDocument;
use crate::lock::{CachingResolver, DigestResolver, LockEngine};
use crate::report::FileReport;

/// Lock one Dockerfile in place.
///
/// A file that cannot be read or parsed is reported and left alone. The file
/// is only written when at least one instruction changed, so its modification
/// time survives a no-op run.
pub async fn process_file<R: DigestResolver>(path: &Path, resolver: R, mode: LockMode) -> FileReport {
    let mut document = match DockerfileDocument::from_file(path) {
        Ok(document) => document,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Skipping Dockerfile");
            return FileReport::skipped(path, e);
        }
    };

    let decisions = LockEngine::new(resolver, mode).lock(&mut document).await;
    let changed = decisions.iter().any(|d| d.outcome.is_change());

    let mut report = FileReport::new(path, decisions, false);
    if changed {
        match write_atomic(path, &document.to_string()) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Saved Dockerfile");
                report.saved = true;
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to save Dockerfile");
                report.save_error = Some(e);
            }
        }
    }
    report
}

/// Lock several Dockerfiles concurrently.
///
/// Every file gets its own memoizing resolver over the shared one. A file
/// named more than once is processed once; reports come back in the order of
/// first appearance in `paths`.
pub async fn process_files<R>(paths: &[PathBuf], resolver: Arc<R>, mode: LockMode) -> Vec<FileReport>
where
    R: DigestResolver + ?Sized,
{
    let mut seen = HashSet::new();
    let unique: Vec<&PathBuf> = paths
        .iter()
        .filter(|path| {
            let key = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
            if seen.insert(key) {
                true
            } else {
                tracing::debug!(path = %path.display(), "Ignoring duplicate Dockerfile path");
                false
            }
        })
        .collect();

    let tasks = unique.into_iter().map(|path| {
        let resolver = CachingResolver::new(resolver.clone());
        async move { process_file(path, resolver, mode).await }
    });
    join_all(tasks).await
}

/// Replace `path` with `content` via a temporary file in the same directory.
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| LockError::IoError(format!("Not a file path: {}", path.display())))?;
    let tmp_path = path.with_file_name(format!(".{}.tmp", file_name.to_string_lossy()));

    std::fs::write(&tmp_path, content).map_err(|e| {
        LockError::IoError(format!(
            "Failed to write Dockerfile {}: {}",
            tmp_path.display(),
            e
        ))
    })?;

    if let Ok(metadata) = std::fs::metadata(path) {
        if let Err(e) = std::fs::set_permissions(&tmp_path, metadata.permissions()) {
            tracing::debug!(path = %tmp_path.display(), error = %e, "Could not copy permissions");
        }
    }

    std::fs::rename(&tmp_path, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp_path);
        LockError::IoError(format!(
            "Failed to rename Dockerfile {} -> {}: {}",
            tmp_path.display(),
            path.display(),
            e
        ))
    })
}
