use crate::job::JobError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Finds the produced media file among the direct contents of `workspace`.
///
/// Entries are visited in lexicographic order and the first file whose extension
/// (case-insensitive) is in `allowed_extensions` wins. Partial and intermediate
/// files left by the fetcher are skipped by the extension filter.
pub fn resolve_artifact(workspace: &Path, allowed_extensions: &[&str]) -> Result<PathBuf, JobError> {
    let mut entries = std::fs::read_dir(workspace)
        .map_err(JobError::Workspace)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect::<Vec<_>>();
    entries.sort();

    debug!("Workspace {} holds {} files", workspace.display(), entries.len());

    entries
        .into_iter()
        .find(|path| has_allowed_extension(path, allowed_extensions))
        .ok_or_else(|| JobError::ArtifactNotFound {
            workspace: workspace.to_path_buf(),
        })
}

fn has_allowed_extension(path: &Path, allowed_extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            allowed_extensions
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeCheck {
    Fits,
    TooLarge(u64),
}

/// Compares a file size against the upload limit. A file exactly at the limit fits.
pub fn check_size(file_size_bytes: u64, limit_bytes: u64) -> SizeCheck {
    if file_size_bytes > limit_bytes {
        SizeCheck::TooLarge(file_size_bytes)
    } else {
        SizeCheck::Fits
    }
}
