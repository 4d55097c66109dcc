//! Path helpers for atomic temp-then-rename writes

use std::path::{Path, PathBuf};

use crate::constants::files;

/// Temporary sibling used while `path` is being written
///
/// `clip.mp4` becomes `clip.mp4.tmp`; a path without extension gains `.tmp`.
pub fn temp_path_for(path: &Path) -> PathBuf {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let suffix = files::TEMP_FILE_SUFFIX.trim_start_matches('.');

    if extension.is_empty() {
        path.with_extension(suffix)
    } else {
        path.with_extension(format!("{}.{}", extension, suffix))
    }
}

/// Create the parent directory of `path` if it is missing
pub async fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => tokio::fs::create_dir_all(parent).await,
        _ => Ok(()),
    }
}
