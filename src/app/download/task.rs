//! Download tasks and destination naming
//!
//! A [`DownloadTask`] is a self-contained request descriptor: source URL,
//! destination path, optional expected size and any headers the caller
//! wants sent. The manager never invents headers of its own.

use std::path::{Path, PathBuf};

use reqwest::header::REFERER;
use serde::{Deserialize, Serialize};

use crate::app::models::HotListItem;
use crate::constants::files;

/// One media file to fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadTask {
    pub source_url: String,
    pub destination_path: PathBuf,
    /// Size in bytes the finished file must have, when known
    pub expected_size: Option<u64>,
    /// Extra request headers, sent verbatim
    #[serde(default)]
    pub headers: Vec<(String, String)>,
}

impl DownloadTask {
    pub fn new(source_url: impl Into<String>, destination_path: impl Into<PathBuf>) -> Self {
        Self {
            source_url: source_url.into(),
            destination_path: destination_path.into(),
            expected_size: None,
            headers: Vec::new(),
        }
    }

    pub fn with_expected_size(mut self, size: u64) -> Self {
        self.expected_size = Some(size);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Build one task per item that has a media URL
///
/// Files are named `[{position}]_{title}.mp4` inside `dir`, and each request
/// carries the item page as referer.
pub fn tasks_for_items(items: &[HotListItem], dir: &Path) -> Vec<DownloadTask> {
    items
        .iter()
        .filter_map(|item| {
            let media_url = item.media_url()?;
            let mut stem = sanitize_file_stem(&item.title);
            if stem.is_empty() {
                stem = fallback_file_stem(media_url);
            }
            let file_name = format!("[{}]_{}.{}", item.position, stem, files::MEDIA_EXTENSION);

            Some(
                DownloadTask::new(media_url, dir.join(file_name))
                    .with_header(REFERER.as_str(), item.item_url.as_str()),
            )
        })
        .collect()
}

/// Make `title` safe to use as a file name stem on every platform
///
/// Reserved and control characters become `_`, surrounding dots and spaces
/// are trimmed, reserved Windows device names are prefixed, and the result
/// is capped at a fixed number of characters.
pub fn sanitize_file_stem(title: &str) -> String {
    let replaced: String = title
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let capped: String = replaced
        .trim_matches(|c: char| c == '.' || c.is_whitespace())
        .chars()
        .take(files::MAX_FILE_STEM_CHARS)
        .collect();
    let stem = capped
        .trim_end_matches(|c: char| c == '.' || c.is_whitespace())
        .to_string();

    if is_reserved_name(&stem) {
        format!("_{}", stem)
    } else {
        stem
    }
}

fn is_reserved_name(stem: &str) -> bool {
    const RESERVED: [&str; 4] = ["CON", "PRN", "AUX", "NUL"];

    let upper = stem.to_ascii_uppercase();
    if RESERVED.contains(&upper.as_str()) {
        return true;
    }
    // COM1..COM9, LPT1..LPT9
    (upper.starts_with("COM") || upper.starts_with("LPT"))
        && upper.len() == 4
        && upper.as_bytes()[3].is_ascii_digit()
        && upper.as_bytes()[3] != b'0'
}

/// Stem derived from the media URL, for items without a usable title
///
/// Depends only on the URL so the same item maps to the same file on every run.
pub fn fallback_file_stem(media_url: &str) -> String {
    let digest = format!("{:x}", md5::compute(media_url.as_bytes()));
    format!("video_{}", &digest[..8])
}
