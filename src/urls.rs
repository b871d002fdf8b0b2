//! Loading the list of sites to capture.
//!
//! The list is re-read from disk on every cycle so operators can edit it
//! while the service runs.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum UrlListError {
    #[error("{} not found", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Read the URL list at `path`.
///
/// # Errors
///
/// Returns [`UrlListError::NotFound`] if the file does not exist and
/// [`UrlListError::Read`] for any other I/O failure (including invalid UTF-8).
pub async fn load_urls(path: &Path) -> Result<Vec<String>, UrlListError> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(UrlListError::NotFound(path.to_path_buf()));
        }
        Err(source) => {
            return Err(UrlListError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let urls = parse_url_list(&contents);
    debug!(path = %path.display(), count = urls.len(), "Loaded URL list");
    Ok(urls)
}

/// Trimmed, non-blank lines in file order. Duplicates are kept.
#[must_use]
pub fn parse_url_list(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}
