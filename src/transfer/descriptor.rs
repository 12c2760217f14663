//! The immutable description of a single transfer.

use reqwest::Url;
use std::path::PathBuf;

/// A validated (URL, destination path) pair.
///
/// Descriptors are produced by [`crate::list::UrlList::parse`] and
/// consumed by the coordinator, which builds exactly one
/// [`crate::transfer::TransferUnit`] per descriptor. They carry no
/// mutable state and never change for the lifetime of the batch.
#[derive(Debug, Clone)]
pub struct TransferDescriptor {
    /// Source URL of the file to download.
    pub url: Url,
    /// Absolute path the file is written to. Parent directories are
    /// created on demand.
    pub destination: PathBuf,
    /// Human-readable label, the decoded URL path relative to the
    /// destination directory.
    pub relative_path: String,
}

impl TransferDescriptor {
    /// Creates a new [`TransferDescriptor`].
    pub fn new(url: Url, destination: PathBuf, relative_path: impl Into<String>) -> Self {
        Self {
            url,
            destination,
            relative_path: relative_path.into(),
        }
    }
}
