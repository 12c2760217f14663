//! Preflight parsing of raw URL lists.
//!
//! The input format is one URL per line. Blank lines and lines starting
//! with `#` are ignored, and anything after the first whitespace on a
//! line is discarded. Each valid URL maps to a
//! [`TransferDescriptor`] whose destination is the decoded URL path
//! joined under the destination directory. Invalid lines become
//! human-readable diagnostics instead; the coordinator only ever
//! receives the valid subset.
//!
//! ```
//! use std::path::Path;
//! use barge::list::UrlList;
//!
//! let list = UrlList::parse(
//!     "# mirror assets\nhttps://example.com/a/b.zip\nftp://example.com/c.zip",
//!     Path::new("downloads"),
//! );
//! assert_eq!(list.descriptors.len(), 1);
//! assert_eq!(list.diagnostics.len(), 1);
//! ```

use crate::transfer::TransferDescriptor;

use reqwest::Url;
use std::path::Path;
use tracing::debug;

/// Result of parsing a raw URL list: the valid descriptors in input
/// order, and one diagnostic per rejected line.
#[derive(Debug, Default)]
pub struct UrlList {
    /// Validated descriptors, in input order.
    pub descriptors: Vec<TransferDescriptor>,
    /// One human-readable message per rejected line.
    pub diagnostics: Vec<String>,
}

impl UrlList {
    /// Parses `contents` and maps each valid URL to a destination below
    /// `destination`.
    pub fn parse(contents: &str, destination: &Path) -> Self {
        let mut list = UrlList::default();

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            // ignore any rubbish following the url
            let Some(token) = line.split_whitespace().next() else {
                continue;
            };
            match parse_line(token, destination) {
                Ok(descriptor) => {
                    debug!("Appending {:?}", descriptor.destination);
                    list.descriptors.push(descriptor);
                }
                Err(diagnostic) => list.diagnostics.push(diagnostic),
            }
        }

        list
    }
}

fn parse_line(token: &str, destination: &Path) -> Result<TransferDescriptor, String> {
    let url = Url::parse(token)
        .map_err(|e| format!("The url \"{token}\" cannot be parsed: {e}"))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!(
            "URL {token} does not follow the http or https scheme"
        ));
    }

    let segments: Vec<String> = url
        .path_segments()
        .map(|segments| {
            segments
                .filter(|segment| !segment.is_empty())
                .map(decode_segment)
                .collect()
        })
        .unwrap_or_default();
    if segments.is_empty() {
        return Err(format!("URL {token} does not contain a path component"));
    }

    let relative_path = segments.join("/");
    let mut path = destination.to_path_buf();
    for segment in &segments {
        path.push(segment);
    }

    Ok(TransferDescriptor::new(url, path, relative_path))
}

fn decode_segment(segment: &str) -> String {
    form_urlencoded::parse(segment.as_bytes())
        .map(|(key, val)| [key, val].concat())
        .collect()
}
