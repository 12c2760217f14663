//! HTTP client setup and response utilities.
//!
//! The client built here is shared immutably by every transfer in a
//! batch; its lifetime is owned by the coordinator, not by a module-level
//! singleton.

pub mod client;

pub use client::{create_http_client, HttpClientConfig};

use reqwest::header::{HeaderMap, CONTENT_LENGTH};

/// Expected body size from the response headers.
///
/// Returns `None` if the `Content-Length` header is missing or is not a
/// valid `u64`, in which case the size of the transfer is unknown until
/// end of stream.
pub fn extract_content_length(headers: &HeaderMap) -> Option<u64> {
    headers.get(CONTENT_LENGTH)?.to_str().ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_extract_content_length() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_content_length(&headers), None);

        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("4096"));
        assert_eq!(extract_content_length(&headers), Some(4096));

        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("junk"));
        assert_eq!(extract_content_length(&headers), None);
    }
}
