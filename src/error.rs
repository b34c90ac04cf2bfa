//! Typed errors for per-item failures.
//!
//! Everything that can go wrong with a single asset or a single page is
//! caught at the item boundary and carried as one of these values. Only
//! configuration problems surface as `anyhow` errors and abort a run.

use std::path::PathBuf;

/// A failed call against the remote store.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The store answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The request never produced a response (DNS, TLS, timeout, ...).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The response body did not have the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),

    /// Reading the local file that was being sent failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Whether the call may be sent again.
    ///
    /// A network error (timeouts included) leaves it unknown whether the
    /// store applied the request, so only idempotent calls retry on one.
    pub fn is_retryable(&self, idempotent: bool) -> bool {
        match self {
            TransportError::Status { status, .. } => {
                matches!(status, 429 | 500 | 502 | 503 | 504)
            }
            TransportError::Network(_) => idempotent,
            TransportError::Decode(_) | TransportError::Io(_) => false,
        }
    }
}

/// Why a single asset was not uploaded.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("file too large: {size_mb:.1}MB (max: {max_mb:.1}MB)")]
    TooLarge { size_mb: f64, max_mb: f64 },

    #[error("unsupported file type: {0}")]
    UnsupportedExtension(String),

    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to upload {name}: {source}")]
    Transport {
        name: String,
        #[source]
        source: TransportError,
    },
}

/// Why a resolved asset could not be analyzed.
#[derive(Debug, thiserror::Error)]
#[error("cannot analyze {}: {source}", path.display())]
pub struct AssetError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Why a page could not be created.
#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("failed to create page '{title}': {source}")]
    Create {
        title: String,
        #[source]
        source: TransportError,
    },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses() {
        for status in [429, 500, 502, 503, 504] {
            let err = TransportError::Status {
                status,
                body: String::new(),
            };
            assert!(err.is_retryable(true), "{} should retry", status);
            assert!(err.is_retryable(false), "{} should retry writes", status);
        }
        for status in [400, 401, 404, 409] {
            let err = TransportError::Status {
                status,
                body: String::new(),
            };
            assert!(!err.is_retryable(true), "{} should not retry", status);
        }
    }

    #[test]
    fn network_errors_retry_only_idempotent_calls() {
        let source = reqwest::Client::new()
            .get("not a url")
            .build()
            .unwrap_err();
        let err = TransportError::Network(source);
        assert!(err.is_retryable(true));
        assert!(!err.is_retryable(false));
    }

    #[test]
    fn local_failures_never_retry() {
        let decode = TransportError::Decode("no id".to_string());
        assert!(!decode.is_retryable(true));
        let io = TransportError::Io(std::io::Error::other("gone"));
        assert!(!io.is_retryable(true));
    }

    #[test]
    fn too_large_message() {
        let err = UploadError::TooLarge {
            size_mb: 150.0,
            max_mb: 100.0,
        };
        assert_eq!(err.to_string(), "file too large: 150.0MB (max: 100.0MB)");
    }
}
