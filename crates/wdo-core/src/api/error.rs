//! Error types for the order-delivery API.

/// Failure of a metadata call (order list, order details, model runs).
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid base URL {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("GET {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u32 },
    #[error("GET {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: curl::Error,
    },
    #[error("unexpected response body from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("no complete runs listed for model {model}")]
    NoCompleteRuns { model: String },
}

impl ApiError {
    /// HTTP status, when the failure was a non-200 response.
    pub fn status(&self) -> Option<u32> {
        match self {
            ApiError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Failure of a single file download. Captured as data by the worker, never fatal.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// Response status was not 200.
    #[error("HTTP reason and status: {reason} {status}")]
    Http { status: u32, reason: String },
    /// Curl reported an error (timeout, connection, etc.).
    #[error("transfer failed: {0}")]
    Transport(#[source] curl::Error),
    /// Writing the body to disk failed (e.g. disk full, permission denied).
    #[error("storage: {0}")]
    Storage(#[source] std::io::Error),
}

impl DownloadError {
    pub fn status(&self) -> Option<u32> {
        match self {
            DownloadError::Http { status, .. } => Some(*status),
            DownloadError::Transport(_) | DownloadError::Storage(_) => None,
        }
    }

    /// Short reason suitable for a report line.
    pub fn reason(&self) -> String {
        match self {
            DownloadError::Http { reason, .. } => reason.clone(),
            DownloadError::Transport(e) => e.description().to_string(),
            DownloadError::Storage(e) => e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_download_error_exposes_status_and_reason() {
        let e = DownloadError::Http {
            status: 500,
            reason: "Internal Server Error".into(),
        };
        assert_eq!(e.status(), Some(500));
        assert_eq!(e.reason(), "Internal Server Error");
        assert_eq!(
            e.to_string(),
            "HTTP reason and status: Internal Server Error 500"
        );
    }

    #[test]
    fn storage_error_has_no_status() {
        let e = DownloadError::Storage(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk full",
        ));
        assert_eq!(e.status(), None);
        assert!(e.to_string().contains("disk full"));
    }
}
