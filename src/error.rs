//! Engine error types.

use thiserror::Error;

use crate::i18n::Localizer;

/// Coarse classification used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Scheme,
    Network,
    File,
    Unknown,
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("invalid URL '{url}': {reason}")]
    Scheme { url: String, reason: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP error {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("server answered range {start}-{end} with HTTP {status} instead of 206")]
    RangeNotHonored { status: u16, start: u64, end: u64 },

    #[error("transfer ended early: received {received} of {expected} bytes")]
    Incomplete { expected: u64, received: u64 },

    #[error("file error: {0}")]
    File(#[from] std::io::Error),

    #[error("{0}")]
    Unknown(String),
}

impl DownloadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Scheme { .. } => ErrorKind::Scheme,
            Self::Network(_)
            | Self::HttpStatus { .. }
            | Self::RangeNotHonored { .. }
            | Self::Incomplete { .. } => ErrorKind::Network,
            Self::File(_) => ErrorKind::File,
            Self::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// True for bad-path or bad-seek file errors (`EINVAL`).
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::File(e) if e.kind() == std::io::ErrorKind::InvalidInput)
    }

    /// Status-line key for this failure.
    pub fn status_key(&self) -> &'static str {
        if self.is_invalid_argument() {
            "status_file_error"
        } else {
            "status_error"
        }
    }

    /// Localized `(title, message)` pair for the error dialog.
    pub fn localized(&self, strings: &Localizer) -> (String, String) {
        let detail = self.to_string();
        match self {
            Self::Scheme { url, .. } => (
                strings.get("error_url"),
                strings.format("error_url_msg", &[("url", url.as_str())]),
            ),
            Self::File(_) => (
                strings.get("error_file"),
                strings.format("error_file_msg", &[("error", detail.as_str())]),
            ),
            Self::Unknown(_) => (
                strings.get("error_title"),
                strings.format("error_unknown_msg", &[("error", detail.as_str())]),
            ),
            _ => (
                strings.get("error_download"),
                strings.format("error_download_msg", &[("error", detail.as_str())]),
            ),
        }
    }
}

impl From<tokio::task::JoinError> for DownloadError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Unknown(format!("worker task failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn classification() {
        let file = DownloadError::File(io::Error::new(io::ErrorKind::InvalidInput, "bad seek"));
        assert_eq!(file.kind(), ErrorKind::File);
        assert!(file.is_invalid_argument());
        assert_eq!(file.status_key(), "status_file_error");

        let denied = DownloadError::File(io::Error::new(io::ErrorKind::PermissionDenied, "nope"));
        assert!(!denied.is_invalid_argument());
        assert_eq!(denied.status_key(), "status_error");

        let short = DownloadError::Incomplete { expected: 10, received: 4 };
        assert_eq!(short.kind(), ErrorKind::Network);
    }

    #[test]
    fn scheme_error_mentions_url() {
        let strings = Localizer::new("en");
        let err = DownloadError::Scheme { url: "ftp:/x".into(), reason: "bad".into() };
        let (title, message) = err.localized(&strings);
        assert_eq!(title, "Invalid URL");
        assert!(message.contains("ftp:/x"));
    }
}
