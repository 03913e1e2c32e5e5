//! Error types for the download module.
//!
//! Policy violations and unrecoverable local failures are surfaced to the
//! caller immediately. Transport failures are absorbed by the retry executor
//! and only show up as the last error of a failed outcome.

use std::path::PathBuf;

use thiserror::Error;

use super::settings::ConfigError;

/// Reasons a URL is rejected before any network I/O.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// A relative URL was given while no base site is configured.
    #[error("can't request '{url}': an absolute URL is required")]
    RelativeUrlNotAllowed {
        /// The rejected URL.
        url: String,
    },

    /// Plain `http` was requested while only `https` is allowed.
    #[error("can't request '{url}': only https is allowed")]
    InsecureSchemeRejected {
        /// The rejected URL.
        url: String,
    },

    /// The scheme is neither `http` nor `https`.
    #[error("can't request '{url}': scheme '{scheme}' is not supported, only http and https")]
    UnsupportedScheme {
        /// The rejected URL.
        url: String,
        /// The offending scheme.
        scheme: String,
    },

    /// The URL points outside the configured base site.
    #[error("can't request '{url}': only site '{base_site}' is allowed")]
    SiteScopeViolation {
        /// The rejected URL.
        url: String,
        /// The configured base site.
        base_site: String,
    },

    /// The URL (or the base site) could not be parsed at all.
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The unparseable value.
        url: String,
        /// Parser message.
        reason: String,
    },
}

/// Coarse classification of a [`DownloadError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request was refused by the URL policy guard. Never retried.
    PolicyViolation,
    /// Timeout, connection failure or non-success status. Retried.
    TransientTransport,
    /// Local failure (temp dir, file write, client construction). Never retried.
    Unrecoverable,
}

/// Errors that can occur while fetching or downloading.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The URL policy guard rejected the request.
    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// Network-level error (DNS resolution, connection refused, TLS, broken body stream).
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout requesting {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// The server answered with a non-success status.
    #[error("HTTP {status} requesting {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// File system error (temp dir creation, chunk append, rename).
    #[error("IO error on {path}: {source}")]
    Io {
        /// The path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The `Specify` naming strategy is active but no file name was given.
    #[error("file name must be given for {url} when the naming strategy is 'specify'")]
    FileNameRequired {
        /// The URL being downloaded.
        url: String,
    },

    /// The underlying HTTP client could not be constructed.
    #[error("failed to build HTTP client: {reason}")]
    ClientBuild {
        /// What went wrong.
        reason: String,
    },

    /// The client settings are invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The cookie file could not be written.
    #[error("failed to save cookies to {path}: {reason}")]
    CookieStore {
        /// Cookie file path.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },
}

impl DownloadError {
    /// Creates a network error, promoting reqwest timeouts to [`DownloadError::Timeout`].
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            return Self::Timeout { url: url.into() };
        }
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a client construction error.
    pub fn client_build(reason: impl Into<String>) -> Self {
        Self::ClientBuild {
            reason: reason.into(),
        }
    }

    /// Classifies the error for propagation decisions.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Policy(_) => ErrorKind::PolicyViolation,
            Self::Network { .. } | Self::Timeout { .. } | Self::HttpStatus { .. } => {
                ErrorKind::TransientTransport
            }
            Self::Io { .. }
            | Self::FileNameRequired { .. }
            | Self::ClientBuild { .. }
            | Self::Config(_)
            | Self::CookieStore { .. } => ErrorKind::Unrecoverable,
        }
    }

    /// Returns the HTTP status when the error came from a response.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

// No `From<reqwest::Error>` / `From<std::io::Error>`: every variant needs the
// url or path for context, so the helper constructors are used instead.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_display_contains_status_and_url() {
        let error = DownloadError::http_status("https://example.com/file.bin", 503);
        let msg = error.to_string();
        assert!(msg.contains("503"), "Expected '503' in: {msg}");
        assert!(msg.contains("https://example.com/file.bin"), "Expected URL in: {msg}");
    }

    #[test]
    fn test_policy_error_is_transparent() {
        let error = DownloadError::from(PolicyError::SiteScopeViolation {
            url: "https://b.com/x".to_string(),
            base_site: "https://a.com".to_string(),
        });
        assert_eq!(
            error.to_string(),
            "can't request 'https://b.com/x': only site 'https://a.com' is allowed"
        );
    }

    #[test]
    fn test_kind_classification() {
        let policy = DownloadError::from(PolicyError::RelativeUrlNotAllowed {
            url: "/x".to_string(),
        });
        assert_eq!(policy.kind(), ErrorKind::PolicyViolation);
        assert_eq!(
            DownloadError::timeout("https://a.com").kind(),
            ErrorKind::TransientTransport
        );
        assert_eq!(
            DownloadError::http_status("https://a.com", 500).kind(),
            ErrorKind::TransientTransport
        );
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(
            DownloadError::io("/tmp/x", io).kind(),
            ErrorKind::Unrecoverable
        );
    }

    #[test]
    fn test_status_accessor() {
        assert_eq!(DownloadError::http_status("u", 416).status(), Some(416));
        assert_eq!(DownloadError::timeout("u").status(), None);
    }

    #[test]
    fn test_io_display_contains_path() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let msg = DownloadError::io(PathBuf::from("/tmp/part.bin"), io).to_string();
        assert!(msg.contains("/tmp/part.bin"), "Expected path in: {msg}");
    }
}
