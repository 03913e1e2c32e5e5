//! Typed results returned by [`FetchClient`](super::FetchClient).

use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;

use super::error::DownloadError;

/// Outcome of a `get` or `post`.
///
/// A failed result still carries the status, headers and body of the last
/// response when one was received.
#[derive(Debug)]
pub struct DataResult {
    /// Requested URL as given by the caller.
    pub url: String,
    /// Status of the last response, if any.
    pub status: Option<StatusCode>,
    /// Headers of the last response.
    pub headers: HeaderMap,
    /// Body of the last response.
    pub body: Bytes,
    /// Duration of the successful attempt.
    pub elapsed: Option<Duration>,
    /// Why the request failed, `None` on success.
    pub error: Option<DownloadError>,
}

impl DataResult {
    pub(crate) fn failed(url: &str, error: Option<DownloadError>) -> Self {
        Self {
            url: url.to_string(),
            status: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            elapsed: None,
            error,
        }
    }

    /// True when an attempt returned a success status and the body was read.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.status.is_some_and(|s| s.is_success())
    }

    /// Body decoded as UTF-8, lossily.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Raw body bytes.
    #[must_use]
    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    /// Body parsed as JSON.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error when the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Final state of a stream download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    /// Every chunk was received.
    Complete,
    /// The download finished after picking up bytes already on disk: either
    /// a partial file from an earlier run was completed, or the server
    /// answered `416` because the temp file already held the whole resource.
    ResumedComplete,
    /// Attempts ran out, or the first request was refused with nothing on disk.
    Failed,
    /// The caller cancelled the download. The partial file is kept.
    Cancelled,
}

/// Outcome of a stream download.
#[derive(Debug)]
pub struct StreamResult {
    /// Requested URL as given by the caller.
    pub url: String,
    /// Final state.
    pub status: DownloadStatus,
    /// Where the bytes are: the temp file, or the destination after `download_to`.
    pub path: PathBuf,
    /// Bytes on disk when the download ended.
    pub bytes_written: u64,
    /// Bytes already on disk before the first request.
    pub resumed_from: u64,
    /// Status of the last response, if any.
    pub http_status: Option<StatusCode>,
    /// Wall-clock duration of the whole download.
    pub elapsed: Duration,
    /// Why the download failed, `None` unless `status` is `Failed`.
    pub error: Option<DownloadError>,
}

impl StreamResult {
    /// True for [`DownloadStatus::Complete`] and [`DownloadStatus::ResumedComplete`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(
            self.status,
            DownloadStatus::Complete | DownloadStatus::ResumedComplete
        )
    }

    /// True when the download continued a partial file from an earlier run.
    #[must_use]
    pub fn resumed(&self) -> bool {
        self.resumed_from > 0 || self.status == DownloadStatus::ResumedComplete
    }

    /// File holding the downloaded bytes.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Average rate in MB/s over the whole download.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn throughput_mbps(&self) -> f64 {
        let transferred = self.bytes_written.saturating_sub(self.resumed_from);
        throughput_mbps(transferred, self.elapsed)
    }
}

/// Megabytes per second for `bytes` moved in `elapsed`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn throughput_mbps(bytes: u64, elapsed: Duration) -> f64 {
    bytes as f64 / (elapsed.as_secs_f64() + 0.0001) / 1_000_000.0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn stream(status: DownloadStatus, written: u64, resumed_from: u64) -> StreamResult {
        StreamResult {
            url: "https://a.com/f".to_string(),
            status,
            path: PathBuf::from("tempDownloads/a.com_f"),
            bytes_written: written,
            resumed_from,
            http_status: None,
            elapsed: Duration::from_secs(2),
            error: None,
        }
    }

    #[test]
    fn test_data_result_success_requires_status() {
        let mut result = DataResult::failed("https://a.com", None);
        assert!(!result.is_success());
        result.status = Some(StatusCode::OK);
        assert!(result.is_success());
        result.error = Some(DownloadError::timeout("https://a.com"));
        assert!(!result.is_success());
    }

    #[test]
    fn test_data_result_json_and_text() {
        let mut result = DataResult::failed("https://a.com", None);
        result.body = Bytes::from_static(br#"{"id":7,"name":"x"}"#);
        let value: serde_json::Value = result.json().unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(result.text(), r#"{"id":7,"name":"x"}"#);
        assert_eq!(result.bytes().len(), 19);
    }

    #[test]
    fn test_stream_success_states() {
        assert!(stream(DownloadStatus::Complete, 10, 0).is_success());
        assert!(stream(DownloadStatus::ResumedComplete, 10, 10).is_success());
        assert!(!stream(DownloadStatus::Failed, 10, 0).is_success());
        assert!(!stream(DownloadStatus::Cancelled, 10, 0).is_success());
    }

    #[test]
    fn test_resumed_flag() {
        assert!(!stream(DownloadStatus::Complete, 10, 0).resumed());
        assert!(stream(DownloadStatus::Complete, 10, 4).resumed());
        assert!(stream(DownloadStatus::ResumedComplete, 10, 0).resumed());
    }

    #[test]
    fn test_throughput_counts_only_new_bytes() {
        let result = stream(DownloadStatus::Complete, 5_000_000, 1_000_000);
        let rate = result.throughput_mbps();
        assert!((rate - 2.0).abs() < 0.001, "rate {rate}");
    }

    #[test]
    fn test_throughput_zero_elapsed_is_finite() {
        assert!(throughput_mbps(100, Duration::ZERO).is_finite());
    }
}
