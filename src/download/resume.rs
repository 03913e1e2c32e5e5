//! Chunk arithmetic for resumable downloads.
//!
//! The downloader asks for one chunk at a time with a `Range` header starting
//! at the current temp file length. A chunk is final when the server answers
//! with a full `200` body, or when fewer bytes than requested come back.

use std::path::PathBuf;

use reqwest::StatusCode;

/// Byte offset to resume from, given the length of an existing temp file.
#[must_use]
pub fn resume_offset(existing_len: Option<u64>) -> u64 {
    existing_len.unwrap_or(0)
}

/// Inclusive byte range requested for one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    /// First byte offset.
    pub start: u64,
    /// Number of bytes requested.
    pub len: u64,
}

impl ChunkRange {
    /// A range of `len` bytes starting at `start`. A zero `len` is raised to 1.
    #[must_use]
    pub fn new(start: u64, len: u64) -> Self {
        Self {
            start,
            len: len.max(1),
        }
    }

    /// Last byte offset, inclusive.
    #[must_use]
    pub fn end(&self) -> u64 {
        self.start.saturating_add(self.len - 1)
    }

    /// `Range` header value, e.g. `bytes=0-1023`.
    #[must_use]
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end())
    }
}

/// Progress of one stream download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadState {
    /// Temp file receiving the bytes.
    pub target_path: PathBuf,
    /// Bytes on disk so far.
    pub bytes_written: u64,
    /// True once the whole resource is on disk.
    pub complete: bool,
}

impl DownloadState {
    /// State for `target_path`, starting from whatever is already on disk.
    #[must_use]
    pub fn new(target_path: impl Into<PathBuf>, bytes_written: u64) -> Self {
        Self {
            target_path: target_path.into(),
            bytes_written,
            complete: false,
        }
    }

    /// Range for the next chunk.
    #[must_use]
    pub fn next_range(&self, chunk_size: u64) -> ChunkRange {
        ChunkRange::new(self.bytes_written, chunk_size)
    }
}

/// Decides whether a received chunk ends the download.
///
/// A `200` always carries the whole remaining resource. A `206` is final when
/// it delivered fewer bytes than requested.
#[must_use]
pub fn is_final_chunk(status: StatusCode, read: u64, chunk_size: u64) -> bool {
    status != StatusCode::PARTIAL_CONTENT || read < chunk_size
}

/// Whether a response ignored the `Range` header and restarted from byte 0.
#[must_use]
pub fn restarts_from_zero(status: StatusCode, requested_offset: u64) -> bool {
    requested_offset > 0 && status != StatusCode::PARTIAL_CONTENT
}
