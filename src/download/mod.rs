//! Resilient HTTP fetching and resumable downloads.
//!
//! Request flow:
//!
//! 1. [`policy`] checks the URL against the scheme rules and base site
//! 2. [`retry`] runs the request with bounded, linearly growing backoff
//! 3. for stream downloads, [`FetchClient`] asks for one byte range at a time
//!    and appends each chunk to a temp file that doubles as resume state
//!
//! # Features
//!
//! - URL policy guard, re-applied to every redirect hop by default
//! - Request counters shared across tasks ([`AtomicRequestCounters`])
//! - Temp file naming strategies ([`FileNameStrategy`])
//! - `416 Range Not Satisfiable` treated as "already complete" on resume
//! - Cookie persistence and temp dir cleanup on [`FetchClient::close`]
//!
//! # Example
//!
//! ```no_run
//! use fetcher_core::download::{ClientSettings, FetchClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = FetchClient::open(ClientSettings {
//!     base_url: Some("https://data.example.com".to_string()),
//!     ..ClientSettings::default()
//! })?;
//! let page = client.get("/api/items?page=1", None).await?;
//! if page.is_success() {
//!     println!("{}", page.text());
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod constants;
mod error;
mod filename;
mod metrics;
pub mod policy;
mod result;
pub mod resume;
pub mod retry;
mod settings;
mod trace;

pub use client::FetchClient;
pub use constants::{
    CONNECT_TIMEOUT_SECS, DEFAULT_CHUNK_SIZE, DEFAULT_GROWTH_CAP_ATTEMPT, DEFAULT_MAX_RETRIES,
    DEFAULT_PRE_LOAD_DELAY, DEFAULT_TEMP_DIR, DOWNLOAD_TIMEOUT_SECS, MAX_REDIRECTS,
};
pub use error::{DownloadError, ErrorKind, PolicyError};
pub use filename::{FileNameStrategy, resolve_temp_path, safe_file_name_from_url};
pub use metrics::{AtomicRequestCounters, CounterSnapshot, MetricsSink, RequestCounter};
pub use policy::{RequestSpec, normalize_site, validate_request_url};
pub use result::{DataResult, DownloadStatus, StreamResult, throughput_mbps};
pub use resume::{ChunkRange, DownloadState, is_final_chunk, resume_offset};
pub use retry::{
    AttemptOutcome, ResponseStatus, RetryExecutor, RetryPolicy, StopPredicate,
    range_not_satisfiable,
};
pub use settings::{ClientSettings, ConfigError, Credentials, RedirectMode, TempDirCleanup};
pub use trace::TraceId;
