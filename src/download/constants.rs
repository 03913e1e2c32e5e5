//! Constants for the download module (timeouts, retry defaults, chunking).

use std::time::Duration;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default whole-request timeout (15 minutes, large chunks included).
pub const DOWNLOAD_TIMEOUT_SECS: u64 = 15 * 60;

/// Default delay inserted before every attempt.
pub const DEFAULT_PRE_LOAD_DELAY: Duration = Duration::from_millis(1000);

/// Default number of attempts before giving up.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Attempt index after which the backoff stops growing.
pub const DEFAULT_GROWTH_CAP_ATTEMPT: u32 = 8;

/// Default upper bound for one byte-range chunk (1 GiB).
pub const DEFAULT_CHUNK_SIZE: u64 = 1024 * 1024 * 1024;

/// Default directory for in-progress downloads.
pub const DEFAULT_TEMP_DIR: &str = "tempDownloads";

/// Maximum redirect hops followed under [`RedirectMode::Revalidate`](super::RedirectMode).
pub const MAX_REDIRECTS: usize = 10;
