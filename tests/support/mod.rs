//! Shared helpers for integration tests.

#![allow(dead_code)]

pub mod range_server;
pub mod raw_server;
pub mod socket_guard;

use std::path::Path;
use std::time::Duration;

use fetcher_core::download::{ClientSettings, TempDirCleanup};

/// Settings for talking to a local mock server: plain http, no backoff,
/// small chunks, temp files under `temp_dir`.
pub fn local_settings(temp_dir: &Path, chunk_size: u64) -> ClientSettings {
    ClientSettings {
        only_https: false,
        pre_load_delay: Duration::ZERO,
        max_retries: 3,
        chunk_size,
        download_timeout: Duration::from_secs(10),
        temp_dir: temp_dir.to_path_buf(),
        temp_dir_cleanup: TempDirCleanup::Keep,
        ..ClientSettings::default()
    }
}

/// Deterministic payload of `len` bytes.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
