//! Fetcher Core Library
//!
//! A resilient HTTP data-retrieval client: plain requests and large-file
//! downloads that survive flaky networks, restricted by a URL policy.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`download`] - URL policy guard, retry executor, resumable downloader
//! - [`auth`] - Cookie jar persisted between runs

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod download;

// Re-export commonly used types
pub use auth::PersistentCookieJar;
pub use download::{
    AttemptOutcome, ClientSettings, DataResult, DownloadError, DownloadStatus, FetchClient,
    FileNameStrategy, PolicyError, RequestSpec, RetryExecutor, RetryPolicy, StreamResult,
    validate_request_url,
};
