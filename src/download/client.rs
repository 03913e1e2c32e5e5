//! The fetch client: plain requests and resumable stream downloads.
//!
//! A [`FetchClient`] owns one `reqwest` client, a retry executor and a
//! persistent cookie jar. It is opened from [`ClientSettings`] and closed
//! explicitly (or on drop), which saves cookies and cleans the temp directory.
//!
//! Stream downloads go to `<temp_dir>/<name>` one range request at a time.
//! The temp file is the only resume state: its length is the next offset.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::header::{ACCEPT_ENCODING, CONTENT_TYPE, RANGE};
use reqwest::{Certificate, Client, Proxy, StatusCode, redirect};
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Span, debug, error, info, instrument, warn};
use url::Url;

use super::constants::MAX_REDIRECTS;
use super::error::{DownloadError, PolicyError};
use super::filename::{FileNameStrategy, resolve_temp_path};
use super::metrics::{AtomicRequestCounters, CounterSnapshot, MetricsSink};
use super::policy::{RequestSpec, validate_request_url};
use super::result::{DataResult, DownloadStatus, StreamResult, throughput_mbps};
use super::resume::{
    ChunkRange, DownloadState, is_final_chunk, restarts_from_zero, resume_offset,
};
use super::retry::{AttemptOutcome, RetryExecutor, range_not_satisfiable};
use super::settings::{ClientSettings, RedirectMode, TempDirCleanup};
use super::trace::TraceId;
use crate::auth::PersistentCookieJar;

/// HTTP client with retries, URL policy checks and resumable downloads.
///
/// Share it between tasks behind an `Arc`; every operation takes `&self`.
/// Call [`FetchClient::close`] when done: dropping the client closes it too,
/// but with blocking file I/O on whichever thread runs the drop.
///
/// # Example
///
/// ```no_run
/// use fetcher_core::download::{ClientSettings, FetchClient};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = FetchClient::open(ClientSettings::default())?;
/// let result = client.download("https://example.com/dump.csv", None, None).await?;
/// println!("{} bytes in {}", result.bytes_written, result.path.display());
/// client.close()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FetchClient {
    http: Client,
    settings: ClientSettings,
    executor: RetryExecutor,
    counters: Arc<AtomicRequestCounters>,
    cookie_jar: Arc<PersistentCookieJar>,
    completed: Mutex<HashSet<PathBuf>>,
    closed: AtomicBool,
}

/// How the chunk loop ended.
enum ChunkLoopEnd {
    /// A final chunk was written.
    Complete(StatusCode),
    /// The server answered 416 with bytes already on disk.
    RangeExhausted(Option<StatusCode>),
    /// Attempts ran out, or 416 arrived with nothing on disk.
    Failed {
        status: Option<StatusCode>,
        error: Option<DownloadError>,
    },
}

/// Result of copying one response body into the temp file.
enum BodyRead {
    Done(u64),
    Interrupted { read: u64, error: DownloadError },
}

impl FetchClient {
    /// Opens a client with its own request counters.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Config`] for invalid settings and
    /// [`DownloadError::ClientBuild`] or [`DownloadError::Io`] when the
    /// transport cannot be set up (bad proxy, unreadable certificate).
    pub fn open(settings: ClientSettings) -> Result<Self, DownloadError> {
        Self::open_with_counters(settings, Arc::new(AtomicRequestCounters::new()))
    }

    /// Opens a client reporting to shared `counters`.
    ///
    /// # Errors
    ///
    /// Same as [`FetchClient::open`].
    pub fn open_with_counters(
        settings: ClientSettings,
        counters: Arc<AtomicRequestCounters>,
    ) -> Result<Self, DownloadError> {
        settings.validate()?;

        let cookie_jar = Arc::new(
            settings
                .cookies_path
                .as_deref()
                .map_or_else(PersistentCookieJar::new, PersistentCookieJar::load_or_empty),
        );
        let http = build_http_client(&settings, Arc::clone(&cookie_jar))?;
        let executor = RetryExecutor::new(
            settings.retry_policy(),
            Arc::clone(&counters) as Arc<dyn MetricsSink>,
        );

        debug!(
            base_url = settings.base_url.as_deref().unwrap_or("-"),
            only_https = settings.effective_only_https(),
            max_retries = settings.max_retries,
            temp_dir = %settings.temp_dir.display(),
            "fetch client opened"
        );

        Ok(Self {
            http,
            settings,
            executor,
            counters,
            cookie_jar,
            completed: Mutex::new(HashSet::new()),
            closed: AtomicBool::new(false),
        })
    }

    /// Settings the client was opened with.
    #[must_use]
    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Request counters this client reports to.
    #[must_use]
    pub fn counters(&self) -> &Arc<AtomicRequestCounters> {
        &self.counters
    }

    /// Current counter values.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    /// Cookie jar used by every request.
    #[must_use]
    pub fn cookie_jar(&self) -> &Arc<PersistentCookieJar> {
        &self.cookie_jar
    }

    /// Sends a `GET` with retries and reads the whole body.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Policy`] when the URL is refused. Transport
    /// failures are reported through [`DataResult::error`].
    #[instrument(skip(self, trace_id), fields(trace_id = tracing::field::Empty))]
    pub async fn get(&self, url: &str, trace_id: Option<&str>) -> Result<DataResult, DownloadError> {
        record_trace_id(trace_id);
        self.fetch(self.scoped(RequestSpec::get(url))).await
    }

    /// Sends a `POST` with retries and reads the whole body.
    ///
    /// The configured `post_content_type` is applied to every attempt.
    ///
    /// # Errors
    ///
    /// Same as [`FetchClient::get`].
    #[instrument(skip(self, body, trace_id), fields(trace_id = tracing::field::Empty, body_len = body.len()))]
    pub async fn post(
        &self,
        url: &str,
        body: Vec<u8>,
        trace_id: Option<&str>,
    ) -> Result<DataResult, DownloadError> {
        record_trace_id(trace_id);
        self.fetch(self.scoped(RequestSpec::post(url, body))).await
    }

    /// Downloads `url` into the temp directory, resuming a partial file.
    ///
    /// `file_name` overrides the naming strategy.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Policy`] for refused URLs,
    /// [`DownloadError::FileNameRequired`] when the strategy needs a name, and
    /// [`DownloadError::Io`] when the temp file cannot be written. Transport
    /// failures end in a [`DownloadStatus::Failed`] result.
    pub async fn download(
        &self,
        url: &str,
        file_name: Option<&str>,
        trace_id: Option<&str>,
    ) -> Result<StreamResult, DownloadError> {
        self.download_with_cancel(url, file_name, trace_id, &CancellationToken::new())
            .await
    }

    /// [`FetchClient::download`] that stops when `cancel` fires.
    ///
    /// Cancelling aborts the in-flight request or backoff sleep. The partial
    /// temp file stays on disk and a later call resumes from it.
    ///
    /// # Errors
    ///
    /// Same as [`FetchClient::download`].
    #[instrument(skip(self, trace_id, cancel), fields(trace_id = tracing::field::Empty))]
    pub async fn download_with_cancel(
        &self,
        url: &str,
        file_name: Option<&str>,
        trace_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<StreamResult, DownloadError> {
        record_trace_id(trace_id);
        let spec = self.scoped(RequestSpec::get(url));
        spec.validate().map_err(|e| {
            error!(fatal = true, error = %e, "request refused by URL policy");
            DownloadError::from(e)
        })?;

        let path = resolve_temp_path(
            self.settings.file_name_strategy,
            &self.settings.temp_dir,
            url,
            file_name,
        )?;
        tokio::fs::create_dir_all(&self.settings.temp_dir)
            .await
            .map_err(|e| {
                error!(fatal = true, dir = %self.settings.temp_dir.display(), error = %e, "cannot create temp directory");
                DownloadError::io(self.settings.temp_dir.clone(), e)
            })?;

        let started = Instant::now();
        let resumed_from = resume_offset(existing_len(&path).await);
        let mut state = DownloadState::new(&path, resumed_from);
        info!(path = %path.display(), resume_offset = resumed_from, "download started");

        let loop_end = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            end = self.download_chunks(&spec, &mut state) => Some(end?),
        };

        let mut result = StreamResult {
            url: url.to_string(),
            status: DownloadStatus::Failed,
            path,
            bytes_written: state.bytes_written,
            resumed_from,
            http_status: None,
            elapsed: started.elapsed(),
            error: None,
        };

        match loop_end {
            None => {
                result.status = DownloadStatus::Cancelled;
                result.bytes_written = existing_len(&result.path).await.unwrap_or(0);
                info!(bytes = result.bytes_written, "download cancelled, partial file kept");
                return Ok(result);
            }
            Some(ChunkLoopEnd::Complete(status)) => {
                result.http_status = Some(status);
                result.status = if resumed_from > 0 {
                    DownloadStatus::ResumedComplete
                } else {
                    DownloadStatus::Complete
                };
            }
            Some(ChunkLoopEnd::RangeExhausted(status)) => {
                result.http_status = status;
                result.status = DownloadStatus::ResumedComplete;
            }
            Some(ChunkLoopEnd::Failed { status, error }) => {
                result.http_status = status;
                error!(
                    status = status.map(|s| s.as_u16()),
                    bytes = result.bytes_written,
                    error = %failure_reason(error.as_ref()),
                    "download failed, partial file kept"
                );
                result.error = error;
                return Ok(result);
            }
        }

        if state.complete {
            self.completed
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(result.path.clone());
        }
        let rate = throughput_mbps(
            result.bytes_written.saturating_sub(resumed_from),
            result.elapsed,
        );
        info!(
            status = result.http_status.map(|s| s.as_u16()),
            bytes = result.bytes_written,
            elapsed_ms = result.elapsed.as_millis(),
            rate_mbps = %format_args!("{rate:.2}"),
            resumed = result.resumed(),
            "download complete"
        );
        Ok(result)
    }

    /// Downloads `url` and moves the finished file to `destination`.
    ///
    /// With the `Specify` naming strategy the destination's file name is used
    /// as the temp name. A failed download leaves the temp file in place.
    ///
    /// # Errors
    ///
    /// Same as [`FetchClient::download`], plus [`DownloadError::Io`] when the
    /// file cannot be moved.
    pub async fn download_to(
        &self,
        url: &str,
        destination: &Path,
        trace_id: Option<&str>,
    ) -> Result<StreamResult, DownloadError> {
        self.download_to_with_cancel(url, destination, trace_id, &CancellationToken::new())
            .await
    }

    /// [`FetchClient::download_to`] that stops when `cancel` fires.
    ///
    /// # Errors
    ///
    /// Same as [`FetchClient::download_to`].
    pub async fn download_to_with_cancel(
        &self,
        url: &str,
        destination: &Path,
        trace_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<StreamResult, DownloadError> {
        let trace = TraceId::from_option(trace_id);
        let name = (self.settings.file_name_strategy == FileNameStrategy::Specify)
            .then(|| destination.file_name().and_then(|n| n.to_str()))
            .flatten();

        let mut result = self
            .download_with_cancel(url, name, Some(trace.as_str()), cancel)
            .await?;
        if !result.is_success() {
            return Ok(result);
        }

        move_file(&result.path, destination).await?;
        self.completed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&result.path);
        info!(trace_id = %trace, from = %result.path.display(), to = %destination.display(), "download moved to destination");
        result.path = destination.to_path_buf();
        Ok(result)
    }

    /// Saves cookies and cleans the temp directory. Later calls do nothing.
    ///
    /// Uses blocking file I/O. In async code call it from the task that is
    /// done with the client rather than relying on `Drop`, or move the last
    /// reference into `tokio::task::spawn_blocking`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::CookieStore`] when the cookie file cannot be
    /// written, or [`DownloadError::Io`] when cleanup fails. Cleanup still
    /// runs when saving cookies failed.
    pub fn close(&self) -> Result<(), DownloadError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let saved = match &self.settings.cookies_path {
            Some(path) => self
                .cookie_jar
                .save(path)
                .map_err(|e| DownloadError::CookieStore {
                    path: path.clone(),
                    reason: e.to_string(),
                }),
            None => Ok(()),
        };
        let cleaned = self.clean_temp_dir();
        debug!(
            cleanup = ?self.settings.temp_dir_cleanup,
            counters = %self.counters.snapshot(),
            "fetch client closed"
        );
        saved.and(cleaned)
    }

    fn clean_temp_dir(&self) -> Result<(), DownloadError> {
        let dir = &self.settings.temp_dir;
        match self.settings.temp_dir_cleanup {
            TempDirCleanup::Keep => Ok(()),
            TempDirCleanup::ClearAll => match fs::remove_dir_all(dir) {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                    Err(DownloadError::io(dir.clone(), e))
                }
                _ => Ok(()),
            },
            TempDirCleanup::ClearCompleted => {
                let completed: Vec<PathBuf> = self
                    .completed
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .drain()
                    .collect();
                for path in completed {
                    match fs::remove_file(&path) {
                        Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                            return Err(DownloadError::io(path, e));
                        }
                        _ => {}
                    }
                }
                // Fails while partial files remain.
                let _ = fs::remove_dir(dir);
                Ok(())
            }
        }
    }

    fn scoped(&self, spec: RequestSpec) -> RequestSpec {
        spec.with_base_site(self.settings.base_url.clone())
            .with_only_https(self.settings.effective_only_https())
    }

    async fn fetch(&self, spec: RequestSpec) -> Result<DataResult, DownloadError> {
        info!(method = %spec.method, url = %spec.url, "request started");
        let client = self;
        let request = &spec;
        let outcome = self
            .executor
            .execute(request, move |url| client.send(request, url, None), None)
            .await?;

        let (error, response) = match outcome {
            AttemptOutcome::Success { response, elapsed } => {
                let status = response.status();
                let headers = response.headers().clone();
                return Ok(match response.bytes().await {
                    Ok(body) => {
                        info!(
                            status = status.as_u16(),
                            bytes = body.len(),
                            elapsed_ms = elapsed.as_millis(),
                            "request succeeded"
                        );
                        DataResult {
                            url: spec.url.clone(),
                            status: Some(status),
                            headers,
                            body,
                            elapsed: Some(elapsed),
                            error: None,
                        }
                    }
                    Err(e) => {
                        let error = DownloadError::network(spec.url.as_str(), e);
                        error!(status = status.as_u16(), error = %error, "response body could not be read");
                        DataResult {
                            status: Some(status),
                            headers,
                            ..DataResult::failed(&spec.url, Some(error))
                        }
                    }
                });
            }
            AttemptOutcome::TransientFailure { error, response } => (error, response),
            AttemptOutcome::TerminalStop { error, response } => (Some(error), response),
        };

        let mut result = DataResult::failed(&spec.url, error);
        if let Some(response) = response {
            result.status = Some(response.status());
            result.headers = response.headers().clone();
            result.body = match response.bytes().await {
                Ok(body) => body,
                Err(e) => {
                    warn!(error = %e, "body of failed response could not be read");
                    Bytes::new()
                }
            };
        }
        error!(
            status = result.status.map(|s| s.as_u16()),
            error = %failure_reason(result.error.as_ref()),
            "request failed"
        );
        Ok(result)
    }

    /// Requests successive ranges until a final chunk, a 416, or failure.
    async fn download_chunks(
        &self,
        spec: &RequestSpec,
        state: &mut DownloadState,
    ) -> Result<ChunkLoopEnd, DownloadError> {
        let chunk_size = self.settings.chunk_size;
        let max_stream_failures = self.settings.max_retries.max(1);
        let mut stream_failures = 0;

        loop {
            let offset = resume_offset(existing_len(&state.target_path).await);
            state.bytes_written = offset;
            let range = state.next_range(chunk_size);
            debug!(range = %range.header_value(), "requesting chunk");

            let client = self;
            let outcome = self
                .executor
                .execute(
                    spec,
                    move |url| client.send(spec, url, Some(range)),
                    Some(&range_not_satisfiable),
                )
                .await?;

            match outcome {
                AttemptOutcome::Success { response, elapsed } => {
                    let status = response.status();
                    let restart = restarts_from_zero(status, offset);
                    if restart {
                        warn!(offset, status = status.as_u16(), "server ignored the range, rewriting from the start");
                    }
                    let limit = (status == StatusCode::PARTIAL_CONTENT).then_some(chunk_size);
                    match append_body(&state.target_path, response, restart, limit).await? {
                        BodyRead::Done(read) => {
                            state.bytes_written = if restart { read } else { offset + read };
                            debug!(
                                status = status.as_u16(),
                                read,
                                total = state.bytes_written,
                                elapsed_ms = elapsed.as_millis(),
                                "chunk written"
                            );
                            if is_final_chunk(status, read, chunk_size) {
                                state.complete = true;
                                return Ok(ChunkLoopEnd::Complete(status));
                            }
                        }
                        BodyRead::Interrupted { read, error } => {
                            stream_failures += 1;
                            state.bytes_written = if restart { read } else { offset + read };
                            if stream_failures >= max_stream_failures {
                                return Ok(ChunkLoopEnd::Failed {
                                    status: Some(status),
                                    error: Some(error),
                                });
                            }
                            warn!(
                                read,
                                total = state.bytes_written,
                                error = %error,
                                "body stream interrupted, resuming from file length"
                            );
                        }
                    }
                }
                AttemptOutcome::TerminalStop { error, response } => {
                    let status = response.map(|r| r.status());
                    if offset > 0 {
                        info!(bytes = offset, "range not satisfiable, file already complete");
                        state.complete = true;
                        return Ok(ChunkLoopEnd::RangeExhausted(status));
                    }
                    return Ok(ChunkLoopEnd::Failed {
                        status,
                        error: Some(error),
                    });
                }
                AttemptOutcome::TransientFailure { error, response } => {
                    return Ok(ChunkLoopEnd::Failed {
                        status: response.map(|r| r.status()),
                        error,
                    });
                }
            }
        }
    }

    async fn send(
        &self,
        spec: &RequestSpec,
        url: Url,
        range: Option<ChunkRange>,
    ) -> Result<reqwest::Response, DownloadError> {
        let target = url.to_string();
        let mut request = self.http.request(spec.method.clone(), url);
        if let Some(body) = &spec.body {
            request = request.body(body.clone());
            if let Some(content_type) = &self.settings.post_content_type {
                request = request.header(CONTENT_TYPE, content_type);
            }
        }
        if let Some(range) = range {
            // Byte offsets must refer to the stored representation.
            request = request
                .header(RANGE, range.header_value())
                .header(ACCEPT_ENCODING, "identity");
        }
        if let Some(credentials) = &self.settings.server_credentials {
            request = request.basic_auth(&credentials.username, Some(&credentials.password));
        }
        request
            .send()
            .await
            .map_err(|e| map_send_error(&target, e))
    }
}

/// Closes the client if [`FetchClient::close`] was not called. The cleanup
/// blocks the current thread, which stalls a runtime worker when the last
/// reference is dropped inside a tokio task.
impl Drop for FetchClient {
    fn drop(&mut self) {
        if let Err(error) = self.close() {
            warn!(%error, "failed to close fetch client cleanly");
        }
    }
}

fn failure_reason(error: Option<&DownloadError>) -> String {
    error.map_or_else(|| "no attempt was made".to_string(), ToString::to_string)
}

fn record_trace_id(trace_id: Option<&str>) {
    let trace = TraceId::from_option(trace_id);
    Span::current().record("trace_id", trace.as_str());
}

async fn existing_len(path: &Path) -> Option<u64> {
    tokio::fs::metadata(path)
        .await
        .ok()
        .filter(std::fs::Metadata::is_file)
        .map(|meta| meta.len())
}

/// Streams `response` into `path`, appending unless `truncate` is set.
///
/// With a `limit`, at most that many bytes are taken from the body.
async fn append_body(
    path: &Path,
    response: reqwest::Response,
    truncate: bool,
    limit: Option<u64>,
) -> Result<BodyRead, DownloadError> {
    let url = response.url().to_string();
    let mut options = OpenOptions::new();
    options.create(true);
    if truncate {
        options.write(true).truncate(true);
    } else {
        options.append(true);
    }
    let file = options.open(path).await.map_err(|e| {
        error!(fatal = true, path = %path.display(), error = %e, "cannot open temp file");
        DownloadError::io(path, e)
    })?;

    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut read: u64 = 0;
    let mut interrupted = None;

    while let Some(next) = stream.next().await {
        let chunk = match next {
            Ok(chunk) => chunk,
            Err(e) => {
                interrupted = Some(DownloadError::network(url.as_str(), e));
                break;
            }
        };
        let take = match limit {
            Some(limit) => usize::try_from(limit - read)
                .unwrap_or(usize::MAX)
                .min(chunk.len()),
            None => chunk.len(),
        };
        writer
            .write_all(&chunk[..take])
            .await
            .map_err(|e| DownloadError::io(path, e))?;
        read += take as u64;
        if limit.is_some_and(|limit| read >= limit) {
            break;
        }
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(path, e))?;

    Ok(match interrupted {
        Some(error) => BodyRead::Interrupted { read, error },
        None => BodyRead::Done(read),
    })
}

/// Renames `from` to `to`, copying when a rename is not possible.
async fn move_file(from: &Path, to: &Path) -> Result<(), DownloadError> {
    if let Some(parent) = to.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| DownloadError::io(parent, e))?;
    }
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    debug!(from = %from.display(), to = %to.display(), "rename failed, copying instead");
    tokio::fs::copy(from, to)
        .await
        .map_err(|e| DownloadError::io(to, e))?;
    tokio::fs::remove_file(from)
        .await
        .map_err(|e| DownloadError::io(from, e))
}

fn map_send_error(url: &str, error: reqwest::Error) -> DownloadError {
    if error.is_redirect() {
        let mut source = std::error::Error::source(&error);
        while let Some(inner) = source {
            if let Some(policy) = inner.downcast_ref::<PolicyError>() {
                return DownloadError::Policy(policy.clone());
            }
            source = inner.source();
        }
    }
    DownloadError::network(url, error)
}

fn build_http_client(
    settings: &ClientSettings,
    cookie_jar: Arc<PersistentCookieJar>,
) -> Result<Client, DownloadError> {
    let mut builder = Client::builder()
        .connect_timeout(settings.connect_timeout)
        .timeout(settings.download_timeout)
        .gzip(true)
        .user_agent(settings.user_agent.clone())
        .cookie_provider(cookie_jar)
        .redirect(redirect_policy(settings));

    if let Some(proxy_url) = &settings.proxy {
        let mut proxy = Proxy::all(proxy_url)
            .map_err(|e| DownloadError::client_build(format!("invalid proxy '{proxy_url}': {e}")))?;
        if let Some(credentials) = &settings.proxy_credentials {
            proxy = proxy.basic_auth(&credentials.username, &credentials.password);
        }
        builder = builder.proxy(proxy);
    }

    if let Some(cert_path) = &settings.root_certificate {
        let pem = fs::read(cert_path).map_err(|e| DownloadError::io(cert_path, e))?;
        let certificate = Certificate::from_pem(&pem).map_err(|e| {
            DownloadError::client_build(format!(
                "invalid certificate '{}': {e}",
                cert_path.display()
            ))
        })?;
        builder = builder.add_root_certificate(certificate);
    }

    if settings.accept_invalid_certs {
        warn!("TLS certificate validation is disabled");
        builder = builder.danger_accept_invalid_certs(true);
    }

    builder
        .build()
        .map_err(|e| DownloadError::client_build(e.to_string()))
}

fn redirect_policy(settings: &ClientSettings) -> redirect::Policy {
    match settings.redirect_mode {
        RedirectMode::None => redirect::Policy::none(),
        RedirectMode::Follow => redirect::Policy::limited(MAX_REDIRECTS),
        RedirectMode::Revalidate => {
            let base_site = settings.base_url.clone();
            let only_https = settings.effective_only_https();
            redirect::Policy::custom(move |attempt| {
                if attempt.previous().len() >= MAX_REDIRECTS {
                    return attempt.error(format!("more than {MAX_REDIRECTS} redirects"));
                }
                match validate_request_url(attempt.url().as_str(), base_site.as_deref(), only_https)
                {
                    Ok(_) => attempt.follow(),
                    Err(e) => {
                        warn!(to = %attempt.url(), error = %e, "redirect refused by URL policy");
                        attempt.error(e)
                    }
                }
            })
        }
    }
}
