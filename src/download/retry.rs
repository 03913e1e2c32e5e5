//! Bounded retries with linear, capped backoff.
//!
//! [`RetryExecutor::execute`] validates the request once with the URL policy
//! guard, then runs the caller's operation up to `max_retries` times. Each
//! attempt is preceded by a sleep and classified as one of:
//!
//! - success status: counted as good, returned as [`AttemptOutcome::Success`]
//! - failure status or transport error: counted as bad, then either
//!   - matched by the stop predicate: [`AttemptOutcome::TerminalStop`], no more attempts
//!   - otherwise retried with the next, longer delay
//!
//! When every attempt fails the result is [`AttemptOutcome::TransientFailure`]
//! with the last error and the last response seen.
//!
//! # Backoff
//!
//! ```text
//! delay(0) = pre_load_delay
//! delay(i) = pre_load_delay * (min(i, growth_cap_attempt) + 2)   for i >= 1
//! ```
//!
//! With a 100 ms pre-load delay the attempts 1, 2, ..., 8, 9 wait
//! 300 ms, 400 ms, ..., 1000 ms, 1000 ms.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use tokio::time::Instant;
use tracing::{debug, error, info};
use url::Url;

use super::constants::{DEFAULT_GROWTH_CAP_ATTEMPT, DEFAULT_MAX_RETRIES, DEFAULT_PRE_LOAD_DELAY};
use super::error::{DownloadError, ErrorKind};
use super::metrics::{MetricsSink, RequestCounter};
use super::policy::RequestSpec;

/// Classifies an error as terminal: no further attempts are made.
pub type StopPredicate = dyn Fn(&DownloadError) -> bool + Send + Sync;

/// Stop predicate recognising `416 Range Not Satisfiable`.
///
/// During a resumed download this status means the temp file already holds
/// the whole resource.
#[must_use]
pub fn range_not_satisfiable(error: &DownloadError) -> bool {
    error.status() == Some(StatusCode::RANGE_NOT_SATISFIABLE.as_u16())
}

/// Anything the executor can read a status code from.
pub trait ResponseStatus {
    /// The HTTP status of the response.
    fn status_code(&self) -> StatusCode;
}

impl ResponseStatus for reqwest::Response {
    fn status_code(&self) -> StatusCode {
        self.status()
    }
}

/// Retry count and backoff settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the first attempt, and the unit of later delays.
    pre_load_delay: Duration,
    /// Total number of attempts.
    max_retries: u32,
    /// Attempt index after which delays stop growing.
    growth_cap_attempt: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            pre_load_delay: DEFAULT_PRE_LOAD_DELAY,
            max_retries: DEFAULT_MAX_RETRIES,
            growth_cap_attempt: DEFAULT_GROWTH_CAP_ATTEMPT,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with the default growth cap.
    #[must_use]
    pub fn new(pre_load_delay: Duration, max_retries: u32) -> Self {
        Self {
            pre_load_delay,
            max_retries,
            growth_cap_attempt: DEFAULT_GROWTH_CAP_ATTEMPT,
        }
    }

    /// Overrides the attempt index after which delays stop growing.
    #[must_use]
    pub fn with_growth_cap(mut self, growth_cap_attempt: u32) -> Self {
        self.growth_cap_attempt = growth_cap_attempt;
        self
    }

    /// Delay before the first attempt.
    #[must_use]
    pub fn pre_load_delay(&self) -> Duration {
        self.pre_load_delay
    }

    /// Total number of attempts.
    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Attempt index after which delays stop growing.
    #[must_use]
    pub fn growth_cap_attempt(&self) -> u32 {
        self.growth_cap_attempt
    }

    /// Delay slept before attempt `attempt` (0-indexed).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return self.pre_load_delay;
        }
        let factor = attempt.min(self.growth_cap_attempt).saturating_add(2);
        self.pre_load_delay.saturating_mul(factor)
    }
}

/// Result of running an operation under a [`RetryPolicy`].
#[derive(Debug)]
pub enum AttemptOutcome<R> {
    /// An attempt returned a success status.
    Success {
        /// The successful response.
        response: R,
        /// Duration of the successful attempt alone.
        elapsed: Duration,
    },

    /// Every attempt failed.
    TransientFailure {
        /// Error of the last attempt, `None` when no attempt was made.
        error: Option<DownloadError>,
        /// Last response received, if any attempt got one.
        response: Option<R>,
    },

    /// The stop predicate matched an attempt's error.
    TerminalStop {
        /// The error the predicate matched.
        error: DownloadError,
        /// Last response received, if any attempt got one.
        response: Option<R>,
    },
}

impl<R> AttemptOutcome<R> {
    /// True for [`AttemptOutcome::Success`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The response carried by the outcome, if any.
    #[must_use]
    pub fn response(&self) -> Option<&R> {
        match self {
            Self::Success { response, .. } => Some(response),
            Self::TransientFailure { response, .. } | Self::TerminalStop { response, .. } => {
                response.as_ref()
            }
        }
    }

    /// Consumes the outcome and returns its response, if any.
    #[must_use]
    pub fn into_response(self) -> Option<R> {
        match self {
            Self::Success { response, .. } => Some(response),
            Self::TransientFailure { response, .. } | Self::TerminalStop { response, .. } => {
                response
            }
        }
    }

    /// Duration of the successful attempt.
    #[must_use]
    pub fn elapsed(&self) -> Option<Duration> {
        match self {
            Self::Success { elapsed, .. } => Some(*elapsed),
            _ => None,
        }
    }
}

/// Runs request operations under a retry policy and reports to a metrics sink.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    metrics: Arc<dyn MetricsSink>,
}

impl RetryExecutor {
    /// Creates an executor reporting to `metrics`.
    #[must_use]
    pub fn new(policy: RetryPolicy, metrics: Arc<dyn MetricsSink>) -> Self {
        Self { policy, metrics }
    }

    /// The policy in use.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs `operation` until it succeeds, a terminal error is seen, or the
    /// attempts run out.
    ///
    /// `operation` receives the URL resolved by the policy guard.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Policy`] when the guard refuses `spec`. No
    /// attempt is made and no counter changes in that case. A policy error
    /// returned by `operation` itself is not retried either. Every other
    /// failure is reported through the returned [`AttemptOutcome`].
    pub async fn execute<R, F, Fut>(
        &self,
        spec: &RequestSpec,
        mut operation: F,
        stop: Option<&StopPredicate>,
    ) -> Result<AttemptOutcome<R>, DownloadError>
    where
        R: ResponseStatus,
        F: FnMut(Url) -> Fut,
        Fut: Future<Output = Result<R, DownloadError>>,
    {
        let url = spec.validate().map_err(|e| {
            error!(fatal = true, url = %spec.url, error = %e, "request refused by URL policy");
            DownloadError::from(e)
        })?;

        let max_retries = self.policy.max_retries;
        let mut last_response = None;
        let mut last_error = None;

        for attempt in 0..max_retries {
            tokio::time::sleep(self.policy.delay_for_attempt(attempt)).await;
            self.metrics.add(RequestCounter::TotalRequests, 1);
            debug!(url = %url, attempt, "sending request");

            let started = Instant::now();
            let failure = match operation(url.clone()).await {
                Ok(response) if response.status_code().is_success() => {
                    self.metrics.add(RequestCounter::GoodRequests, 1);
                    return Ok(AttemptOutcome::Success {
                        response,
                        elapsed: started.elapsed(),
                    });
                }
                Ok(response) => {
                    let status = response.status_code().as_u16();
                    last_response = Some(response);
                    DownloadError::http_status(url.as_str(), status)
                }
                Err(error) => error,
            };
            let elapsed_ms = started.elapsed().as_millis();
            self.metrics.add(RequestCounter::BadRequests, 1);

            // Raised by the transport when a redirect hop leaves the policy.
            if failure.kind() == ErrorKind::PolicyViolation {
                error!(fatal = true, url = %url, attempt, error = %failure, "redirect refused by URL policy");
                return Err(failure);
            }

            if stop.is_some_and(|is_terminal| is_terminal(&failure)) {
                info!(url = %url, attempt, elapsed_ms, reason = %failure, "stopping retries");
                return Ok(AttemptOutcome::TerminalStop {
                    error: failure,
                    response: last_response,
                });
            }

            if attempt + 1 < max_retries {
                let delay = self.policy.delay_for_attempt(attempt + 1);
                error!(
                    url = %url,
                    attempt,
                    elapsed_ms,
                    retry_in_ms = delay.as_millis(),
                    error = %failure,
                    "request failed, trying again"
                );
            } else {
                error!(url = %url, attempt, elapsed_ms, error = %failure, "request failed, no attempts left");
            }
            last_error = Some(failure);
        }

        Ok(AttemptOutcome::TransientFailure {
            error: last_error,
            response: last_response,
        })
    }
}
