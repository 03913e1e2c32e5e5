//! Client settings.
//!
//! [`ClientSettings`] is a plain struct with defaults. It can also be built
//! from a string map using the camelCase keys of a settings file
//! (`baseUrl`, `downloadTimeout`, `cookiesPath`, `preLoadTimeout`,
//! `retriesCount`, ...). Unknown keys are ignored.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use super::constants::{
    CONNECT_TIMEOUT_SECS, DEFAULT_CHUNK_SIZE, DEFAULT_GROWTH_CAP_ATTEMPT, DEFAULT_MAX_RETRIES,
    DEFAULT_PRE_LOAD_DELAY, DEFAULT_TEMP_DIR, DOWNLOAD_TIMEOUT_SECS,
};
use super::filename::FileNameStrategy;
use super::policy::normalize_site;
use super::retry::RetryPolicy;

/// Invalid settings value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A value could not be parsed.
    #[error("invalid value for `{key}`: '{value}' ({reason})")]
    InvalidValue {
        /// Settings key.
        key: String,
        /// Raw value.
        value: String,
        /// What was expected.
        reason: String,
    },

    /// A value parsed but is outside the accepted range.
    #[error("`{key}` {reason}")]
    OutOfRange {
        /// Settings key.
        key: String,
        /// What was expected.
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &str, value: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    fn out_of_range(key: &str, reason: impl Into<String>) -> Self {
        Self::OutOfRange {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// User name and password pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// User name.
    pub username: String,
    /// Password, never printed.
    pub password: String,
}

impl Credentials {
    /// Creates credentials.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// How HTTP redirects are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RedirectMode {
    /// Follow redirects, checking every hop with the URL policy guard.
    #[default]
    Revalidate,
    /// Follow redirects without checks.
    Follow,
    /// Return redirect responses as they are.
    None,
}

impl FromStr for RedirectMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "revalidate" => Ok(Self::Revalidate),
            "follow" => Ok(Self::Follow),
            "none" => Ok(Self::None),
            other => Err(format!(
                "unknown redirect mode '{other}' (expected revalidate, follow or none)"
            )),
        }
    }
}

/// What `close` does with the temp directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TempDirCleanup {
    /// Leave everything in place.
    Keep,
    /// Remove temp files of completed downloads, keep partial ones.
    #[default]
    ClearCompleted,
    /// Remove the whole temp directory, partial files included.
    ClearAll,
}

impl FromStr for TempDirCleanup {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "keep" => Ok(Self::Keep),
            "clearcompleted" => Ok(Self::ClearCompleted),
            "clearall" => Ok(Self::ClearAll),
            other => Err(format!(
                "unknown temp dir cleanup '{other}' (expected keep, clear-completed or clear-all)"
            )),
        }
    }
}

/// Everything a [`FetchClient`](super::FetchClient) is configured with.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Site every request is scoped to; relative URLs resolve against it.
    pub base_url: Option<String>,
    /// Reject plain `http` when no base site is set. Ignored with a proxy.
    pub only_https: bool,
    /// Delay before the first attempt, and the backoff unit.
    pub pre_load_delay: Duration,
    /// Attempts per request.
    pub max_retries: u32,
    /// Attempt index after which backoff stops growing.
    pub growth_cap_attempt: u32,
    /// Bytes requested per range request.
    pub chunk_size: u64,
    /// Whole-request timeout, body included.
    pub download_timeout: Duration,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// How temp files are named.
    pub file_name_strategy: FileNameStrategy,
    /// Directory receiving partial downloads.
    pub temp_dir: PathBuf,
    /// What `close` removes from `temp_dir`.
    pub temp_dir_cleanup: TempDirCleanup,
    /// JSON cookie file loaded at open and saved at close.
    pub cookies_path: Option<PathBuf>,
    /// Proxy URL for every request.
    pub proxy: Option<String>,
    /// Proxy credentials.
    pub proxy_credentials: Option<Credentials>,
    /// Basic-auth credentials sent to the server.
    pub server_credentials: Option<Credentials>,
    /// Extra trusted root certificate (PEM file).
    pub root_certificate: Option<PathBuf>,
    /// Skip TLS certificate validation.
    pub accept_invalid_certs: bool,
    /// `User-Agent` header.
    pub user_agent: String,
    /// `Content-Type` of `post` bodies.
    pub post_content_type: Option<String>,
    /// Redirect handling.
    pub redirect_mode: RedirectMode,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            only_https: true,
            pre_load_delay: DEFAULT_PRE_LOAD_DELAY,
            max_retries: DEFAULT_MAX_RETRIES,
            growth_cap_attempt: DEFAULT_GROWTH_CAP_ATTEMPT,
            chunk_size: DEFAULT_CHUNK_SIZE,
            download_timeout: Duration::from_secs(DOWNLOAD_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            file_name_strategy: FileNameStrategy::default(),
            temp_dir: PathBuf::from(DEFAULT_TEMP_DIR),
            temp_dir_cleanup: TempDirCleanup::default(),
            cookies_path: None,
            proxy: None,
            proxy_credentials: None,
            server_credentials: None,
            root_certificate: None,
            accept_invalid_certs: false,
            user_agent: default_user_agent(),
            post_content_type: None,
            redirect_mode: RedirectMode::default(),
        }
    }
}

/// `fetcher/<version>`.
#[must_use]
pub fn default_user_agent() -> String {
    format!("fetcher/{}", env!("CARGO_PKG_VERSION"))
}

impl ClientSettings {
    /// Builds settings from a key/value map, starting from the defaults.
    ///
    /// Durations are milliseconds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for unparseable values or failed validation.
    pub fn from_map<S: std::hash::BuildHasher>(
        map: &HashMap<String, String, S>,
    ) -> Result<Self, ConfigError> {
        let mut settings = Self::default();
        for (key, value) in map {
            let raw = value.trim();
            match key.as_str() {
                "baseUrl" => settings.base_url = non_blank(raw),
                "downloadTimeout" => {
                    settings.download_timeout = Duration::from_millis(parse_u64(key, raw)?);
                }
                "cookiesPath" => settings.cookies_path = non_blank(raw).map(PathBuf::from),
                "preLoadTimeout" => {
                    settings.pre_load_delay = Duration::from_millis(parse_u64(key, raw)?);
                }
                "retriesCount" => {
                    settings.max_retries = u32::try_from(parse_u64(key, raw)?)
                        .map_err(|_| ConfigError::out_of_range(key, "must fit in 32 bits"))?;
                }
                "onlyHttps" => settings.only_https = parse_bool(key, raw)?,
                "strategyFileName" => {
                    settings.file_name_strategy =
                        raw.parse().map_err(|e: String| ConfigError::invalid(key, raw, e))?;
                }
                "chunkSize" => settings.chunk_size = parse_u64(key, raw)?,
                "tempDir" => settings.temp_dir = PathBuf::from(raw),
                "tempDirCleanup" => {
                    settings.temp_dir_cleanup =
                        raw.parse().map_err(|e: String| ConfigError::invalid(key, raw, e))?;
                }
                "proxy" => settings.proxy = non_blank(raw),
                "redirectMode" => {
                    settings.redirect_mode =
                        raw.parse().map_err(|e: String| ConfigError::invalid(key, raw, e))?;
                }
                "acceptInvalidCerts" => settings.accept_invalid_certs = parse_bool(key, raw)?,
                "userAgent" => {
                    if let Some(agent) = non_blank(raw) {
                        settings.user_agent = agent;
                    }
                }
                _ => {}
            }
        }
        settings.validate()?;
        Ok(settings)
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a zero chunk size or timeout, an invalid
    /// base URL, or an unparseable proxy URL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::out_of_range("chunkSize", "must be greater than 0"));
        }
        if self.download_timeout.is_zero() {
            return Err(ConfigError::out_of_range(
                "downloadTimeout",
                "must be greater than 0",
            ));
        }
        if let Some(base) = &self.base_url {
            normalize_site(base)
                .map_err(|e| ConfigError::invalid("baseUrl", base, e.to_string()))?;
        }
        if let Some(proxy) = &self.proxy {
            Url::parse(proxy).map_err(|e| ConfigError::invalid("proxy", proxy, e.to_string()))?;
        }
        Ok(())
    }

    /// The https-only flag actually applied: a proxy lifts the restriction.
    #[must_use]
    pub fn effective_only_https(&self) -> bool {
        self.only_https && self.proxy.is_none()
    }

    /// Retry policy derived from these settings.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.pre_load_delay, self.max_retries)
            .with_growth_cap(self.growth_cap_attempt)
    }
}

fn non_blank(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .parse::<u64>()
        .map_err(|e| ConfigError::invalid(key, value, e.to_string()))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ConfigError::invalid(key, value, "expected 'true' or 'false'")),
    }
}
