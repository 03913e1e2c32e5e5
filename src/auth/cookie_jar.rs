//! Cookie jar that can be saved to and restored from a JSON file.
//!
//! `reqwest::cookie::Jar` cannot enumerate its cookies, so this jar records
//! every `Set-Cookie` header it is handed next to the origin URL it came
//! from. Saving writes those records; loading replays them into a fresh jar.
//!
//! File format:
//!
//! ```json
//! {"version":1,"cookies":[{"url":"https://a.com/","set_cookie":"sid=1; Path=/"}]}
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::HeaderValue;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};
use url::Url;

/// Version written to and accepted from cookie files.
pub const COOKIE_FILE_VERSION: u32 = 1;

/// Errors reading or writing a cookie file.
#[derive(Debug, Error)]
pub enum CookieJarError {
    /// The file could not be read or written.
    #[error("cookie file {path}: {source}")]
    Io {
        /// Cookie file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid cookie JSON.
    #[error("cookie file {path} is malformed: {source}")]
    Format {
        /// Cookie file path.
        path: PathBuf,
        /// The JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The file was written by an incompatible version.
    #[error("cookie file {path} has unsupported version {version}")]
    UnsupportedVersion {
        /// Cookie file path.
        path: PathBuf,
        /// Version found in the file.
        version: u32,
    },
}

/// One persisted cookie: the raw `Set-Cookie` value and where it came from.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCookie {
    /// URL of the response that set the cookie.
    pub url: String,
    /// Raw `Set-Cookie` header value.
    pub set_cookie: String,
}

impl StoredCookie {
    /// Cookie name, the text before the first `=`.
    #[must_use]
    pub fn name(&self) -> &str {
        self.set_cookie
            .split(';')
            .next()
            .and_then(|pair| pair.split('=').next())
            .map_or("", str::trim)
    }

    fn host(&self) -> Option<String> {
        Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
    }
}

impl fmt::Debug for StoredCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredCookie")
            .field("url", &self.url)
            .field("name", &self.name())
            .field("set_cookie", &"<redacted>")
            .finish()
    }
}

#[derive(Serialize, Deserialize)]
struct CookieFile {
    version: u32,
    cookies: Vec<StoredCookie>,
}

/// A [`CookieStore`] that remembers what it was given so it can be saved.
#[derive(Debug, Default)]
pub struct PersistentCookieJar {
    jar: Jar,
    records: Mutex<Vec<StoredCookie>>,
}

impl PersistentCookieJar {
    /// Creates an empty jar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a jar from `path`. A missing file gives an empty jar.
    ///
    /// # Errors
    ///
    /// Returns [`CookieJarError`] when the file exists but cannot be read or
    /// parsed.
    #[instrument(level = "debug")]
    pub fn load(path: &Path) -> Result<Self, CookieJarError> {
        let jar = Self::new();
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no cookie file yet, starting empty");
                return Ok(jar);
            }
            Err(source) => {
                return Err(CookieJarError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let file: CookieFile =
            serde_json::from_str(&raw).map_err(|source| CookieJarError::Format {
                path: path.to_path_buf(),
                source,
            })?;
        if file.version != COOKIE_FILE_VERSION {
            return Err(CookieJarError::UnsupportedVersion {
                path: path.to_path_buf(),
                version: file.version,
            });
        }

        for cookie in file.cookies {
            match Url::parse(&cookie.url) {
                Ok(url) => jar.add_cookie_str(&cookie.set_cookie, &url),
                Err(error) => {
                    warn!(url = %cookie.url, name = cookie.name(), %error, "skipping cookie with unparseable origin");
                }
            }
        }
        debug!(cookies = jar.len(), "loaded cookies");
        Ok(jar)
    }

    /// Loads from `path`, falling back to an empty jar with a warning.
    #[must_use]
    pub fn load_or_empty(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|error| {
            warn!(path = %path.display(), %error, "ignoring unreadable cookie file");
            Self::new()
        })
    }

    /// Writes every recorded cookie to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`CookieJarError::Io`] when the file cannot be written.
    #[instrument(level = "debug", skip(self))]
    pub fn save(&self, path: &Path) -> Result<(), CookieJarError> {
        let file = CookieFile {
            version: COOKIE_FILE_VERSION,
            cookies: self.records(),
        };
        let json = serde_json::to_string_pretty(&file).map_err(|source| CookieJarError::Format {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| CookieJarError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, json).map_err(|source| CookieJarError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(cookies = file.cookies.len(), "saved cookies");
        Ok(())
    }

    /// Adds a cookie as if `url` had answered with `Set-Cookie: cookie`.
    pub fn add_cookie_str(&self, cookie: &str, url: &Url) {
        self.record(url, cookie);
        self.jar.add_cookie_str(cookie, url);
    }

    /// Copy of the recorded cookies.
    #[must_use]
    pub fn records(&self) -> Vec<StoredCookie> {
        self.lock_records().clone()
    }

    /// Number of recorded cookies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock_records().len()
    }

    /// True when no cookie has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn record(&self, url: &Url, set_cookie: &str) {
        let cookie = StoredCookie {
            url: url.to_string(),
            set_cookie: set_cookie.to_string(),
        };
        let host = cookie.host();
        let mut records = self.lock_records();
        records.retain(|existing| existing.host() != host || existing.name() != cookie.name());
        records.push(cookie);
    }

    fn lock_records(&self) -> std::sync::MutexGuard<'_, Vec<StoredCookie>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CookieStore for PersistentCookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let headers: Vec<HeaderValue> = cookie_headers.cloned().collect();
        for header in &headers {
            if let Ok(value) = header.to_str() {
                self.record(url, value);
            }
        }
        self.jar.set_cookies(&mut headers.iter(), url);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.jar.cookies(url)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn url(value: &str) -> Url {
        value.parse().unwrap()
    }

    fn cookie_header(jar: &PersistentCookieJar, target: &str) -> Option<String> {
        jar.cookies(&url(target))
            .map(|h| h.to_str().unwrap().to_string())
    }

    #[test]
    fn test_add_cookie_is_sent_back() {
        let jar = PersistentCookieJar::new();
        jar.add_cookie_str("sid=abc; Path=/", &url("https://a.com/login"));
        assert_eq!(cookie_header(&jar, "https://a.com/data").as_deref(), Some("sid=abc"));
        assert!(cookie_header(&jar, "https://b.com/data").is_none());
    }

    #[test]
    fn test_set_cookies_records_headers() {
        let jar = PersistentCookieJar::new();
        let headers = [
            HeaderValue::from_static("a=1; Path=/"),
            HeaderValue::from_static("b=2; Path=/"),
        ];
        jar.set_cookies(&mut headers.iter(), &url("https://a.com/"));
        assert_eq!(jar.len(), 2);
        let sent = cookie_header(&jar, "https://a.com/").unwrap();
        assert!(sent.contains("a=1") && sent.contains("b=2"), "sent: {sent}");
    }

    #[test]
    fn test_newest_cookie_with_same_name_wins() {
        let jar = PersistentCookieJar::new();
        jar.add_cookie_str("sid=old; Path=/", &url("https://a.com/"));
        jar.add_cookie_str("sid=new; Path=/", &url("https://a.com/other"));
        jar.add_cookie_str("sid=elsewhere; Path=/", &url("https://b.com/"));
        let records = jar.records();
        assert_eq!(records.len(), 2);
        assert!(records.iter().any(|c| c.set_cookie.starts_with("sid=new")));
        assert!(!records.iter().any(|c| c.set_cookie.starts_with("sid=old")));
    }

    #[test]
    fn test_save_then_load_restores_cookies() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("cookies.json");

        let jar = PersistentCookieJar::new();
        jar.add_cookie_str("sid=abc; Path=/", &url("https://a.com/"));
        jar.save(&path).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"version\": 1"), "raw: {raw}");

        let restored = PersistentCookieJar::load(&path).unwrap();
        assert_eq!(restored.len(), 1);
        assert_eq!(cookie_header(&restored, "https://a.com/x").as_deref(), Some("sid=abc"));
    }

    #[test]
    fn test_missing_file_gives_empty_jar() {
        let dir = TempDir::new().unwrap();
        let jar = PersistentCookieJar::load(&dir.path().join("absent.json")).unwrap();
        assert!(jar.is_empty());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cookies.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            PersistentCookieJar::load(&path),
            Err(CookieJarError::Format { .. })
        ));
        assert!(PersistentCookieJar::load_or_empty(&path).is_empty());
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cookies.json");
        fs::write(&path, r#"{"version":9,"cookies":[]}"#).unwrap();
        assert!(matches!(
            PersistentCookieJar::load(&path),
            Err(CookieJarError::UnsupportedVersion { version: 9, .. })
        ));
    }

    #[test]
    fn test_debug_redacts_cookie_value() {
        let cookie = StoredCookie {
            url: "https://a.com/".to_string(),
            set_cookie: "sid=topsecret; Path=/".to_string(),
        };
        let printed = format!("{cookie:?}");
        assert!(printed.contains("sid"));
        assert!(!printed.contains("topsecret"));
    }
}
