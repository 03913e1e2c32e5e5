//! Temp file naming for stream downloads.
//!
//! A download is written to `<temp_dir>/<name>` where the name comes from the
//! caller or from the active [`FileNameStrategy`]. Only URL-derived names are
//! stable across runs, so only they allow an interrupted download to resume.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use rand::Rng;

use super::error::DownloadError;

/// Longest name kept from a URL before truncation.
const MAX_NAME_CHARS: usize = 200;

/// How the temp file of a stream download is named.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FileNameStrategy {
    /// Name derived from the request URL. Stable, so downloads can resume.
    #[default]
    PathGet,
    /// Fresh random name per download. Never resumes.
    Random,
    /// Caller must pass a file name.
    Specify,
}

impl fmt::Display for FileNameStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PathGet => "path-get",
            Self::Random => "random",
            Self::Specify => "specify",
        })
    }
}

impl FromStr for FileNameStrategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "pathget" => Ok(Self::PathGet),
            "random" => Ok(Self::Random),
            "specify" => Ok(Self::Specify),
            other => Err(format!(
                "unknown file name strategy '{other}' (expected path-get, random or specify)"
            )),
        }
    }
}

/// Resolves the temp file path for a download of `url`.
///
/// An explicit non-blank `file_name` wins over every strategy.
///
/// # Errors
///
/// Returns [`DownloadError::FileNameRequired`] for [`FileNameStrategy::Specify`]
/// without a file name.
pub fn resolve_temp_path(
    strategy: FileNameStrategy,
    temp_dir: &Path,
    url: &str,
    file_name: Option<&str>,
) -> Result<PathBuf, DownloadError> {
    if let Some(name) = file_name.map(str::trim).filter(|n| !n.is_empty()) {
        return Ok(temp_dir.join(sanitize_filename(name)));
    }
    match strategy {
        FileNameStrategy::PathGet => Ok(temp_dir.join(safe_file_name_from_url(url))),
        FileNameStrategy::Random => Ok(temp_dir.join(random_file_name())),
        FileNameStrategy::Specify => Err(DownloadError::FileNameRequired {
            url: url.to_string(),
        }),
    }
}

/// Flattens a whole URL into one file name.
///
/// The scheme is dropped, percent escapes are decoded, and separators become
/// `_`, so `https://a.com/x/y.bin?v=2` maps to `a.com_x_y.bin_v=2`.
#[must_use]
pub fn safe_file_name_from_url(url: &str) -> String {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let decoded = urlencoding::decode(without_scheme)
        .map_or_else(|_| without_scheme.to_string(), std::borrow::Cow::into_owned);
    let collapsed = collapse_separators(&sanitize_filename(&decoded));
    let truncated: String = collapsed.chars().take(MAX_NAME_CHARS).collect();
    if truncated.is_empty() {
        "download.bin".to_string()
    } else {
        truncated
    }
}

/// Sanitizes a file name for filesystem safety.
///
/// Replaces `/ \ : * ? " < > |` and control characters with `_`. Names that
/// would still resolve to `.` or `..` get their dots replaced as well.
pub(crate) fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '&' | '#' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }

    if is_safe_filename_segment(&sanitized) {
        sanitized
    } else {
        sanitized
            .chars()
            .map(|c| if c == '.' { '_' } else { c })
            .collect()
    }
}

fn collapse_separators(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev_sep = false;
    for ch in value.chars() {
        if ch == '_' {
            if !prev_sep {
                out.push(ch);
            }
            prev_sep = true;
        } else {
            out.push(ch);
            prev_sep = false;
        }
    }
    out.trim_matches('_').to_string()
}

fn random_file_name() -> String {
    let mut rng = rand::thread_rng();
    let high: u64 = rng.r#gen();
    let low: u64 = rng.r#gen();
    format!("{high:016x}{low:016x}")
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}
