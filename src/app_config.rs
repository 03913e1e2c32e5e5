//! Config file loading for CLI defaults.
//!
//! The file is a flat list of `key = value` lines; strings are double-quoted,
//! `#` starts a comment. Values here are overridden by command-line flags.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use fetcher_core::download::{ClientSettings, FileNameStrategy, RedirectMode, TempDirCleanup};

/// Client defaults read from the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Site every request is scoped to.
    pub base_url: Option<String>,
    /// Reject plain http when no base site is set.
    pub only_https: Option<bool>,
    /// Attempts per request.
    pub max_retries: Option<u32>,
    /// Delay before the first attempt, in milliseconds.
    pub pre_load_delay_ms: Option<u64>,
    /// Bytes per range request.
    pub chunk_size: Option<u64>,
    /// Whole-request timeout in seconds.
    pub download_timeout_secs: Option<u64>,
    /// Connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// Directory for partial downloads.
    pub temp_dir: Option<PathBuf>,
    /// Cookie file.
    pub cookies_path: Option<PathBuf>,
    /// Proxy URL.
    pub proxy: Option<String>,
    /// Temp file naming strategy.
    pub file_name_strategy: Option<FileNameStrategy>,
    /// Redirect handling.
    pub redirect_mode: Option<RedirectMode>,
    /// Temp dir cleanup on exit.
    pub temp_dir_cleanup: Option<TempDirCleanup>,
    /// `User-Agent` header.
    pub user_agent: Option<String>,
}

impl FileConfig {
    /// Validates config values against runtime constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(max_retries) = self.max_retries
            && max_retries > 100
        {
            bail!("Invalid config value for `max_retries`: {max_retries}. Expected range: 0..=100");
        }
        if let Some(delay) = self.pre_load_delay_ms
            && delay > 600_000
        {
            bail!("Invalid config value for `pre_load_delay_ms`: {delay}. Expected range: 0..=600000");
        }
        if self.chunk_size == Some(0) {
            bail!("Invalid config value for `chunk_size`: 0. Expected a positive byte count");
        }
        validate_timeout_secs("download_timeout_secs", self.download_timeout_secs, 86_400)?;
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs, 3600)?;
        Ok(())
    }

    /// Copies every value present in the file onto `settings`.
    pub fn apply_to(&self, settings: &mut ClientSettings) {
        if let Some(base_url) = &self.base_url {
            settings.base_url = Some(base_url.clone());
        }
        if let Some(only_https) = self.only_https {
            settings.only_https = only_https;
        }
        if let Some(max_retries) = self.max_retries {
            settings.max_retries = max_retries;
        }
        if let Some(delay) = self.pre_load_delay_ms {
            settings.pre_load_delay = Duration::from_millis(delay);
        }
        if let Some(chunk_size) = self.chunk_size {
            settings.chunk_size = chunk_size;
        }
        if let Some(secs) = self.download_timeout_secs {
            settings.download_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.connect_timeout_secs {
            settings.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(temp_dir) = &self.temp_dir {
            settings.temp_dir.clone_from(temp_dir);
        }
        if let Some(cookies_path) = &self.cookies_path {
            settings.cookies_path = Some(cookies_path.clone());
        }
        if let Some(proxy) = &self.proxy {
            settings.proxy = Some(proxy.clone());
        }
        if let Some(strategy) = self.file_name_strategy {
            settings.file_name_strategy = strategy;
        }
        if let Some(mode) = self.redirect_mode {
            settings.redirect_mode = mode;
        }
        if let Some(cleanup) = self.temp_dir_cleanup {
            settings.temp_dir_cleanup = cleanup;
        }
        if let Some(user_agent) = &self.user_agent {
            settings.user_agent.clone_from(user_agent);
        }
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>, max: u64) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=max).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..={max}");
    }
    Ok(())
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/fetcher/config.toml`
/// 2. `$HOME/.config/fetcher/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("fetcher")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("fetcher")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the config file.
///
/// An explicit path must exist. The default path is optional: when it is
/// missing, `None` is returned.
pub fn load_config(explicit: Option<&Path>) -> Result<Option<FileConfig>> {
    if let Some(path) = explicit {
        return load_file_config(path).map(Some);
    }
    match resolve_default_config_path() {
        Some(path) if path.exists() => load_file_config(&path).map(Some),
        _ => Ok(None),
    }
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!(
                "Invalid config syntax on line {}: expected key = value",
                line_index + 1
            );
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let line_no = line_index + 1;
        let context = || format!("Invalid `{key}` value on line {line_no}");

        match key {
            "base_url" => cfg.base_url = Some(parse_string_literal(value).with_context(context)?),
            "only_https" => cfg.only_https = Some(parse_boolean(value).with_context(context)?),
            "max_retries" => {
                let parsed = parse_integer_u64(value).with_context(context)?;
                let n = u32::try_from(parsed)
                    .map_err(|_| anyhow::anyhow!("max_retries out of range for u32"))?;
                cfg.max_retries = Some(n);
            }
            "pre_load_delay_ms" => {
                cfg.pre_load_delay_ms = Some(parse_integer_u64(value).with_context(context)?);
            }
            "chunk_size" => cfg.chunk_size = Some(parse_integer_u64(value).with_context(context)?),
            "download_timeout_secs" => {
                cfg.download_timeout_secs = Some(parse_integer_u64(value).with_context(context)?);
            }
            "connect_timeout_secs" => {
                cfg.connect_timeout_secs = Some(parse_integer_u64(value).with_context(context)?);
            }
            "temp_dir" => {
                cfg.temp_dir = Some(PathBuf::from(
                    parse_string_literal(value).with_context(context)?,
                ));
            }
            "cookies_path" => {
                cfg.cookies_path = Some(PathBuf::from(
                    parse_string_literal(value).with_context(context)?,
                ));
            }
            "proxy" => cfg.proxy = Some(parse_string_literal(value).with_context(context)?),
            "file_name_strategy" => {
                let parsed = parse_string_literal(value).with_context(context)?;
                cfg.file_name_strategy =
                    Some(parsed.parse().map_err(anyhow::Error::msg).with_context(context)?);
            }
            "redirect_mode" => {
                let parsed = parse_string_literal(value).with_context(context)?;
                cfg.redirect_mode =
                    Some(parsed.parse().map_err(anyhow::Error::msg).with_context(context)?);
            }
            "temp_dir_cleanup" => {
                let parsed = parse_string_literal(value).with_context(context)?;
                cfg.temp_dir_cleanup =
                    Some(parsed.parse().map_err(anyhow::Error::msg).with_context(context)?);
            }
            "user_agent" => {
                cfg.user_agent = Some(parse_string_literal(value).with_context(context)?);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim().replace('_', "");
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_boolean(raw_value: &str) -> Result<bool> {
    match raw_value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => bail!("Expected 'true' or 'false'"),
    }
}
