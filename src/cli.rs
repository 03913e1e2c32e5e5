//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use fetcher_core::download::{ClientSettings, FileNameStrategy, RedirectMode, TempDirCleanup};

/// Fetch pages and download large files over unreliable networks.
///
/// Requests are retried with growing backoff, downloads resume from partial
/// temp files, and every URL is checked against the https/base-site policy.
#[derive(Parser, Debug)]
#[command(name = "fetcher")]
#[command(author, version, about)]
pub struct Cli {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: $XDG_CONFIG_HOME/fetcher/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Client options shared by every command
    #[command(flatten)]
    pub client: ClientArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Flags mapped onto [`ClientSettings`].
#[derive(Args, Debug, Default, Clone)]
pub struct ClientArgs {
    /// Only allow requests to this site; relative URLs resolve against it
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Accept plain http URLs when no base site is set
    #[arg(long, global = true)]
    pub allow_http: bool,

    /// Attempts per request (0-100)
    #[arg(short = 'r', long, global = true, value_parser = clap::value_parser!(u32).range(0..=100))]
    pub max_retries: Option<u32>,

    /// Delay before each request in milliseconds; later retries wait multiples of it
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(0..=600_000))]
    pub pre_load_delay: Option<u64>,

    /// Bytes per range request when downloading
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    pub chunk_size: Option<u64>,

    /// Whole-request timeout in seconds
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..=86_400))]
    pub timeout: Option<u64>,

    /// Directory for partial downloads
    #[arg(long, global = true)]
    pub temp_dir: Option<PathBuf>,

    /// JSON cookie file loaded at start and saved at exit
    #[arg(long, global = true)]
    pub cookies: Option<PathBuf>,

    /// Proxy URL for every request
    #[arg(long, global = true)]
    pub proxy: Option<String>,

    /// Temp file naming: path-get, random or specify
    #[arg(long, global = true)]
    pub strategy: Option<FileNameStrategy>,

    /// Redirect handling: revalidate, follow or none
    #[arg(long, global = true)]
    pub redirect: Option<RedirectMode>,

    /// Temp dir cleanup at exit: keep, clear-completed or clear-all
    #[arg(long, global = true)]
    pub cleanup: Option<TempDirCleanup>,

    /// Skip TLS certificate validation
    #[arg(long, global = true)]
    pub insecure: bool,

    /// Trace id attached to every log line of the request
    #[arg(long, global = true)]
    pub trace_id: Option<String>,
}

impl ClientArgs {
    /// Applies the flags that were given on top of `settings`.
    pub fn apply_to(&self, settings: &mut ClientSettings) {
        if let Some(base_url) = &self.base_url {
            settings.base_url = Some(base_url.clone());
        }
        if self.allow_http {
            settings.only_https = false;
        }
        if let Some(max_retries) = self.max_retries {
            settings.max_retries = max_retries;
        }
        if let Some(delay) = self.pre_load_delay {
            settings.pre_load_delay = Duration::from_millis(delay);
        }
        if let Some(chunk_size) = self.chunk_size {
            settings.chunk_size = chunk_size;
        }
        if let Some(timeout) = self.timeout {
            settings.download_timeout = Duration::from_secs(timeout);
        }
        if let Some(temp_dir) = &self.temp_dir {
            settings.temp_dir.clone_from(temp_dir);
        }
        if let Some(cookies) = &self.cookies {
            settings.cookies_path = Some(cookies.clone());
        }
        if let Some(proxy) = &self.proxy {
            settings.proxy = Some(proxy.clone());
        }
        if let Some(strategy) = self.strategy {
            settings.file_name_strategy = strategy;
        }
        if let Some(redirect) = self.redirect {
            settings.redirect_mode = redirect;
        }
        if let Some(cleanup) = self.cleanup {
            settings.temp_dir_cleanup = cleanup;
        }
        if self.insecure {
            settings.accept_invalid_certs = true;
        }
    }
}

/// Fetcher subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// GET a URL and write the body to stdout
    Get {
        /// Absolute URL, or a path relative to --base-url
        url: String,
    },

    /// POST a body and write the response body to stdout
    Post {
        /// Absolute URL, or a path relative to --base-url
        url: String,

        /// Request body
        #[arg(short, long, conflicts_with = "data_file")]
        data: Option<String>,

        /// Read the request body from a file
        #[arg(long)]
        data_file: Option<PathBuf>,

        /// Content-Type of the body
        #[arg(long)]
        content_type: Option<String>,
    },

    /// Download a URL, resuming a partial temp file from an earlier run
    Download {
        /// Absolute URL, or a path relative to --base-url
        url: String,

        /// Move the finished file here
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Temp file name (required with --strategy specify)
        #[arg(long)]
        name: Option<String>,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_get_parses_url() {
        let cli = Cli::try_parse_from(["fetcher", "get", "https://a.com/x"]).unwrap();
        assert!(matches!(cli.command, Command::Get { ref url } if url == "https://a.com/x"));
        assert_eq!(cli.verbose, 0);
        assert!(!cli.quiet);
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let cli = Cli::try_parse_from(["fetcher", "-vv", "get", "https://a.com"]).unwrap();
        assert_eq!(cli.verbose, 2);

        let cli = Cli::try_parse_from(["fetcher", "get", "https://a.com", "--verbose"]).unwrap();
        assert_eq!(cli.verbose, 1);
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Cli::try_parse_from(["fetcher", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let err = Cli::try_parse_from(["fetcher", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_cli_subcommand_is_required() {
        assert!(Cli::try_parse_from(["fetcher"]).is_err());
    }

    #[test]
    fn test_cli_max_retries_range() {
        let cli = Cli::try_parse_from(["fetcher", "-r", "0", "get", "https://a.com"]).unwrap();
        assert_eq!(cli.client.max_retries, Some(0));
        assert!(Cli::try_parse_from(["fetcher", "-r", "101", "get", "https://a.com"]).is_err());
    }

    #[test]
    fn test_cli_zero_chunk_size_rejected() {
        assert!(
            Cli::try_parse_from(["fetcher", "--chunk-size", "0", "download", "https://a.com"])
                .is_err()
        );
    }

    #[test]
    fn test_cli_post_data_conflicts_with_file() {
        let result = Cli::try_parse_from([
            "fetcher",
            "post",
            "https://a.com",
            "--data",
            "{}",
            "--data-file",
            "body.json",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_download_options() {
        let cli = Cli::try_parse_from([
            "fetcher",
            "download",
            "https://a.com/f.zip",
            "-o",
            "out/f.zip",
            "--strategy",
            "random",
            "--cleanup",
            "keep",
        ])
        .unwrap();
        match cli.command {
            Command::Download { output, name, .. } => {
                assert_eq!(output, Some(PathBuf::from("out/f.zip")));
                assert_eq!(name, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(cli.client.strategy, Some(FileNameStrategy::Random));
        assert_eq!(cli.client.cleanup, Some(TempDirCleanup::Keep));
    }

    #[test]
    fn test_cli_invalid_strategy_rejected() {
        assert!(
            Cli::try_parse_from(["fetcher", "--strategy", "guess", "download", "https://a.com"])
                .is_err()
        );
    }

    #[test]
    fn test_client_args_apply_to_settings() {
        let cli = Cli::try_parse_from([
            "fetcher",
            "--base-url",
            "https://a.com",
            "--allow-http",
            "--pre-load-delay",
            "50",
            "--timeout",
            "30",
            "--insecure",
            "get",
            "/x",
        ])
        .unwrap();
        let mut settings = ClientSettings::default();
        cli.client.apply_to(&mut settings);
        assert_eq!(settings.base_url.as_deref(), Some("https://a.com"));
        assert!(!settings.only_https);
        assert_eq!(settings.pre_load_delay, Duration::from_millis(50));
        assert_eq!(settings.download_timeout, Duration::from_secs(30));
        assert!(settings.accept_invalid_certs);
        assert_eq!(settings.max_retries, 5);
    }
}
