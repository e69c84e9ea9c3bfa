use std::{net::SocketAddr, path::PathBuf};

use clap::{Args, Parser, builder::BoolishValueParser};

/// Command-line arguments for the topi binary.
#[derive(Debug, Parser)]
#[command(name = "topi", version, about = "Personal homepage server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "TOPI_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listen address.
    #[arg(long = "listen-addr", value_name = "ADDR")]
    pub listen_addr: Option<SocketAddr>,

    /// Serve templates and assets from disk, reloading on every request.
    #[arg(
        long = "dev-mode",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub dev_mode: Option<bool>,

    /// Raise the default log level to debug.
    #[arg(
        long = "debug",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub debug: Option<bool>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Override the log format (text|json).
    #[arg(long = "log-format", value_name = "FORMAT")]
    pub log_format: Option<String>,

    /// Override the page cache capacity; zero disables the page cache.
    #[arg(long = "cache-size", value_name = "COUNT")]
    pub cache_size: Option<usize>,

    /// Override the page cache TTL (e.g. `300`, `5m`); zero disables the page cache.
    #[arg(long = "cache-ttl", value_name = "DURATION")]
    pub cache_ttl: Option<String>,

    /// Override the now-playing cache capacity.
    #[arg(long = "lastfm-size", value_name = "COUNT")]
    pub lastfm_size: Option<usize>,

    /// Override the now-playing cache TTL.
    #[arg(long = "lastfm-ttl", value_name = "DURATION")]
    pub lastfm_ttl: Option<String>,

    /// Override how long a request waits for a shared computation.
    #[arg(long = "request-timeout", value_name = "DURATION")]
    pub request_timeout: Option<String>,

    /// Override the per-call upstream timeout.
    #[arg(long = "upstream-timeout", value_name = "DURATION")]
    pub upstream_timeout: Option<String>,

    /// Override the templates directory used in dev mode.
    #[arg(long = "templates-dir", value_name = "PATH")]
    pub templates_dir: Option<PathBuf>,

    /// Override the assets directory used in dev mode.
    #[arg(long = "assets-dir", value_name = "PATH")]
    pub assets_dir: Option<PathBuf>,
}
