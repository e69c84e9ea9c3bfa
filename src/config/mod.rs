//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{fmt, net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::infra::upstream::{github, lastfm};

pub use cli::{CliArgs, ServeOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "config";
const ENV_PREFIX: &str = "TOPI";
const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_GRACEFUL_SHUTDOWN: Duration = Duration::from_secs(10);
const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(20);
const DEFAULT_PAGE_SIZE: u32 = 10;
/// GitHub rejects `first` arguments above this.
const MAX_PAGE_SIZE: u32 = 100;
/// Entry capacity of one cache domain; the LRU map is allocated up front.
const MAX_CACHE_SIZE: usize = 1_000_000;
const MAX_CACHE_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);
const DEFAULT_ASSETS_DIR: &str = "assets";
const DEFAULT_TEMPLATES_DIR: &str = "templates";

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub listen_addr: SocketAddr,
    pub dev_mode: bool,
    pub logging: LoggingSettings,
    pub server: ServerSettings,
    pub github: GitHubSettings,
    pub blog: BlogSettings,
    pub cache: CacheSettings,
    pub lastfm: LastFmSettings,
    pub upstream: UpstreamSettings,
    pub assets_dir: PathBuf,
    pub templates_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Upper bound on how long a request waits for a shared computation.
    pub request_timeout: Duration,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct GitHubSettings {
    pub access_token: Secret,
    pub user: String,
    pub endpoint: Url,
    pub page_sizes: PageSizes,
}

/// `first:` arguments of the GitHub queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSizes {
    pub posts: u32,
    pub projects: u32,
    pub comments: u32,
    pub replies: u32,
    pub topics: u32,
}

impl Default for PageSizes {
    fn default() -> Self {
        Self {
            posts: DEFAULT_PAGE_SIZE,
            projects: DEFAULT_PAGE_SIZE,
            comments: DEFAULT_PAGE_SIZE,
            replies: DEFAULT_PAGE_SIZE,
            topics: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BlogSettings {
    /// Owner of the blog repository.
    pub user: String,
    pub repository: String,
    /// Discussion category slug; `None` lists every discussion.
    pub category: Option<String>,
}

/// Capacity and TTL of one cache domain. Zero in either disables it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheSettings {
    pub size: usize,
    pub ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct LastFmSettings {
    pub username: String,
    pub api_key: Secret,
    pub endpoint: Url,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    pub timeout: Duration,
}

/// A credential that never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret([redacted])")
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }

    fn missing(key: &'static str) -> Self {
        Self::invalid(key, "is required")
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_serve_overrides(&cli.overrides);
    Settings::from_raw(raw)
}

/// Resolve configuration using the process arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

/// A duration given either as whole seconds or as text with a unit.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Seconds(u64),
    Text(String),
}

impl RawDuration {
    fn resolve(&self, key: &'static str) -> Result<Duration, LoadError> {
        match self {
            Self::Seconds(seconds) => Ok(Duration::from_secs(*seconds)),
            Self::Text(text) => parse_duration(text).map_err(|reason| LoadError::invalid(key, reason)),
        }
    }
}

/// Parse `"90"`, `"90s"`, `"250ms"`, `"5m"` or `"2h"`.
pub(crate) fn parse_duration(text: &str) -> Result<Duration, String> {
    let trimmed = text.trim();
    let digits_end = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, unit) = trimmed.split_at(digits_end);

    if digits.is_empty() {
        return Err(format!("`{text}` is not a duration"));
    }
    let value: u64 = digits
        .parse()
        .map_err(|err| format!("`{text}` is not a duration: {err}"))?;

    let duration = match unit.trim() {
        "" | "s" => Duration::from_secs(value),
        "ms" => Duration::from_millis(value),
        "m" => Duration::from_secs(value.saturating_mul(60)),
        "h" => Duration::from_secs(value.saturating_mul(60 * 60)),
        other => return Err(format!("unknown duration unit `{other}` in `{text}`")),
    };
    Ok(duration)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    listen_addr: Option<String>,
    dev_mode: Option<bool>,
    debug: Option<bool>,
    log: RawLoggingSettings,
    server: RawServerSettings,
    github: RawGitHubSettings,
    blog: RawBlogSettings,
    cache: RawCacheSettings,
    lastfm: RawLastFmSettings,
    upstream: RawUpstreamSettings,
    assets_dir: Option<PathBuf>,
    templates_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    format: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    request_timeout: Option<RawDuration>,
    graceful_shutdown: Option<RawDuration>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawGitHubSettings {
    access_token: Option<String>,
    user: Option<String>,
    endpoint: Option<String>,
    posts_per_page: Option<u32>,
    projects_per_page: Option<u32>,
    comments_per_page: Option<u32>,
    replies_per_page: Option<u32>,
    topics_per_page: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBlogSettings {
    user: Option<String>,
    repository: Option<String>,
    category: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    size: Option<usize>,
    ttl: Option<RawDuration>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLastFmSettings {
    username: Option<String>,
    api_key: Option<String>,
    endpoint: Option<String>,
    size: Option<usize>,
    ttl: Option<RawDuration>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawUpstreamSettings {
    timeout: Option<RawDuration>,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(addr) = overrides.listen_addr {
            self.listen_addr = Some(addr.to_string());
        }
        if let Some(dev_mode) = overrides.dev_mode {
            self.dev_mode = Some(dev_mode);
        }
        if let Some(debug) = overrides.debug {
            self.debug = Some(debug);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.log.level = Some(level.clone());
        }
        if let Some(format) = overrides.log_format.as_ref() {
            self.log.format = Some(format.clone());
        }
        if let Some(size) = overrides.cache_size {
            self.cache.size = Some(size);
        }
        if let Some(ttl) = overrides.cache_ttl.as_ref() {
            self.cache.ttl = Some(RawDuration::Text(ttl.clone()));
        }
        if let Some(size) = overrides.lastfm_size {
            self.lastfm.size = Some(size);
        }
        if let Some(ttl) = overrides.lastfm_ttl.as_ref() {
            self.lastfm.ttl = Some(RawDuration::Text(ttl.clone()));
        }
        if let Some(timeout) = overrides.request_timeout.as_ref() {
            self.server.request_timeout = Some(RawDuration::Text(timeout.clone()));
        }
        if let Some(timeout) = overrides.upstream_timeout.as_ref() {
            self.upstream.timeout = Some(RawDuration::Text(timeout.clone()));
        }
        if let Some(dir) = overrides.templates_dir.as_ref() {
            self.templates_dir = Some(dir.clone());
        }
        if let Some(dir) = overrides.assets_dir.as_ref() {
            self.assets_dir = Some(dir.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            listen_addr,
            dev_mode,
            debug,
            log,
            server,
            github,
            blog,
            cache,
            lastfm,
            upstream,
            assets_dir,
            templates_dir,
        } = raw;

        let listen_addr = listen_addr
            .as_deref()
            .unwrap_or(DEFAULT_LISTEN_ADDR)
            .parse()
            .map_err(|err| LoadError::invalid("listen_addr", format!("{err}")))?;

        let logging = build_logging_settings(log, debug.unwrap_or(false))?;
        let server = build_server_settings(server)?;
        let github = build_github_settings(github)?;
        let blog = build_blog_settings(blog, &github.user)?;
        let cache = build_cache_settings(cache.size, "cache.size", cache.ttl.as_ref(), "cache.ttl")?;
        let lastfm = build_lastfm_settings(lastfm)?;
        let upstream = build_upstream_settings(upstream)?;

        Ok(Self {
            listen_addr,
            dev_mode: dev_mode.unwrap_or(false),
            logging,
            server,
            github,
            blog,
            cache,
            lastfm,
            upstream,
            assets_dir: assets_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_ASSETS_DIR)),
            templates_dir: templates_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_TEMPLATES_DIR)),
        })
    }
}

fn build_logging_settings(
    logging: RawLoggingSettings,
    debug: bool,
) -> Result<LoggingSettings, LoadError> {
    let default_level = if debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str())
            .map_err(|err| LoadError::invalid("log.level", format!("failed to parse: {err}")))?,
        None => default_level,
    };

    let format = match logging.format.as_deref().map(str::trim) {
        None | Some("text") | Some("compact") => LogFormat::Compact,
        Some("json") => LogFormat::Json,
        Some(other) => {
            return Err(LoadError::invalid(
                "log.format",
                format!("expected `text` or `json`, got `{other}`"),
            ));
        }
    };

    Ok(LoggingSettings { level, format })
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let request_timeout = positive_duration(
        server.request_timeout.as_ref(),
        DEFAULT_REQUEST_TIMEOUT,
        "server.request_timeout",
    )?;
    let graceful_shutdown = positive_duration(
        server.graceful_shutdown.as_ref(),
        DEFAULT_GRACEFUL_SHUTDOWN,
        "server.graceful_shutdown",
    )?;

    Ok(ServerSettings {
        request_timeout,
        graceful_shutdown,
    })
}

fn build_github_settings(github: RawGitHubSettings) -> Result<GitHubSettings, LoadError> {
    let access_token = required(github.access_token, "github.access_token")?;
    let user = required(github.user, "github.user")?;
    let endpoint = parse_url(github.endpoint, github::DEFAULT_ENDPOINT, "github.endpoint")?;

    let page_sizes = PageSizes {
        posts: page_size(github.posts_per_page, "github.posts_per_page")?,
        projects: page_size(github.projects_per_page, "github.projects_per_page")?,
        comments: page_size(github.comments_per_page, "github.comments_per_page")?,
        replies: page_size(github.replies_per_page, "github.replies_per_page")?,
        topics: page_size(github.topics_per_page, "github.topics_per_page")?,
    };

    Ok(GitHubSettings {
        access_token: Secret::new(access_token),
        user,
        endpoint,
        page_sizes,
    })
}

fn build_blog_settings(blog: RawBlogSettings, github_user: &str) -> Result<BlogSettings, LoadError> {
    let user = non_blank(blog.user).unwrap_or_else(|| github_user.to_string());
    let repository = required(blog.repository, "blog.repository")?;
    let category = non_blank(blog.category);

    Ok(BlogSettings {
        user,
        repository,
        category,
    })
}

fn build_cache_settings(
    size: Option<usize>,
    size_key: &'static str,
    ttl: Option<&RawDuration>,
    ttl_key: &'static str,
) -> Result<CacheSettings, LoadError> {
    let size = size.unwrap_or(0);
    if size > MAX_CACHE_SIZE {
        return Err(LoadError::invalid(
            size_key,
            format!("must not exceed {MAX_CACHE_SIZE} entries"),
        ));
    }

    let ttl = match ttl {
        Some(raw) => raw.resolve(ttl_key)?,
        None => Duration::ZERO,
    };
    if ttl > MAX_CACHE_TTL {
        return Err(LoadError::invalid(ttl_key, "must not exceed 365 days"));
    }

    Ok(CacheSettings { size, ttl })
}

fn build_lastfm_settings(lastfm: RawLastFmSettings) -> Result<LastFmSettings, LoadError> {
    let username = required(lastfm.username, "lastfm.username")?;
    let api_key = required(lastfm.api_key, "lastfm.api_key")?;
    let endpoint = parse_url(lastfm.endpoint, lastfm::DEFAULT_ENDPOINT, "lastfm.endpoint")?;
    let cache = build_cache_settings(lastfm.size, "lastfm.size", lastfm.ttl.as_ref(), "lastfm.ttl")?;

    Ok(LastFmSettings {
        username,
        api_key: Secret::new(api_key),
        endpoint,
        cache,
    })
}

fn build_upstream_settings(upstream: RawUpstreamSettings) -> Result<UpstreamSettings, LoadError> {
    let timeout = positive_duration(
        upstream.timeout.as_ref(),
        DEFAULT_UPSTREAM_TIMEOUT,
        "upstream.timeout",
    )?;
    Ok(UpstreamSettings { timeout })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn required(value: Option<String>, key: &'static str) -> Result<String, LoadError> {
    non_blank(value).ok_or_else(|| LoadError::missing(key))
}

fn parse_url(value: Option<String>, default: &str, key: &'static str) -> Result<Url, LoadError> {
    let raw = non_blank(value).unwrap_or_else(|| default.to_string());
    Url::parse(&raw).map_err(|err| LoadError::invalid(key, format!("invalid URL `{raw}`: {err}")))
}

fn page_size(value: Option<u32>, key: &'static str) -> Result<u32, LoadError> {
    let size = value.unwrap_or(DEFAULT_PAGE_SIZE);
    if size == 0 || size > MAX_PAGE_SIZE {
        return Err(LoadError::invalid(
            key,
            format!("must be between 1 and {MAX_PAGE_SIZE}"),
        ));
    }
    Ok(size)
}

fn positive_duration(
    value: Option<&RawDuration>,
    default: Duration,
    key: &'static str,
) -> Result<Duration, LoadError> {
    let duration = match value {
        Some(raw) => raw.resolve(key)?,
        None => default,
    };
    if duration.is_zero() {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(duration)
}
