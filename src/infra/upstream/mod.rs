//! Clients for the external content sources.
//!
//! Every call goes through one shared `reqwest` client with a fixed per-call
//! timeout. Nothing here retries; a failed call surfaces as [`UpstreamError`].

pub mod github;
pub mod lastfm;

use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use thiserror::Error;

pub(crate) const METRIC_UPSTREAM_REQUEST_MS: &str = "topi_upstream_request_ms";
pub(crate) const METRIC_UPSTREAM_FAILURE: &str = "topi_upstream_failure_total";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamErrorKind {
    /// Connection, TLS or protocol failure.
    Transport,
    /// The per-call deadline elapsed.
    Timeout,
    /// Non-2xx HTTP status.
    Status,
    /// The GraphQL response carried `errors`.
    GraphQl,
    /// Body could not be decoded into the expected shape.
    Decode,
}

impl UpstreamErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Timeout => "timeout",
            Self::Status => "status",
            Self::GraphQl => "graphql",
            Self::Decode => "decode",
        }
    }
}

/// Any failure talking to GitHub or Last.fm.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{service} request failed ({}): {message}", .kind.as_str())]
pub struct UpstreamError {
    pub service: &'static str,
    pub kind: UpstreamErrorKind,
    pub message: String,
}

impl UpstreamError {
    pub fn new(service: &'static str, kind: UpstreamErrorKind, message: impl Into<String>) -> Self {
        Self {
            service,
            kind,
            message: message.into(),
        }
    }

    /// Classify a `reqwest` failure. The URL is stripped so query-string
    /// credentials never reach logs.
    pub fn from_reqwest(service: &'static str, error: reqwest::Error) -> Self {
        let kind = if error.is_timeout() {
            UpstreamErrorKind::Timeout
        } else if error.is_status() {
            UpstreamErrorKind::Status
        } else if error.is_decode() {
            UpstreamErrorKind::Decode
        } else {
            UpstreamErrorKind::Transport
        };
        Self::new(service, kind, error.without_url().to_string())
    }
}

/// Record latency and, on failure, the error kind of one upstream call.
pub(crate) fn record_call<T>(
    service: &'static str,
    started_at: Instant,
    result: &Result<T, UpstreamError>,
) {
    histogram!(METRIC_UPSTREAM_REQUEST_MS, "service" => service)
        .record(started_at.elapsed().as_secs_f64() * 1000.0);
    if let Err(err) = result {
        counter!(METRIC_UPSTREAM_FAILURE, "service" => service, "kind" => err.kind.as_str())
            .increment(1);
    }
}

/// Build the HTTP client shared by all upstream clients.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
}
