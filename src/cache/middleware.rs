//! Response cache middleware.
//!
//! Wraps a route group with one [`CacheDomain`]. `GET` requests are keyed by
//! path, sorted query parameters and theme; concurrent identical requests run
//! the handler once and every caller receives the same response.

use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{instrument, warn};

use crate::application::error::{ErrorReport, HttpError, PublicMessage};
use crate::domain::theme::Theme;

use super::{
    CacheDomain, CacheError, CachePolicy,
    keys::CacheKey,
    response::{CachedResponse, buffer_response},
};

const SOURCE: &str = "cache::middleware::response_cache_layer";

/// Cache domain holding buffered responses. Non-storable responses travel on
/// the error side so they reach concurrent waiters without being stored.
pub type ResponseDomain = CacheDomain<CachedResponse, CachedResponse>;

/// Middleware state: the domain plus how long a request waits for a result.
#[derive(Clone)]
pub struct ResponseCache {
    pub domain: ResponseDomain,
    pub wait_timeout: Duration,
}

impl ResponseCache {
    pub fn new(name: &'static str, policy: CachePolicy, wait_timeout: Duration) -> Self {
        Self {
            domain: CacheDomain::new(name, policy),
            wait_timeout,
        }
    }
}

#[instrument(skip_all, fields(domain = cache.domain.name(), path = %request.uri().path()))]
pub async fn response_cache_layer(
    State(cache): State<ResponseCache>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() != Method::GET {
        return next.run(request).await;
    }

    let theme = Theme::from_headers(request.headers());
    let key = CacheKey::for_request(request.uri().path(), request.uri().query(), theme);

    let compute = move || async move {
        let response = next.run(request).await;
        match buffer_response(response).await {
            Ok(cached) if cached.is_storable() => Ok(cached),
            Ok(cached) => Err(cached),
            Err(err) => {
                warn!(error = %err, "failed to buffer response");
                Err(buffer_failure(&err))
            }
        }
    };

    match cache
        .domain
        .get_or_compute_within(key, cache.wait_timeout, compute)
        .await
    {
        Ok(cached) | Err(CacheError::Compute(cached)) => cached.into_response(),
        Err(CacheError::Cancelled) => HttpError::new(
            SOURCE,
            StatusCode::GATEWAY_TIMEOUT,
            "Request timed out",
            format!("no response within {} ms", cache.wait_timeout.as_millis()),
        )
        .into_response(),
        Err(CacheError::Aborted) => HttpError::new(
            SOURCE,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            "response computation aborted",
        )
        .into_response(),
    }
}

fn buffer_failure(error: &dyn std::error::Error) -> CachedResponse {
    let status = StatusCode::INTERNAL_SERVER_ERROR;
    CachedResponse {
        status,
        headers: Vec::new(),
        body: "Internal server error".into(),
        report: Some(ErrorReport::from_error(SOURCE, status, error)),
        public_message: Some(PublicMessage("Internal server error")),
    }
}
