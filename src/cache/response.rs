//! Buffered HTTP responses as cache payloads.

use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::Response,
};
use bytes::Bytes;
use http_body_util::BodyExt;
use thiserror::Error;

use crate::application::error::{ErrorReport, PublicMessage};

/// Status, headers and body of a fully buffered response.
///
/// Buffering drops response extensions; an attached [`ErrorReport`] and
/// [`PublicMessage`] are kept alongside so they survive replay.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub headers: Vec<(HeaderName, HeaderValue)>,
    pub body: Bytes,
    pub report: Option<ErrorReport>,
    pub public_message: Option<PublicMessage>,
}

impl CachedResponse {
    pub fn new(status: StatusCode, headers: &HeaderMap, body: Bytes) -> Self {
        let headers = headers
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        Self {
            status,
            headers,
            body,
            report: None,
            public_message: None,
        }
    }

    /// Whether this response may be stored and replayed to later requests.
    ///
    /// Only plain `200 OK` responses qualify; anything setting a cookie or
    /// marked `no-store` is shared with concurrent waiters but never stored.
    pub fn is_storable(&self) -> bool {
        if self.status != StatusCode::OK {
            return false;
        }

        let mut storable = true;
        for (name, value) in &self.headers {
            if name == header::SET_COOKIE {
                storable = false;
            }
            if name == header::CACHE_CONTROL
                && value
                    .to_str()
                    .is_ok_and(|directives| directives.to_ascii_lowercase().contains("no-store"))
            {
                storable = false;
            }
        }
        storable
    }

    pub fn header(&self, name: &HeaderName) -> Option<&HeaderValue> {
        self.headers
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, value)| value)
    }

    pub fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        for (name, value) in self.headers {
            headers.append(name, value);
        }
        if let Some(report) = self.report {
            report.attach(&mut response);
        }
        if let Some(message) = self.public_message {
            response.extensions_mut().insert(message);
        }

        response
    }
}

#[derive(Debug, Error)]
pub enum CacheStoreError {
    #[error("failed to buffer response body: {0}")]
    Buffer(String),
}

/// Collect a response body into memory.
pub async fn buffer_response(response: Response) -> Result<CachedResponse, CacheStoreError> {
    let (parts, body) = response.into_parts();
    let collected = BodyExt::collect(body)
        .await
        .map_err(|error| CacheStoreError::Buffer(error.to_string()))?;
    let mut cached = CachedResponse::new(parts.status, &parts.headers, collected.to_bytes());
    cached.report = parts.extensions.get::<ErrorReport>().cloned();
    cached.public_message = parts.extensions.get::<PublicMessage>().copied();
    Ok(cached)
}
