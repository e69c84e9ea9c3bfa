//! Static asset serving: embedded in release builds, read from disk in dev mode.

use std::{
    borrow::Cow,
    path::{Path as FsPath, PathBuf},
};

use axum::{
    body::Body,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use include_dir::{Dir, include_dir};
use mime_guess::{Mime, MimeGuess};
use tracing::debug;

use crate::application::error::ErrorReport;

static EMBEDDED_ASSETS: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/assets");

const SOURCE: &str = "infra::assets::AssetSource::serve";
const IMMUTABLE: &str = "public, max-age=31536000, immutable";
const REVALIDATE: &str = "no-cache";

/// Where static assets are read from. Chosen once at startup.
#[derive(Debug, Clone)]
pub enum AssetSource {
    Embedded,
    /// Re-read on every request so edits show up without a restart.
    Disk(PathBuf),
}

impl AssetSource {
    pub fn new(dev_mode: bool, assets_dir: &FsPath) -> Self {
        if dev_mode {
            Self::Disk(assets_dir.to_path_buf())
        } else {
            Self::Embedded
        }
    }

    /// Serve the asset at `path`, relative to the asset root.
    pub async fn serve(&self, path: &str) -> Response {
        let Some(candidate) = normalize(path) else {
            return not_found_response();
        };

        match self {
            Self::Embedded => match EMBEDDED_ASSETS.get_file(candidate) {
                Some(file) => Asset {
                    contents: Cow::Borrowed(file.contents()),
                    mime: mime_guess::from_path(candidate),
                    cache_control: IMMUTABLE,
                }
                .into_response(),
                None => not_found_response(),
            },
            Self::Disk(root) => match tokio::fs::read(root.join(candidate)).await {
                Ok(bytes) => Asset {
                    contents: Cow::Owned(bytes),
                    mime: mime_guess::from_path(candidate),
                    cache_control: REVALIDATE,
                }
                .into_response(),
                Err(err) => {
                    debug!(path = candidate, error = %err, "asset not readable from disk");
                    not_found_response()
                }
            },
        }
    }
}

/// Strip leading slashes and reject directory listings and traversal.
fn normalize(path: &str) -> Option<&str> {
    let candidate = path.trim_start_matches('/');
    if candidate.is_empty() || candidate.ends_with('/') || candidate.contains("..") {
        return None;
    }
    Some(candidate)
}

fn not_found_response() -> Response {
    let mut response = StatusCode::NOT_FOUND.into_response();
    ErrorReport::from_message(SOURCE, StatusCode::NOT_FOUND, "Static asset not found")
        .attach(&mut response);
    response
}

struct Asset {
    contents: Cow<'static, [u8]>,
    mime: MimeGuess,
    cache_control: &'static str,
}

impl IntoResponse for Asset {
    fn into_response(self) -> Response {
        let mime = self.mime.first_or_octet_stream();
        let bytes = match self.contents {
            Cow::Borrowed(slice) => Bytes::from_static(slice),
            Cow::Owned(bytes) => Bytes::from(bytes),
        };
        build_response(bytes, mime, self.cache_control)
    }
}

fn build_response(bytes: Bytes, mime: Mime, cache_control: &'static str) -> Response {
    let len = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&len.to_string()) {
        headers.insert(header::CONTENT_LENGTH, value);
    }
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(cache_control));

    response
}
