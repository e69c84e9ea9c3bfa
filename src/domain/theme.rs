//! Color theme selected per request from the `theme` cookie.

use axum::http::HeaderMap;
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;

/// One of the two color variants of the site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub const COOKIE: &'static str = "theme";

    /// Parse a cookie value. Anything other than `light` selects the default.
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("light") {
            Self::Light
        } else {
            Self::Dark
        }
    }

    pub fn from_headers(headers: &HeaderMap) -> Self {
        CookieJar::from_headers(headers)
            .get(Self::COOKIE)
            .map(|cookie| Self::parse(cookie.value()))
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dark => "dark",
            Self::Light => "light",
        }
    }

    /// Route under which the highlight stylesheet for this theme is served.
    pub fn stylesheet_path(&self) -> &'static str {
        match self {
            Self::Dark => "/dark.css",
            Self::Light => "/light.css",
        }
    }

    pub fn is_dark(&self) -> bool {
        matches!(self, Self::Dark)
    }
}
