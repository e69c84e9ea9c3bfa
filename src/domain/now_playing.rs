//! Last.fm "now playing" widget state.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Track {
    pub name: String,
    pub url: String,
    pub artist: String,
    pub artist_url: String,
    pub album: String,
    pub artwork_url: String,
    pub loved: bool,
}

/// Result of one now-playing lookup.
///
/// A failed lookup still produces a value: `error` carries a display-only
/// message and `track` is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NowPlaying {
    pub track: Option<Track>,
    pub profile_url: String,
    pub error: Option<String>,
}

impl NowPlaying {
    pub fn profile_url(username: &str) -> String {
        format!("https://www.last.fm/user/{username}")
    }

    pub fn playing(username: &str, track: Option<Track>) -> Self {
        Self {
            track,
            profile_url: Self::profile_url(username),
            error: None,
        }
    }

    pub fn failed(username: &str, message: impl Into<String>) -> Self {
        Self {
            track: None,
            profile_url: Self::profile_url(username),
            error: Some(message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
