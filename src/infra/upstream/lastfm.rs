//! Last.fm recent-tracks client.

use std::time::Instant;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::instrument;
use url::Url;

use crate::{application::now_playing::RecentTracksSource, domain::now_playing::Track};

use super::{UpstreamError, UpstreamErrorKind, record_call};

pub const SERVICE: &str = "lastfm";
pub const DEFAULT_ENDPOINT: &str = "https://ws.audioscrobbler.com/2.0/";

#[derive(Debug, Deserialize)]
struct RecentTracksResponse {
    #[serde(default)]
    recenttracks: Option<RecentTracks>,
    #[serde(default)]
    error: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RecentTracks {
    #[serde(default)]
    track: OneOrMany<TrackDto>,
}

/// Last.fm collapses single-element arrays into a bare object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    fn into_first(self) -> Option<T> {
        match self {
            Self::Many(items) => items.into_iter().next(),
            Self::One(item) => Some(item),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TrackDto {
    name: String,
    #[serde(default)]
    url: String,
    artist: ArtistDto,
    #[serde(default)]
    album: Option<TextDto>,
    #[serde(default)]
    image: Vec<ImageDto>,
    #[serde(default)]
    loved: Option<String>,
    #[serde(default, rename = "@attr")]
    attr: Option<TrackAttrDto>,
}

#[derive(Debug, Deserialize)]
struct ArtistDto {
    #[serde(default)]
    name: String,
    #[serde(default)]
    url: String,
}

#[derive(Debug, Deserialize)]
struct TextDto {
    #[serde(default, rename = "#text")]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ImageDto {
    #[serde(default, rename = "#text")]
    text: String,
}

#[derive(Debug, Deserialize)]
struct TrackAttrDto {
    #[serde(default)]
    nowplaying: Option<String>,
}

impl TrackDto {
    fn is_now_playing(&self) -> bool {
        self.attr
            .as_ref()
            .and_then(|attr| attr.nowplaying.as_deref())
            .is_some_and(|value| value == "true")
    }

    fn into_track(self) -> Track {
        // Images are listed smallest first.
        let artwork_url = self
            .image
            .into_iter()
            .map(|image| image.text)
            .rfind(|url| !url.is_empty())
            .unwrap_or_default();

        Track {
            name: self.name,
            url: self.url,
            artist: self.artist.name,
            artist_url: self.artist.url,
            album: self.album.map(|album| album.text).unwrap_or_default(),
            artwork_url,
            loved: self.loved.as_deref() == Some("1"),
        }
    }
}

impl RecentTracksResponse {
    fn into_now_playing(self) -> Result<Option<Track>, UpstreamError> {
        if let Some(code) = self.error {
            return Err(UpstreamError::new(
                SERVICE,
                UpstreamErrorKind::Status,
                format!(
                    "error {code}: {}",
                    self.message.unwrap_or_else(|| "no message".to_string())
                ),
            ));
        }

        let recent = self.recenttracks.ok_or_else(|| {
            UpstreamError::new(SERVICE, UpstreamErrorKind::Decode, "missing recenttracks")
        })?;

        Ok(recent
            .track
            .into_first()
            .filter(TrackDto::is_now_playing)
            .map(TrackDto::into_track))
    }
}

/// Looks up the track a Last.fm user is currently scrobbling.
pub struct LastFmClient {
    client: reqwest::Client,
    endpoint: Url,
    username: String,
    api_key: String,
}

impl LastFmClient {
    pub fn new(
        client: reqwest::Client,
        endpoint: Url,
        username: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint,
            username: username.into(),
            api_key: api_key.into(),
        }
    }

    fn request_url(&self) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("method", "user.getrecenttracks")
            .append_pair("user", &self.username)
            .append_pair("api_key", &self.api_key)
            .append_pair("format", "json")
            .append_pair("limit", "1")
            .append_pair("extended", "1");
        url
    }

    #[instrument(skip(self), fields(user = %self.username))]
    pub async fn recent_track(&self) -> Result<Option<Track>, UpstreamError> {
        let started_at = Instant::now();
        let result = self.fetch_recent_track().await;
        record_call(SERVICE, started_at, &result);
        result
    }

    async fn fetch_recent_track(&self) -> Result<Option<Track>, UpstreamError> {
        let response = self
            .client
            .get(self.request_url())
            .send()
            .await
            .map_err(|err| UpstreamError::from_reqwest(SERVICE, err))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| UpstreamError::from_reqwest(SERVICE, err))?;

        // Last.fm reports API errors as JSON, often with a non-2xx status.
        match serde_json::from_str::<RecentTracksResponse>(&body) {
            Ok(payload) if status.is_success() || payload.error.is_some() => {
                payload.into_now_playing()
            }
            Ok(_) => Err(status_error(status)),
            Err(_) if !status.is_success() => Err(status_error(status)),
            Err(err) => Err(UpstreamError::new(
                SERVICE,
                UpstreamErrorKind::Decode,
                err.to_string(),
            )),
        }
    }
}

fn status_error(status: reqwest::StatusCode) -> UpstreamError {
    UpstreamError::new(SERVICE, UpstreamErrorKind::Status, format!("HTTP {status}"))
}

#[async_trait]
impl RecentTracksSource for LastFmClient {
    fn username(&self) -> &str {
        &self.username
    }

    async fn now_playing(&self) -> Result<Option<Track>, UpstreamError> {
        self.recent_track().await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn decode(value: serde_json::Value) -> Result<Option<Track>, UpstreamError> {
        serde_json::from_value::<RecentTracksResponse>(value)
            .expect("payload")
            .into_now_playing()
    }

    fn track_json(nowplaying: bool) -> serde_json::Value {
        let mut track = json!({
            "name": "Windowlicker",
            "url": "https://www.last.fm/music/Aphex+Twin/_/Windowlicker",
            "artist": { "name": "Aphex Twin", "url": "https://www.last.fm/music/Aphex+Twin" },
            "album": { "#text": "Windowlicker" },
            "image": [
                { "size": "small", "#text": "https://img/small.png" },
                { "size": "extralarge", "#text": "https://img/xl.png" }
            ],
            "loved": "1"
        });
        if nowplaying {
            track["@attr"] = json!({ "nowplaying": "true" });
        }
        track
    }

    #[test]
    fn now_playing_track_is_mapped() {
        let track = decode(json!({ "recenttracks": { "track": [track_json(true)] } }))
            .expect("ok")
            .expect("track");

        assert_eq!(track.name, "Windowlicker");
        assert_eq!(track.artist, "Aphex Twin");
        assert_eq!(track.album, "Windowlicker");
        assert_eq!(track.artwork_url, "https://img/xl.png");
        assert!(track.loved);
    }

    #[test]
    fn finished_track_is_not_now_playing() {
        let result = decode(json!({ "recenttracks": { "track": [track_json(false)] } }));
        assert_eq!(result, Ok(None));
    }

    #[test]
    fn single_track_object_is_accepted() {
        let result = decode(json!({ "recenttracks": { "track": track_json(true) } }));
        assert!(matches!(result, Ok(Some(_))));
    }

    #[test]
    fn api_error_is_reported() {
        let err = decode(json!({ "error": 6, "message": "User not found" })).unwrap_err();
        assert_eq!(err.kind, UpstreamErrorKind::Status);
        assert!(err.message.contains("User not found"));
    }

    #[test]
    fn request_url_carries_all_parameters() {
        let client = LastFmClient::new(
            reqwest::Client::new(),
            Url::parse(DEFAULT_ENDPOINT).expect("url"),
            "rj",
            "secret key",
        );
        let url = client.request_url();
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        assert!(pairs.contains(&("method".into(), "user.getrecenttracks".into())));
        assert!(pairs.contains(&("user".into(), "rj".into())));
        assert!(pairs.contains(&("api_key".into(), "secret key".into())));
        assert!(pairs.contains(&("limit".into(), "1".into())));
        assert!(pairs.contains(&("extended".into(), "1".into())));
    }
}
