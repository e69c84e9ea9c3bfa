use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::{
    domain::now_playing::{NowPlaying, Track},
    infra::upstream::UpstreamError,
};

/// Message shown in the widget when the lookup fails.
pub const LOOKUP_FAILED_MESSAGE: &str = "Error fetching last.fm data";

/// Source of the user's currently playing track.
#[async_trait]
pub trait RecentTracksSource: Send + Sync {
    fn username(&self) -> &str;

    /// `Ok(None)` when nothing is playing right now.
    async fn now_playing(&self) -> Result<Option<Track>, UpstreamError>;
}

pub struct NowPlayingService {
    source: Arc<dyn RecentTracksSource>,
}

impl NowPlayingService {
    pub fn new(source: Arc<dyn RecentTracksSource>) -> Self {
        Self { source }
    }

    /// Look up the current track. Failures become a display-only message.
    pub async fn lookup(&self) -> NowPlaying {
        let username = self.source.username();
        match self.source.now_playing().await {
            Ok(track) => NowPlaying::playing(username, track),
            Err(err) => {
                warn!(
                    target = "topi::application::now_playing",
                    error = %err,
                    "now-playing lookup failed"
                );
                NowPlaying::failed(username, LOOKUP_FAILED_MESSAGE)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::infra::upstream::UpstreamErrorKind;

    use super::*;

    struct Fixed(Result<Option<Track>, UpstreamError>);

    #[async_trait]
    impl RecentTracksSource for Fixed {
        fn username(&self) -> &str {
            "rj"
        }

        async fn now_playing(&self) -> Result<Option<Track>, UpstreamError> {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn failure_becomes_display_error() {
        let service = NowPlayingService::new(Arc::new(Fixed(Err(UpstreamError::new(
            "lastfm",
            UpstreamErrorKind::Transport,
            "connection refused",
        )))));

        let now_playing = service.lookup().await;
        assert_eq!(now_playing.track, None);
        assert_eq!(now_playing.error.as_deref(), Some(LOOKUP_FAILED_MESSAGE));
        assert_eq!(now_playing.profile_url, "https://www.last.fm/user/rj");
    }

    #[tokio::test]
    async fn idle_user_has_no_track_and_no_error() {
        let service = NowPlayingService::new(Arc::new(Fixed(Ok(None))));
        let now_playing = service.lookup().await;
        assert!(!now_playing.is_error());
        assert!(now_playing.track.is_none());
    }
}
