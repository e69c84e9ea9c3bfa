use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::Query,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use tokio::net::TcpListener;
use topi::infra::upstream::{UpstreamErrorKind, build_http_client, lastfm::LastFmClient};
use url::Url;

const API_KEY: &str = "test-key";

async fn recent_tracks(Query(params): Query<HashMap<String, String>>) -> Response {
    let param = |name: &str| params.get(name).map(String::as_str).unwrap_or("");

    if param("method") != "user.getrecenttracks" || param("format") != "json" {
        return (StatusCode::BAD_REQUEST, "unexpected request").into_response();
    }
    if param("api_key") != API_KEY {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": 10, "message": "Invalid API key" })),
        )
            .into_response();
    }

    match param("user") {
        "playing" => Json(json!({ "recenttracks": { "track": [{
            "name": "Windowlicker",
            "url": "https://www.last.fm/music/Aphex+Twin/_/Windowlicker",
            "artist": { "name": "Aphex Twin", "url": "https://www.last.fm/music/Aphex+Twin" },
            "album": { "#text": "Windowlicker" },
            "image": [{ "size": "large", "#text": "https://img/large.png" }],
            "loved": "0",
            "@attr": { "nowplaying": "true" }
        }] } }))
        .into_response(),
        "idle" => Json(json!({ "recenttracks": { "track": {
            "name": "Older",
            "url": "https://www.last.fm/music/x/_/older",
            "artist": { "name": "x", "url": "https://www.last.fm/music/x" },
            "album": { "#text": "" },
            "image": [],
            "loved": "0"
        } } }))
        .into_response(),
        "garbled" => (StatusCode::OK, "not json").into_response(),
        "broken" => (StatusCode::BAD_GATEWAY, "<html>bad gateway</html>").into_response(),
        "slow" => {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Json(json!({ "recenttracks": { "track": [] } })).into_response()
        }
        _ => Json(json!({ "error": 6, "message": "User not found" })).into_response(),
    }
}

async fn spawn_fake_lastfm() -> SocketAddr {
    let app = Router::new().route("/2.0/", get(recent_tracks));
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fake server");
    });
    addr
}

async fn client(user: &str, api_key: &str, timeout: Duration) -> LastFmClient {
    let addr = spawn_fake_lastfm().await;
    let endpoint = Url::parse(&format!("http://{addr}/2.0/")).expect("endpoint");
    LastFmClient::new(
        build_http_client(timeout).expect("http client"),
        endpoint,
        user,
        api_key,
    )
}

#[tokio::test]
async fn now_playing_track_is_returned() {
    let track = client("playing", API_KEY, Duration::from_secs(5))
        .await
        .recent_track()
        .await
        .expect("ok")
        .expect("track");

    assert_eq!(track.name, "Windowlicker");
    assert_eq!(track.artwork_url, "https://img/large.png");
    assert!(!track.loved);
}

#[tokio::test]
async fn last_played_track_is_not_now_playing() {
    let track = client("idle", API_KEY, Duration::from_secs(5))
        .await
        .recent_track()
        .await
        .expect("ok");
    assert_eq!(track, None);
}

#[tokio::test]
async fn api_errors_surface_as_status_errors() {
    let err = client("playing", "wrong", Duration::from_secs(5))
        .await
        .recent_track()
        .await
        .expect_err("invalid key");
    assert_eq!(err.kind, UpstreamErrorKind::Status);
    assert!(err.message.contains("Invalid API key"));

    let err = client("nobody", API_KEY, Duration::from_secs(5))
        .await
        .recent_track()
        .await
        .expect_err("unknown user");
    assert_eq!(err.kind, UpstreamErrorKind::Status);
}

#[tokio::test]
async fn non_json_error_pages_are_status_errors() {
    let err = client("broken", API_KEY, Duration::from_secs(5))
        .await
        .recent_track()
        .await
        .expect_err("bad gateway");
    assert_eq!(err.kind, UpstreamErrorKind::Status);
    assert!(err.message.contains("502"));
}

#[tokio::test]
async fn malformed_bodies_are_decode_errors() {
    let err = client("garbled", API_KEY, Duration::from_secs(5))
        .await
        .recent_track()
        .await
        .expect_err("garbled body");
    assert_eq!(err.kind, UpstreamErrorKind::Decode);
}

#[tokio::test]
async fn slow_upstream_times_out() {
    let err = client("slow", API_KEY, Duration::from_millis(100))
        .await
        .recent_track()
        .await
        .expect_err("timeout");
    assert_eq!(err.kind, UpstreamErrorKind::Timeout);
    assert!(!err.message.contains(API_KEY));
}
