use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{HeaderValue, Request, Response, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use topi::{
    application::{
        content::{ContentService, ContentSettings},
        now_playing::{NowPlayingService, RecentTracksSource},
        render::{MarkupRenderer, StyleRegistry},
    },
    cache::{CachePolicy, ResponseCache, ResponseDomain},
    config::PageSizes,
    domain::{now_playing::Track, theme::Theme},
    infra::{
        assets::AssetSource,
        http::{HttpState, REQUEST_ID_HEADER, build_router},
        upstream::{
            UpstreamError, UpstreamErrorKind,
            github::{GitHubClient, GraphQlRequest, GraphQlTransport},
        },
    },
    presentation::TemplateRenderer,
};
use tower::ServiceExt;

/// GitHub stand-in answering every operation with the same canned `data`.
struct FakeGitHub {
    data: Option<Value>,
    calls: AtomicUsize,
    variables: Mutex<Vec<Value>>,
}

impl FakeGitHub {
    fn answering(data: Value) -> Arc<Self> {
        Arc::new(Self {
            data: Some(data),
            calls: AtomicUsize::new(0),
            variables: Mutex::new(Vec::new()),
        })
    }

    fn unreachable() -> Arc<Self> {
        Arc::new(Self {
            data: None,
            calls: AtomicUsize::new(0),
            variables: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl GraphQlTransport for FakeGitHub {
    async fn execute(&self, request: GraphQlRequest) -> Result<Value, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.variables
            .lock()
            .expect("variables lock")
            .push(request.variables);
        self.data.clone().ok_or_else(|| {
            UpstreamError::new("github", UpstreamErrorKind::Transport, "connection refused")
        })
    }
}

struct FakeLastFm {
    track: Option<Track>,
    fail: bool,
    calls: AtomicUsize,
}

#[async_trait]
impl RecentTracksSource for FakeLastFm {
    fn username(&self) -> &str {
        "listener"
    }

    async fn now_playing(&self) -> Result<Option<Track>, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(UpstreamError::new(
                "lastfm",
                UpstreamErrorKind::Status,
                "HTTP 503",
            ));
        }
        Ok(self.track.clone())
    }
}

struct Site {
    router: Router,
    styles: Arc<StyleRegistry>,
    page_domain: ResponseDomain,
    lastfm_domain: ResponseDomain,
}

fn site(github: Arc<FakeGitHub>, lastfm: Arc<FakeLastFm>) -> Site {
    let styles = Arc::new(StyleRegistry::new().expect("styles"));
    let markup = Arc::new(MarkupRenderer::new(Arc::clone(&styles)));
    let content = ContentService::new(
        GitHubClient::new(github),
        markup,
        ContentSettings {
            login: "octocat".to_string(),
            blog_owner: "octocat".to_string(),
            blog_repository: "blog".to_string(),
            blog_category: None,
            page_sizes: PageSizes::default(),
        },
    );

    let enabled = CachePolicy::new(32, Duration::from_secs(60));
    let page_cache = ResponseCache::new("page", enabled, Duration::from_secs(5));
    let lastfm_cache = ResponseCache::new("lastfm", enabled, Duration::from_secs(5));
    let page_domain = page_cache.domain.clone();
    let lastfm_domain = lastfm_cache.domain.clone();

    let state = HttpState {
        content: Arc::new(content),
        now_playing: Arc::new(NowPlayingService::new(lastfm)),
        styles: Arc::clone(&styles),
        pages: Arc::new(TemplateRenderer),
        assets: AssetSource::Embedded,
        page_cache,
        lastfm_cache,
    };

    Site {
        router: build_router(state),
        styles,
        page_domain,
        lastfm_domain,
    }
}

fn idle_lastfm() -> Arc<FakeLastFm> {
    Arc::new(FakeLastFm {
        track: None,
        fail: false,
        calls: AtomicUsize::new(0),
    })
}

fn overview_data() -> Value {
    json!({
        "user": {
            "login": "octocat",
            "avatarUrl": "https://avatars.example/octocat",
            "readme": { "object": { "text": "Hello from the README" } },
            "repositories": {
                "pageInfo": { "hasNextPage": true, "endCursor": "cmVwbzox" },
                "nodes": [{
                    "name": "topi",
                    "url": "https://github.com/octocat/topi",
                    "description": "Homepage server",
                    "stargazerCount": 5,
                    "forkCount": 0,
                    "pushedAt": "2024-04-01T00:00:00Z",
                    "repositoryTopics": { "nodes": [] },
                    "languages": { "nodes": [] }
                }]
            }
        },
        "repository": { "discussions": {
            "pageInfo": { "hasNextPage": false, "endCursor": null },
            "nodes": []
        }}
    })
}

async fn get(router: &Router, uri: &str, cookie: Option<&str>) -> Response<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, HeaderValue::from_str(cookie).expect("cookie"));
    }
    router
        .clone()
        .oneshot(builder.body(Body::empty()).expect("request"))
        .await
        .expect("router responds")
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    String::from_utf8_lossy(&bytes).into_owned()
}

#[tokio::test]
async fn upstream_failure_renders_error_page_with_request_id() {
    let github = FakeGitHub::unreachable();
    let site = site(Arc::clone(&github), idle_lastfm());

    let response = get(&site.router, "/", None).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let request_id = response
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .expect("request id header");
    let body = body_text(response).await;

    assert!(body.contains("Upstream service unavailable"));
    assert!(body.contains(&request_id));
    assert!(!body.contains("connection refused"));
    assert!(site.page_domain.is_empty());

    get(&site.router, "/", None).await;
    assert_eq!(github.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn stylesheets_come_from_the_registry() {
    let site = site(FakeGitHub::unreachable(), idle_lastfm());

    let dark = get(&site.router, "/dark.css", None).await;
    assert_eq!(dark.status(), StatusCode::OK);
    assert_eq!(
        dark.headers().get(header::CONTENT_TYPE),
        Some(&HeaderValue::from_static("text/css; charset=utf-8"))
    );
    assert_eq!(body_text(dark).await, site.styles.stylesheet(Theme::Dark));

    let light = get(&site.router, "/light.css", None).await;
    assert_eq!(body_text(light).await, site.styles.stylesheet(Theme::Light));
}

#[tokio::test]
async fn index_defaults_to_dark_and_honours_the_cookie() {
    let github = FakeGitHub::answering(overview_data());
    let site = site(Arc::clone(&github), idle_lastfm());

    let response = get(&site.router, "/", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("href=\"/dark.css\""));
    assert!(body.contains("Hello from the README"));
    assert!(body.contains("projects-load-more"));

    let light = body_text(get(&site.router, "/", Some("theme=light")).await).await;
    assert!(light.contains("href=\"/light.css\""));

    // Dark with and without the cookie share one entry; light has its own.
    get(&site.router, "/", Some("theme=dark")).await;
    assert_eq!(github.calls.load(Ordering::SeqCst), 2);
    assert_eq!(site.page_domain.len(), 2);
}

#[tokio::test]
async fn repositories_cursor_is_forwarded_verbatim() {
    let github = FakeGitHub::answering(json!({
        "user": { "repositories": {
            "pageInfo": { "hasNextPage": false, "endCursor": null },
            "nodes": []
        }}
    }));
    let site = site(Arc::clone(&github), idle_lastfm());

    let response = get(&site.router, "/api/repositories?after=Y3Vyc29yOjEw", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(!body.contains("load-more"));

    let variables = github.variables.lock().expect("variables lock").clone();
    assert_eq!(variables[0]["after"], json!("Y3Vyc29yOjEw"));
}

#[tokio::test]
async fn failed_now_playing_is_shown_but_not_cached() {
    let lastfm = Arc::new(FakeLastFm {
        track: None,
        fail: true,
        calls: AtomicUsize::new(0),
    });
    let site = site(FakeGitHub::unreachable(), Arc::clone(&lastfm));

    let response = get(&site.router, "/api/lastfm", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL),
        Some(&HeaderValue::from_static("no-store"))
    );
    assert!(body_text(response).await.contains("Error fetching last.fm data"));

    get(&site.router, "/api/lastfm", None).await;
    assert_eq!(lastfm.calls.load(Ordering::SeqCst), 2);
    assert!(site.lastfm_domain.is_empty());
}

#[tokio::test]
async fn now_playing_is_cached_in_its_own_domain() {
    let lastfm = Arc::new(FakeLastFm {
        track: Some(Track {
            name: "Windowlicker".to_string(),
            url: "https://www.last.fm/music/Aphex+Twin/_/Windowlicker".to_string(),
            artist: "Aphex Twin".to_string(),
            artist_url: "https://www.last.fm/music/Aphex+Twin".to_string(),
            album: "Windowlicker".to_string(),
            artwork_url: "https://lastfm.freetls.fastly.net/i/u/300x300/a.png".to_string(),
            loved: true,
        }),
        fail: false,
        calls: AtomicUsize::new(0),
    });
    let site = site(FakeGitHub::unreachable(), Arc::clone(&lastfm));

    let body = body_text(get(&site.router, "/api/lastfm", None).await).await;
    assert!(body.contains("Aphex Twin"));
    get(&site.router, "/api/lastfm", None).await;

    assert_eq!(lastfm.calls.load(Ordering::SeqCst), 1);
    assert_eq!(site.lastfm_domain.len(), 1);
    assert!(site.page_domain.is_empty());
}

#[tokio::test]
async fn liveness_version_and_assets() {
    let site = site(FakeGitHub::unreachable(), idle_lastfm());

    assert_eq!(get(&site.router, "/ping", None).await.status(), StatusCode::OK);

    let version = body_text(get(&site.router, "/version", None).await).await;
    assert!(version.starts_with(&format!("Version: {}", env!("CARGO_PKG_VERSION"))));

    let script = get(&site.router, "/assets/script.js", None).await;
    assert_eq!(script.status(), StatusCode::OK);

    let missing = get(&site.router, "/assets/nope.js", None).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert!(body_text(missing).await.contains("404 Not Found"));
}

#[tokio::test]
async fn unknown_paths_redirect_home() {
    let site = site(FakeGitHub::unreachable(), idle_lastfm());

    let response = get(&site.router, "/does/not/exist", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION),
        Some(&HeaderValue::from_static("/"))
    );
}

#[tokio::test]
async fn responses_are_compressed_when_the_client_accepts_it() {
    let site = site(FakeGitHub::unreachable(), idle_lastfm());

    let request = Request::builder()
        .uri("/dark.css")
        .header(header::ACCEPT_ENCODING, "gzip")
        .body(Body::empty())
        .expect("request");
    let compressed = site.router.clone().oneshot(request).await.expect("router responds");
    assert_eq!(compressed.status(), StatusCode::OK);
    assert_eq!(
        compressed.headers().get(header::CONTENT_ENCODING),
        Some(&HeaderValue::from_static("gzip"))
    );

    let plain = get(&site.router, "/dark.css", None).await;
    assert!(plain.headers().get(header::CONTENT_ENCODING).is_none());
    assert_eq!(body_text(plain).await, site.styles.stylesheet(Theme::Dark));
}
