use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, Query, State},
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE},
    },
    middleware,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use serde::Deserialize;
use time::OffsetDateTime;
use tower_http::{CompressionLevel, compression::CompressionLayer};

use crate::{
    application::{
        content::ContentService, error::HttpError, now_playing::NowPlayingService,
        render::StyleRegistry,
    },
    cache::{ResponseCache, response_cache_layer},
    domain::{content::Cursor, theme::Theme},
    infra::assets::AssetSource,
    presentation::{
        PageRenderer, PageView,
        views::{
            IndexTemplate, NowPlayingTemplate, NowPlayingView, PostsTemplate, PostsView,
            ProjectsTemplate, ProjectsView,
        },
    },
};

use super::middleware::{log_responses, render_error_pages, set_request_context};

/// gzip/brotli quality for compressed responses.
const COMPRESSION_LEVEL: i32 = 5;

#[derive(Clone)]
pub struct HttpState {
    pub content: Arc<ContentService>,
    pub now_playing: Arc<NowPlayingService>,
    pub styles: Arc<StyleRegistry>,
    pub pages: Arc<dyn PageRenderer>,
    pub assets: AssetSource,
    pub page_cache: ResponseCache,
    pub lastfm_cache: ResponseCache,
}

pub fn build_router(state: HttpState) -> Router {
    let page_routes = Router::new()
        .route("/", get(index))
        .route("/api/posts", get(posts_partial))
        .route("/api/repositories", get(projects_partial))
        .route_layer(middleware::from_fn_with_state(
            state.page_cache.clone(),
            response_cache_layer,
        ));

    let lastfm_routes = Router::new()
        .route("/api/lastfm", get(now_playing_partial))
        .route_layer(middleware::from_fn_with_state(
            state.lastfm_cache.clone(),
            response_cache_layer,
        ));

    let static_routes = Router::new()
        .route("/dark.css", get(dark_stylesheet))
        .route("/light.css", get(light_stylesheet))
        .route("/assets/{*path}", get(asset))
        .route("/favicon.ico", get(favicon))
        .route("/favicon.svg", get(favicon))
        .route("/robots.txt", get(robots_txt))
        .route("/ping", get(ping))
        .route("/version", get(version));

    page_routes
        .merge(lastfm_routes)
        .merge(static_routes)
        .fallback(fallback)
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.pages,
            render_error_pages,
        ))
        .layer(CompressionLayer::new().quality(CompressionLevel::Precise(COMPRESSION_LEVEL)))
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AfterQuery {
    after: Option<String>,
}

impl AfterQuery {
    fn cursor(self) -> Cursor {
        self.after.map(Cursor::new).unwrap_or_default()
    }
}

async fn index(
    State(state): State<HttpState>,
    headers: HeaderMap,
) -> Result<Html<String>, HttpError> {
    let theme = Theme::from_headers(&headers);
    let overview = state.content.fetch_overview().await?;
    let page = PageView::Index(IndexTemplate::new(
        theme,
        &overview,
        OffsetDateTime::now_utc(),
    ));
    render(&state, &page)
}

async fn posts_partial(
    State(state): State<HttpState>,
    Query(query): Query<AfterQuery>,
) -> Result<Html<String>, HttpError> {
    let posts = state.content.fetch_posts(&query.cursor()).await?;
    let page = PageView::Posts(PostsTemplate {
        posts: PostsView::new(&posts, OffsetDateTime::now_utc()),
    });
    render(&state, &page)
}

async fn projects_partial(
    State(state): State<HttpState>,
    Query(query): Query<AfterQuery>,
) -> Result<Html<String>, HttpError> {
    let projects = state.content.fetch_projects(&query.cursor()).await?;
    let page = PageView::Projects(ProjectsTemplate {
        projects: ProjectsView::new(&projects, OffsetDateTime::now_utc()),
    });
    render(&state, &page)
}

/// A failed lookup still renders, but must never be memoized.
async fn now_playing_partial(State(state): State<HttpState>) -> Result<Response, HttpError> {
    let now_playing = state.now_playing.lookup().await;
    let page = PageView::NowPlaying(NowPlayingTemplate {
        now_playing: NowPlayingView::from(&now_playing),
    });

    let mut response = render(&state, &page)?.into_response();
    if now_playing.is_error() {
        set_no_store(&mut response);
    }
    Ok(response)
}

fn render(state: &HttpState, page: &PageView) -> Result<Html<String>, HttpError> {
    state
        .pages
        .render_page(page)
        .map(Html)
        .map_err(HttpError::from)
}

fn set_no_store(response: &mut Response) {
    let value = HeaderValue::from_static("no-store");
    response.headers_mut().insert(CACHE_CONTROL, value);
}

async fn dark_stylesheet(State(state): State<HttpState>) -> Response {
    stylesheet_response(state.styles.stylesheet(Theme::Dark))
}

async fn light_stylesheet(State(state): State<HttpState>) -> Response {
    stylesheet_response(state.styles.stylesheet(Theme::Light))
}

fn stylesheet_response(css: &str) -> Response {
    (
        [(CONTENT_TYPE, HeaderValue::from_static("text/css; charset=utf-8"))],
        css.to_string(),
    )
        .into_response()
}

async fn asset(State(state): State<HttpState>, Path(path): Path<String>) -> Response {
    state.assets.serve(&path).await
}

async fn favicon(State(state): State<HttpState>) -> Response {
    state.assets.serve("favicon.svg").await
}

async fn robots_txt(State(state): State<HttpState>) -> Response {
    state.assets.serve("robots.txt").await
}

async fn ping() -> StatusCode {
    StatusCode::OK
}

async fn version() -> Response {
    (
        [(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"))],
        version_text(),
    )
        .into_response()
}

/// Build metadata; commit and build time come from the build environment when set.
pub fn version_text() -> String {
    format!(
        "Version: {}\nCommit: {}\nBuild Time: {}\nOS: {}\nArch: {}\n",
        env!("CARGO_PKG_VERSION"),
        option_env!("TOPI_COMMIT").unwrap_or("unknown"),
        option_env!("TOPI_BUILD_TIME").unwrap_or("unknown"),
        std::env::consts::OS,
        std::env::consts::ARCH,
    )
}

async fn fallback() -> Redirect {
    Redirect::to("/")
}
