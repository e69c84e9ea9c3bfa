use std::{future::IntoFuture, pin::pin, process, sync::Arc, time::Duration};

use tokio::{net::TcpListener, signal, sync::Notify};
use topi::{
    application::{
        content::{ContentService, ContentSettings},
        error::AppError,
        now_playing::NowPlayingService,
        render::{MarkupRenderer, StyleRegistry},
    },
    cache::{CachePolicy, LASTFM_DOMAIN, PAGE_DOMAIN, ResponseCache},
    config::{self, Settings},
    infra::{
        assets::AssetSource,
        error::InfraError,
        http::{self, HttpState},
        telemetry,
        upstream::{
            build_http_client,
            github::{GitHubClient, HttpGraphQlTransport},
            lastfm::LastFmClient,
        },
    },
    presentation::{PageRenderer, select_renderer},
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (_cli_args, settings) = config::load_with_cli()?;

    telemetry::init(&settings.logging)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen_addr = %settings.listen_addr,
        dev_mode = settings.dev_mode,
        "starting topi"
    );

    let state = build_http_state(&settings).await?;
    serve_http(&settings, state).await
}

async fn build_http_state(settings: &Settings) -> Result<HttpState, AppError> {
    let styles = Arc::new(StyleRegistry::new()?);
    let markup = Arc::new(MarkupRenderer::new(Arc::clone(&styles)));

    let client = build_http_client(settings.upstream.timeout)
        .map_err(|err| InfraError::http_client(err.to_string()))?;

    let transport = HttpGraphQlTransport::new(
        client.clone(),
        settings.github.endpoint.clone(),
        settings.github.access_token.expose(),
    );
    let content = ContentService::new(
        GitHubClient::new(Arc::new(transport)),
        markup,
        ContentSettings::from_settings(settings),
    );
    content.resolve_category().await?;

    let lastfm = LastFmClient::new(
        client,
        settings.lastfm.endpoint.clone(),
        settings.lastfm.username.as_str(),
        settings.lastfm.api_key.expose(),
    );
    let now_playing = NowPlayingService::new(Arc::new(lastfm));

    let pages: Arc<dyn PageRenderer> =
        Arc::from(select_renderer(settings.dev_mode, &settings.templates_dir));
    if settings.dev_mode {
        info!(
            templates_dir = %settings.templates_dir.display(),
            assets_dir = %settings.assets_dir.display(),
            "dev mode: templates and assets are read from disk"
        );
    }

    let wait_timeout = settings.server.request_timeout;
    Ok(HttpState {
        content: Arc::new(content),
        now_playing: Arc::new(now_playing),
        styles,
        pages,
        assets: AssetSource::new(settings.dev_mode, &settings.assets_dir),
        page_cache: ResponseCache::new(
            PAGE_DOMAIN,
            CachePolicy::from(&settings.cache),
            wait_timeout,
        ),
        lastfm_cache: ResponseCache::new(
            LASTFM_DOMAIN,
            CachePolicy::from(&settings.lastfm.cache),
            wait_timeout,
        ),
    })
}

async fn serve_http(settings: &Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = TcpListener::bind(settings.listen_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(addr = %settings.listen_addr, "listening");

    let shutdown = Arc::new(Notify::new());
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown({
        let shutdown = Arc::clone(&shutdown);
        async move { shutdown.notified().await }
    });
    let mut server = pin!(server.into_future());

    let signalled = tokio::select! {
        result = &mut server => {
            result.map_err(|err| AppError::from(InfraError::from(err)))?;
            false
        }
        () = shutdown_signal() => true,
    };

    if signalled {
        info!("shutdown signal received; draining connections");
        shutdown.notify_one();
        drain(server, settings.server.graceful_shutdown).await?;
    }

    info!("server stopped");
    Ok(())
}

async fn drain<F>(server: F, grace: Duration) -> Result<(), AppError>
where
    F: std::future::Future<Output = std::io::Result<()>>,
{
    match tokio::time::timeout(grace, server).await {
        Ok(result) => result.map_err(|err| AppError::from(InfraError::from(err))),
        Err(_) => {
            warn!(
                grace_ms = grace.as_millis() as u64,
                "graceful shutdown timed out; dropping open connections"
            );
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
