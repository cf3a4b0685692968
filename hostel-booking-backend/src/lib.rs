//! HTTP surface of the hostel booking system.

pub mod csrf_protection;
pub mod error;
pub mod routes;
pub mod session;
pub mod telemetry;

use std::sync::Arc;

use axum::extract::FromRef;
use axum::routing::{get, post};
use axum::Router;
use axum_extra::extract::cookie::Key;
use error::AppError;
use hostel_booking_config::Config;
use hostel_booking_core::HostelService;
use hostel_booking_database::connect_and_migrate;
use hostel_booking_openidconnect::{OpenIdConnect, REDIRECT_PATH};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{error, info, warn, Level};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub service: HostelService,
    pub key: Key,
    /// Unset when no identity provider is configured.
    pub openid: Option<Arc<OpenIdConnect>>,
}

pub fn setup_server(state: AppState) -> Router {
    let app = Router::new()
        .route("/session", get(routes::session::current))
        .route("/login", post(routes::openid_login::openid_login))
        .route(REDIRECT_PATH, get(routes::openid_redirect::openid_redirect))
        .route("/logout", post(routes::session::logout))
        .route("/register", post(routes::register::register))
        .route("/profile", post(routes::register::complete_profile))
        .route("/dashboard", get(routes::dashboard::dashboard))
        .route("/blocks", get(routes::blocks::list))
        .route("/blocks/:id", get(routes::blocks::layout))
        .route("/rooms/:id", get(routes::rooms::detail))
        .route("/rooms/:id/confirm", get(routes::rooms::confirm))
        .route("/rooms/:id/book", post(routes::rooms::book))
        .route("/rooms/:id/cancel", post(routes::rooms::cancel))
        .with_state(state);

    // layers are in reverse order
    app.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::default().level(Level::INFO))
                    .on_response(DefaultOnResponse::default().level(Level::INFO)),
            )
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(CatchPanicLayer::new()),
    )
}

pub async fn run_server(config: Config) -> Result<(), AppError> {
    info!("starting up server...");

    let store = connect_and_migrate(&config.database_url).await?;
    let service = HostelService::new(Arc::new(store), config.booking.conflict_retries);
    let openid = config.openidconnect.clone().map_or_else(
        || {
            warn!("openidconnect is not configured, login is disabled");
            None
        },
        |openidconnect| Some(Arc::new(OpenIdConnect::new(openidconnect, &config.url))),
    );

    let app = setup_server(AppState {
        service,
        key: Key::generate(),
        openid,
    });

    let listener = TcpListener::bind(config.listen).await?;
    info!(address = %config.listen, "started up server...");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

#[allow(clippy::redundant_pub_crate)]
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!("failed to install signal handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    warn!("shutting down");
}
