//! HTTP surface: routes, middleware and listeners.

pub mod handlers;

use std::net::SocketAddr;
use std::time::Duration;

use axum::error_handling::HandleErrorLayer;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{BoxError, Router};
use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower::timeout::error::Elapsed;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::TlsConfig;
use crate::error::VaultError;
use crate::service::VaultService;
use crate::shutdown::ShutdownSignal;

/// Builds the application router.
///
/// Requests running longer than `request_timeout` are cut off and answered
/// with the `server` category.
pub fn router(service: VaultService, request_timeout: Duration) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(HandleErrorLayer::new(move |err: BoxError| async move {
            timeout_response(&err, request_timeout)
        }))
        .timeout(request_timeout);

    Router::new()
        .route("/secret", post(handlers::store_secret))
        .route("/secret/:key", get(handlers::retrieve_secret))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .with_state(service)
        .layer(middleware)
        .layer(TraceLayer::new_for_http())
}

fn timeout_response(err: &BoxError, duration: Duration) -> Response {
    if err.is::<Elapsed>() {
        VaultError::Timeout { duration }.into_response()
    } else {
        VaultError::internal(format!("unhandled middleware error: {err}")).into_response()
    }
}

/// Serves plain HTTP until `shutdown` fires, then stops accepting and drains.
pub async fn serve_plain(listener: TcpListener, app: Router, shutdown: ShutdownSignal) -> std::io::Result<()> {
    info!(addr = ?listener.local_addr().ok(), "Listening (HTTP)");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.recv())
        .await
}

/// Serves HTTPS with rustls until `shutdown` fires, then stops accepting and drains.
pub async fn serve_tls(
    addr: SocketAddr,
    tls: &TlsConfig,
    app: Router,
    shutdown: ShutdownSignal,
) -> std::io::Result<()> {
    let rustls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path).await?;

    let handle = Handle::new();
    let shutdown_handle = handle.clone();
    tokio::spawn(async move {
        shutdown.recv().await;
        shutdown_handle.graceful_shutdown(None);
    });

    info!(%addr, "Listening (HTTPS)");
    axum_server::bind_rustls(addr, rustls_config)
        .handle(handle)
        .serve(app.into_make_service())
        .await
}
