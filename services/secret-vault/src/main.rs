//! Secret Vault - Main Entry Point

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use rust_common::{TracingConfig, init_tracing};
use tracing::info;

use secret_vault::shutdown::{self, run_with_graceful_shutdown, wait_for_signal};
use secret_vault::{Config, build_service, http};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("invalid configuration")?;

    init_tracing(
        &TracingConfig::default()
            .with_service_name("secret-vault")
            .with_log_level(config.log_level.clone())
            .with_json_output(config.log_json),
    )
    .context("failed to initialise tracing")?;

    info!("Starting Secret Vault");

    let service = build_service(&config).await.context("failed to start service")?;
    let app = http::router(service, Duration::from_secs(config.request_timeout_secs));

    let (trigger, signal) = shutdown::channel();
    let drain = Duration::from_secs(config.shutdown_timeout_seconds);

    let result = if let Some(tls) = config.tls.clone() {
        // axum-server is built without a default crypto provider.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let addr: SocketAddr = config
            .listen_addr()
            .parse()
            .with_context(|| format!("invalid listen address {}", config.listen_addr()))?;

        let server = async move { http::serve_tls(addr, &tls, app, signal).await };
        run_with_graceful_shutdown(server, wait_for_signal(), trigger, drain).await
    } else {
        let listener = tokio::net::TcpListener::bind(config.listen_addr())
            .await
            .with_context(|| format!("failed to bind to {}", config.listen_addr()))?;

        let server = http::serve_plain(listener, app, signal);
        run_with_graceful_shutdown(server, wait_for_signal(), trigger, drain).await
    };

    result.context("server error")?;
    info!("Secret Vault stopped");
    Ok(())
}
