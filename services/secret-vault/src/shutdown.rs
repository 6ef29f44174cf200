//! Graceful Shutdown Module
//!
//! Signal handling plus a bounded drain: once shutdown begins, in-flight
//! requests get a fixed window to finish before the server task is aborted.

use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Creates a linked trigger/signal pair.
#[must_use]
pub fn channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, ShutdownSignal { receiver: rx })
}

/// Starts shutdown for every linked [`ShutdownSignal`].
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    /// Signals shutdown. Idempotent.
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }
}

/// Shutdown signal receiver
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    receiver: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Waits for shutdown signal
    pub async fn recv(mut self) {
        // A dropped trigger also means shutdown.
        let _ = self.receiver.wait_for(|stop| *stop).await;
    }

    /// Checks if shutdown has been signaled (non-blocking)
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        *self.receiver.borrow()
    }
}

/// Waits for SIGTERM or SIGINT
pub async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}

/// Runs `server` until it stops or `stop` resolves, then drains.
///
/// `server` must begin its own graceful shutdown when `trigger` fires. If it
/// has not finished within `drain_timeout` it is aborted.
pub async fn run_with_graceful_shutdown<F, S>(
    server: F,
    stop: S,
    trigger: ShutdownTrigger,
    drain_timeout: Duration,
) -> io::Result<()>
where
    F: Future<Output = io::Result<()>> + Send + 'static,
    S: Future<Output = ()>,
{
    let mut server = tokio::spawn(server);

    tokio::select! {
        result = &mut server => {
            return flatten(result);
        }
        () = stop => {
            info!("Shutdown signal received");
        }
    }

    trigger.shutdown();

    match tokio::time::timeout(drain_timeout, &mut server).await {
        Ok(result) => {
            info!("Server drained");
            flatten(result)
        }
        Err(_) => {
            warn!(timeout = ?drain_timeout, "Shutdown timeout reached, aborting in-flight requests");
            server.abort();
            Ok(())
        }
    }
}

fn flatten(result: Result<io::Result<()>, tokio::task::JoinError>) -> io::Result<()> {
    match result {
        Ok(inner) => inner,
        Err(e) => Err(io::Error::other(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_reaches_every_signal() {
        let (trigger, signal) = channel();
        let other = signal.clone();
        assert!(!signal.is_shutdown());

        trigger.shutdown();
        signal.recv().await;
        assert!(other.is_shutdown());
    }

    #[tokio::test]
    async fn test_dropped_trigger_releases_signal() {
        let (trigger, signal) = channel();
        drop(trigger);
        signal.recv().await;
    }

    #[tokio::test]
    async fn test_cooperative_server_drains() {
        let (trigger, signal) = channel();
        let server = async move {
            signal.recv().await;
            Ok(())
        };

        let result =
            run_with_graceful_shutdown(server, async {}, trigger, Duration::from_secs(1)).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_stuck_server_is_aborted() {
        let (trigger, _signal) = channel();
        let server = std::future::pending::<io::Result<()>>();

        let result =
            run_with_graceful_shutdown(server, async {}, trigger, Duration::from_millis(20)).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_server_error_is_returned() {
        let (trigger, _signal) = channel();
        let server = async { Err(io::Error::other("bind failed")) };

        let result = run_with_graceful_shutdown(
            server,
            std::future::pending::<()>(),
            trigger,
            Duration::from_secs(1),
        )
        .await;
        assert!(result.is_err());
    }
}
