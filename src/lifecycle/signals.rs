//! OS signal handling.
//!
//! - SIGINT / SIGTERM → graceful shutdown
//! - SIGHUP → reload router policies from disk

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::lifecycle::registry::ListenerRegistry;

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("Shutdown signal received");
}

/// Reload policies from `path` on every SIGHUP.
#[cfg(unix)]
pub fn spawn_hangup_reload(
    path: PathBuf,
    registry: Arc<ListenerRegistry>,
    mut shutdown: broadcast::Receiver<()>,
) -> Option<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install SIGHUP handler, reload on signal disabled");
            return None;
        }
    };

    Some(tokio::spawn(async move {
        loop {
            tokio::select! {
                received = hangup.recv() => {
                    if received.is_none() {
                        break;
                    }
                    tracing::info!("SIGHUP received, reloading router configurations");
                    let _ = crate::lifecycle::reload::reload_from_disk(&path, &registry);
                }
                _ = shutdown.recv() => break,
            }
        }
    }))
}

#[cfg(not(unix))]
pub fn spawn_hangup_reload(
    _path: PathBuf,
    _registry: Arc<ListenerRegistry>,
    _shutdown: broadcast::Receiver<()>,
) -> Option<JoinHandle<()>> {
    None
}
