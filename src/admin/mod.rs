//! Control interface.
//!
//! Serves policy reloads and read-only views of the running gateway on
//! its own listener, separate from proxied traffic.

pub mod auth;
pub mod handlers;

use std::path::PathBuf;
use std::sync::Arc;

use axum::{middleware, routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use self::auth::control_auth_middleware;
use self::handlers::*;
use crate::lifecycle::registry::ListenerRegistry;
use crate::lifecycle::shutdown;
use crate::routing::SyncManager;

/// State shared by control handlers.
#[derive(Clone)]
pub struct ControlState {
    pub registry: Arc<ListenerRegistry>,
    pub sync: SyncManager,
    pub config_path: Arc<PathBuf>,
    pub api_key: Option<Arc<str>>,
}

pub fn setup_control_router(state: ControlState) -> Router {
    Router::new()
        .route("/reload", get(reload).post(reload))
        .route("/status", get(get_status))
        .route("/listeners", get(get_listeners))
        .route("/routing-table", get(get_routing_table))
        .layer(middleware::from_fn_with_state(state.clone(), control_auth_middleware))
        .with_state(state)
}

/// Serve the control interface until shutdown fires.
pub async fn serve_control(
    listener: TcpListener,
    state: ControlState,
    shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Control interface listening");

    axum::serve(listener, setup_control_router(state))
        .with_graceful_shutdown(shutdown::wait_for(shutdown))
        .await
}
