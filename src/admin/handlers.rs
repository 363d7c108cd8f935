use std::collections::BTreeMap;

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use super::ControlState;
use crate::lifecycle::registry::ReloadReport;
use crate::lifecycle::reload::reload_from_disk;
use crate::security::Policy;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub listeners: usize,
    pub routing_table_entries: usize,
}

#[derive(Serialize)]
pub struct ListenerStatus {
    pub listen_addr: String,
    #[serde(flatten)]
    pub policy: Policy,
}

/// Re-read the config file and refresh existing listeners.
pub async fn reload(
    State(state): State<ControlState>,
) -> Result<Json<ReloadReport>, (StatusCode, String)> {
    reload_from_disk(&state.config_path, &state.registry)
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

pub async fn get_status(State(state): State<ControlState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        listeners: state.registry.len(),
        routing_table_entries: state.sync.snapshot().len(),
    })
}

pub async fn get_listeners(State(state): State<ControlState>) -> Json<Vec<ListenerStatus>> {
    let listeners = state
        .registry
        .iter()
        .map(|(addr, store)| ListenerStatus {
            listen_addr: addr.to_string(),
            policy: Policy::clone(&store.current()),
        })
        .collect();
    Json(listeners)
}

pub async fn get_routing_table(State(state): State<ControlState>) -> Json<BTreeMap<String, String>> {
    let table = state.sync.snapshot();
    Json(
        table
            .iter()
            .map(|(name, ip)| (name.to_string(), ip.to_string()))
            .collect(),
    )
}
