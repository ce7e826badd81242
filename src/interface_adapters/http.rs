// Shared HTTP response types and plain HTTP routes.

use crate::interface_adapters::state::AppState;
use axum::{Json, extract::State};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    // Human-readable error string for consistent JSON error responses.
    pub error: String,
}

#[derive(Debug, serde::Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    // Live rooms and their lifecycle phase.
    pub rooms: BTreeMap<String, &'static str>,
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let rooms = state
        .room_registry
        .phases()
        .await
        .into_iter()
        .map(|(name, phase)| (name, phase.as_str()))
        .collect();
    Json(HealthResponse {
        status: "ok",
        rooms,
    })
}
