//! HTTP API endpoints.

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::state::AppState;
use crate::types::ServerStatsInfo;

/// Aggregate server counters, same numbers as the `get-server-stats`
/// WebSocket intent.
///
/// GET /stats
pub async fn server_stats(State(state): State<Arc<AppState>>) -> Json<ServerStatsInfo> {
    Json(state.server_stats().await)
}
