use axum::{extract::State, Json};
use service_core::error::AppError;

use crate::{
    dtos::{
        server::{ServerInfoResponse, SyncResponse},
        ErrorResponse,
    },
    services::DashboardStats,
    AppState,
};

/// Node role, modules and replication status
#[utoipa::path(
    get,
    path = "/api/server",
    responses(
        (status = 200, description = "Server information", body = ServerInfoResponse)
    ),
    tag = "Server"
)]
pub async fn server_info(State(state): State<AppState>) -> Json<ServerInfoResponse> {
    Json(state.identities.server_info().into())
}

/// Dashboard counters over the whole roster
#[utoipa::path(
    get,
    path = "/api/dashboard",
    responses(
        (status = 200, description = "Dashboard counters", body = DashboardStats)
    ),
    tag = "Server"
)]
pub async fn dashboard(State(state): State<AppState>) -> Json<DashboardStats> {
    Json(state.identities.dashboard().await)
}

/// Report a completed sync with the primary
#[utoipa::path(
    post,
    path = "/api/replication/sync",
    responses(
        (status = 200, description = "Sync recorded and roster reloaded", body = SyncResponse),
        (status = 409, description = "This node is the primary", body = ErrorResponse)
    ),
    tag = "Server"
)]
pub async fn report_sync(State(state): State<AppState>) -> Result<Json<SyncResponse>, AppError> {
    let last_successful_sync = state.identities.record_sync().await?;
    Ok(Json(SyncResponse {
        last_successful_sync,
    }))
}
