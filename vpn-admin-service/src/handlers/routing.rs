use axum::{
    extract::{Path, State},
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::{
        routing::{RoutingPolicyRequest, RoutingPolicyResponse},
        ErrorResponse,
    },
    models::Action,
    utils::ValidatedJson,
    AppState,
};

/// Get an identity's routing policy
#[utoipa::path(
    get,
    path = "/api/identities/{name}/routes",
    params(("name" = String, Path, description = "Identity name")),
    responses(
        (status = 200, description = "Routing policy, empty when never saved", body = RoutingPolicyResponse),
        (status = 403, description = "Per-client routing not available", body = ErrorResponse),
        (status = 404, description = "Identity not found", body = ErrorResponse)
    ),
    tag = "Routing"
)]
pub async fn get_routing_policy(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<RoutingPolicyResponse>, AppError> {
    let policy = state.identities.get_routing_policy(&name).await?;
    let identity = state.identities.get_identity(&name).await?;
    let editable = state
        .identities
        .permitted_actions(identity.account_status)
        .contains(&Action::ManageRoutes);
    Ok(Json(RoutingPolicyResponse { policy, editable }))
}

/// Replace an identity's routing policy
#[utoipa::path(
    put,
    path = "/api/identities/{name}/routes",
    params(("name" = String, Path, description = "Identity name")),
    request_body = RoutingPolicyRequest,
    responses(
        (status = 200, description = "Routing policy saved", body = RoutingPolicyResponse),
        (status = 403, description = "Action not permitted", body = ErrorResponse),
        (status = 404, description = "Identity not found", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 502, description = "Policy could not be written", body = ErrorResponse)
    ),
    tag = "Routing"
)]
pub async fn save_routing_policy(
    State(state): State<AppState>,
    Path(name): Path<String>,
    ValidatedJson(req): ValidatedJson<RoutingPolicyRequest>,
) -> Result<Json<RoutingPolicyResponse>, AppError> {
    let policy = req.into_policy(&name)?;
    let policy = state.identities.save_routing_policy(&name, policy).await?;
    Ok(Json(RoutingPolicyResponse {
        policy,
        editable: true,
    }))
}
