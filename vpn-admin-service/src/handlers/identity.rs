use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::{
        identity::{
            CreateIdentityRequest, IdentityListResponse, IdentityResponse, ListIdentitiesQuery,
            RotateIdentityRequest, SetPasswordRequest,
        },
        ErrorResponse, MessageResponse,
    },
    models::{CreateIdentityOptions, Identity},
    utils::ValidatedJson,
    AppState,
};

fn with_actions(state: &AppState, identity: Identity) -> IdentityResponse {
    let actions = state
        .identities
        .permitted_actions(identity.account_status)
        .into_iter()
        .collect();
    IdentityResponse { identity, actions }
}

/// List identities
#[utoipa::path(
    get,
    path = "/api/identities",
    params(ListIdentitiesQuery),
    responses(
        (status = 200, description = "Classified roster ordered by name", body = IdentityListResponse)
    ),
    tag = "Identities"
)]
pub async fn list_identities(
    State(state): State<AppState>,
    Query(query): Query<ListIdentitiesQuery>,
) -> Json<IdentityListResponse> {
    let identities: Vec<IdentityResponse> = state
        .identities
        .list_identities(&query.into())
        .await
        .into_iter()
        .map(|identity| with_actions(&state, identity))
        .collect();

    Json(IdentityListResponse {
        total: identities.len(),
        identities,
    })
}

/// Get one identity
#[utoipa::path(
    get,
    path = "/api/identities/{name}",
    params(("name" = String, Path, description = "Identity name")),
    responses(
        (status = 200, description = "Identity", body = IdentityResponse),
        (status = 404, description = "Identity not found", body = ErrorResponse)
    ),
    tag = "Identities"
)]
pub async fn get_identity(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<IdentityResponse>, AppError> {
    let identity = state.identities.get_identity(&name).await?;
    Ok(Json(with_actions(&state, identity)))
}

/// Create an identity and issue its certificate
#[utoipa::path(
    post,
    path = "/api/identities",
    request_body = CreateIdentityRequest,
    responses(
        (status = 201, description = "Identity created", body = IdentityResponse),
        (status = 403, description = "Not permitted on this node", body = ErrorResponse),
        (status = 409, description = "Identity already exists", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 502, description = "Certificate tooling failed", body = ErrorResponse)
    ),
    tag = "Identities"
)]
pub async fn create_identity(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<CreateIdentityRequest>,
) -> Result<impl IntoResponse, AppError> {
    let identity = state
        .identities
        .create_identity(&req.name, req.options())
        .await?;
    Ok((StatusCode::CREATED, Json(with_actions(&state, identity))))
}

/// Revoke an identity's certificate
#[utoipa::path(
    post,
    path = "/api/identities/{name}/revoke",
    params(("name" = String, Path, description = "Identity name")),
    responses(
        (status = 200, description = "Identity revoked", body = IdentityResponse),
        (status = 403, description = "Action not permitted", body = ErrorResponse),
        (status = 404, description = "Identity not found", body = ErrorResponse),
        (status = 502, description = "Certificate tooling failed", body = ErrorResponse)
    ),
    tag = "Identities"
)]
pub async fn revoke_identity(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<IdentityResponse>, AppError> {
    let identity = state.identities.revoke_identity(&name).await?;
    Ok(Json(with_actions(&state, identity)))
}

/// Restore a revoked certificate
#[utoipa::path(
    post,
    path = "/api/identities/{name}/unrevoke",
    params(("name" = String, Path, description = "Identity name")),
    responses(
        (status = 200, description = "Identity restored", body = IdentityResponse),
        (status = 403, description = "Action not permitted", body = ErrorResponse),
        (status = 404, description = "Identity not found", body = ErrorResponse),
        (status = 502, description = "Certificate tooling failed", body = ErrorResponse)
    ),
    tag = "Identities"
)]
pub async fn unrevoke_identity(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<IdentityResponse>, AppError> {
    let identity = state.identities.unrevoke_identity(&name).await?;
    Ok(Json(with_actions(&state, identity)))
}

/// Re-issue a revoked or expired certificate
#[utoipa::path(
    post,
    path = "/api/identities/{name}/rotate",
    params(("name" = String, Path, description = "Identity name")),
    request_body(content = RotateIdentityRequest, description = "Optional; carries the new password"),
    responses(
        (status = 200, description = "Certificate re-issued", body = IdentityResponse),
        (status = 403, description = "Action not permitted", body = ErrorResponse),
        (status = 404, description = "Identity not found", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 502, description = "Certificate tooling failed", body = ErrorResponse)
    ),
    tag = "Identities"
)]
pub async fn rotate_identity(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Option<Json<RotateIdentityRequest>>,
) -> Result<Json<IdentityResponse>, AppError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let identity = state
        .identities
        .rotate_identity(
            &name,
            CreateIdentityOptions {
                password: req.password,
            },
        )
        .await?;
    Ok(Json(with_actions(&state, identity)))
}

/// Delete a revoked or expired identity
#[utoipa::path(
    delete,
    path = "/api/identities/{name}",
    params(("name" = String, Path, description = "Identity name")),
    responses(
        (status = 200, description = "Identity deleted", body = MessageResponse),
        (status = 403, description = "Action not permitted", body = ErrorResponse),
        (status = 404, description = "Identity not found", body = ErrorResponse),
        (status = 502, description = "Certificate tooling failed", body = ErrorResponse)
    ),
    tag = "Identities"
)]
pub async fn delete_identity(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    state.identities.delete_identity(&name).await?;
    Ok(Json(MessageResponse {
        message: format!("Identity {} deleted", name),
    }))
}

/// Change an identity's password
#[utoipa::path(
    post,
    path = "/api/identities/{name}/password",
    params(("name" = String, Path, description = "Identity name")),
    request_body = SetPasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 403, description = "Action not permitted", body = ErrorResponse),
        (status = 404, description = "Identity not found", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "Identities"
)]
pub async fn set_password(
    State(state): State<AppState>,
    Path(name): Path<String>,
    ValidatedJson(req): ValidatedJson<SetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state.identities.set_password(&name, &req.password).await?;
    Ok(Json(MessageResponse {
        message: format!("Password for {} changed", name),
    }))
}

/// Download the client profile
#[utoipa::path(
    get,
    path = "/api/identities/{name}/config",
    params(("name" = String, Path, description = "Identity name")),
    responses(
        (status = 200, description = "OpenVPN client profile", content_type = "application/x-openvpn-profile", body = String),
        (status = 403, description = "Action not permitted", body = ErrorResponse),
        (status = 404, description = "Identity not found", body = ErrorResponse)
    ),
    tag = "Identities"
)]
pub async fn download_config(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let profile = state.identities.client_config(&name).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/x-openvpn-profile".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}.ovpn\"", name),
            ),
        ],
        profile,
    ))
}
