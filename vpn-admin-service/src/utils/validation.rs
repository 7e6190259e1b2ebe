use axum::{
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::dtos::ErrorResponse;
use crate::models::RoutingPolicy;
use crate::services::IdentityError;

pub const MIN_PASSWORD_LENGTH: usize = 6;

pub struct ValidatedJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|e| {
            let err_resp = ErrorResponse {
                error: format!("Json parse error: {}", e),
                details: None,
            };
            (StatusCode::BAD_REQUEST, Json(err_resp)).into_response()
        })?;

        value.validate().map_err(|e| {
            let err_resp = ErrorResponse {
                error: format!("Validation error: {}", e),
                details: None,
            };
            (StatusCode::UNPROCESSABLE_ENTITY, Json(err_resp)).into_response()
        })?;

        Ok(ValidatedJson(value))
    }
}

/// Identity names: hyphen, letters, digits, underscore, dot and at-sign.
///
/// Names double as file names in the PKI and CCD directories, so the bare
/// `.` and `..` are refused as well.
pub fn validate_identity_name(name: &str) -> Result<(), IdentityError> {
    if name.is_empty() {
        return Err(IdentityError::Validation("Identity name is required".to_string()));
    }
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@');
    if !name.chars().all(allowed) {
        return Err(IdentityError::Validation(format!(
            "Identity name {:?} may only contain letters, digits, '-', '_', '.' and '@'",
            name
        )));
    }
    if name.chars().all(|c| c == '.') {
        return Err(IdentityError::Validation(format!(
            "Identity name {:?} is reserved",
            name
        )));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), IdentityError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(IdentityError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

/// Addresses are already typed; what is left is the free-text part, which
/// ends up on a single config line.
pub fn validate_routing_policy(policy: &RoutingPolicy) -> Result<(), IdentityError> {
    for (i, route) in policy.custom_routes.iter().enumerate() {
        if route.description.contains(['\n', '\r']) {
            return Err(IdentityError::Validation(format!(
                "Route {} description must be a single line",
                i + 1
            )));
        }
    }
    Ok(())
}
