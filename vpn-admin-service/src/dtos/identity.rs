use crate::models::{Action, CreateIdentityOptions, Identity};
use crate::services::IdentityFilter;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListIdentitiesQuery {
    /// Case-insensitive substring of the identity name.
    #[param(example = "ali")]
    pub search: Option<String>,
    /// Leave revoked identities out.
    #[serde(default)]
    pub hide_revoked: bool,
}

impl From<ListIdentitiesQuery> for IdentityFilter {
    fn from(query: ListIdentitiesQuery) -> Self {
        Self {
            search: query.search,
            hide_revoked: query.hide_revoked,
        }
    }
}

/// One roster row with what the caller may do to it.
#[derive(Debug, Serialize, ToSchema)]
pub struct IdentityResponse {
    #[serde(flatten)]
    pub identity: Identity,
    pub actions: Vec<Action>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IdentityListResponse {
    pub identities: Vec<IdentityResponse>,
    #[schema(example = 3)]
    pub total: usize,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateIdentityRequest {
    #[validate(length(min = 1, max = 64, message = "Name must be 1 to 64 characters"))]
    #[schema(example = "alice", pattern = "^[-A-Za-z0-9_.@]+$")]
    pub name: String,

    /// Required when password authentication is enabled, ignored otherwise.
    #[schema(example = "s3cret!", min_length = 6)]
    pub password: Option<String>,
}

impl CreateIdentityRequest {
    pub fn options(&self) -> CreateIdentityOptions {
        CreateIdentityOptions {
            password: self.password.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RotateIdentityRequest {
    #[schema(example = "n3w-secret", min_length = 6)]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SetPasswordRequest {
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    #[schema(example = "n3w-secret", min_length = 6)]
    pub password: String,
}
