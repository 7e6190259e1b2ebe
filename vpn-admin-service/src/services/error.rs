use crate::models::Action;
use service_core::error::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Identity {0} already exists")]
    Conflict(String),

    #[error("Conflicting server role: {0}")]
    RoleConflict(String),

    #[error("Identity {0} not found")]
    NotFound(String),

    #[error("Action {action} is not permitted on identity {identity}")]
    Forbidden { action: Action, identity: String },

    #[error("Operation not permitted: {0}")]
    NotPermitted(String),

    #[error("Backing store error: {0}")]
    BackingStore(#[source] anyhow::Error),
}

impl IdentityError {
    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            IdentityError::Validation(_) => "validation",
            IdentityError::Conflict(_) | IdentityError::RoleConflict(_) => "conflict",
            IdentityError::NotFound(_) => "not_found",
            IdentityError::Forbidden { .. } | IdentityError::NotPermitted(_) => "forbidden",
            IdentityError::BackingStore(_) => "backing_store",
        }
    }
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        let message = err.to_string();
        match err {
            IdentityError::Validation(e) => AppError::Unprocessable(anyhow::anyhow!(e)),
            IdentityError::Conflict(_) | IdentityError::RoleConflict(_) => {
                AppError::Conflict(anyhow::anyhow!(message))
            }
            IdentityError::NotFound(_) => AppError::NotFound(anyhow::anyhow!(message)),
            IdentityError::Forbidden { .. } | IdentityError::NotPermitted(_) => {
                AppError::Forbidden(anyhow::anyhow!(message))
            }
            IdentityError::BackingStore(e) => AppError::BadGateway(format!("{:#}", e)),
        }
    }
}
