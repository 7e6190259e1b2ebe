use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Operations an operator may perform on a single identity.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, ToSchema,
)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    View,
    DownloadConfig,
    SetPassword,
    /// Read the routing policy without being able to save it.
    ViewRoutes,
    /// Read and save the routing policy.
    ManageRoutes,
    Revoke,
    Unrevoke,
    RotateCertificate,
    Delete,
}

impl Action {
    /// True for actions that change the roster or the backing store.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Action::SetPassword
                | Action::ManageRoutes
                | Action::Revoke
                | Action::Unrevoke
                | Action::RotateCertificate
                | Action::Delete
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Action::View => "view",
            Action::DownloadConfig => "downloadConfig",
            Action::SetPassword => "setPassword",
            Action::ViewRoutes => "viewRoutes",
            Action::ManageRoutes => "manageRoutes",
            Action::Revoke => "revoke",
            Action::Unrevoke => "unrevoke",
            Action::RotateCertificate => "rotateCertificate",
            Action::Delete => "delete",
        };
        f.write_str(name)
    }
}
