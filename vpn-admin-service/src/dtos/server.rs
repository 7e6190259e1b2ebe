use crate::models::{Module, ServerRole};
use crate::services::ServerInfo;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ServerInfoResponse {
    pub role: ServerRole,
    pub modules: Vec<Module>,
    /// Last sync reported by the sync agent; always absent on a primary.
    #[schema(value_type = Option<String>, format = "date-time")]
    pub last_successful_sync: Option<DateTime<Utc>>,
    pub creation_permitted: bool,
}

impl From<ServerInfo> for ServerInfoResponse {
    fn from(info: ServerInfo) -> Self {
        Self {
            role: info.role,
            modules: info.modules.iter().collect(),
            last_successful_sync: info.last_successful_sync,
            creation_permitted: info.creation_permitted,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SyncResponse {
    #[schema(value_type = String, format = "date-time")]
    pub last_successful_sync: DateTime<Utc>,
}
