use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use utoipa::ToSchema;

/// One pushed route. Order inside a policy is display order only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CustomRoute {
    #[schema(value_type = String, example = "192.168.1.0")]
    pub address: Ipv4Addr,
    #[schema(value_type = String, example = "255.255.255.0")]
    pub mask: Ipv4Addr,
    #[schema(example = "Office LAN")]
    pub description: String,
}

/// Client-specific network configuration, owned by exactly one identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RoutingPolicy {
    pub owner_identity: String,
    #[schema(value_type = Option<String>, example = "10.8.0.100")]
    pub assigned_address: Option<IpAddr>,
    pub custom_routes: Vec<CustomRoute>,
}

impl RoutingPolicy {
    /// Policy for an identity that never had one saved.
    pub fn empty(owner_identity: impl Into<String>) -> Self {
        Self {
            owner_identity: owner_identity.into(),
            assigned_address: None,
            custom_routes: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.assigned_address.is_none() && self.custom_routes.is_empty()
    }
}
