use crate::models::{CustomRoute, RoutingPolicy};
use crate::services::IdentityError;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CustomRouteRequest {
    #[schema(example = "192.168.1.0")]
    pub address: String,
    #[schema(example = "255.255.255.0")]
    pub mask: String,
    #[serde(default)]
    #[validate(length(max = 256, message = "Description must be at most 256 characters"))]
    #[schema(example = "Office LAN")]
    pub description: String,
}

/// Body of `PUT /api/identities/:name/routes`. Addresses arrive as text and
/// must be IP literals.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RoutingPolicyRequest {
    #[schema(example = "10.8.0.100")]
    pub assigned_address: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub custom_routes: Vec<CustomRouteRequest>,
}

fn ip_literal<T: std::str::FromStr>(field: &str, raw: &str) -> Result<T, IdentityError> {
    raw.trim()
        .parse()
        .map_err(|_| IdentityError::Validation(format!("{} {:?} is not an IP address", field, raw)))
}

impl RoutingPolicyRequest {
    pub fn into_policy(self, owner: &str) -> Result<RoutingPolicy, IdentityError> {
        let assigned_address = match self.assigned_address.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(ip_literal::<IpAddr>("assigned_address", raw)?),
            _ => None,
        };

        let custom_routes = self
            .custom_routes
            .into_iter()
            .map(|route| {
                Ok(CustomRoute {
                    address: ip_literal::<Ipv4Addr>("route address", &route.address)?,
                    mask: ip_literal::<Ipv4Addr>("route mask", &route.mask)?,
                    description: route.description.trim().to_string(),
                })
            })
            .collect::<Result<Vec<_>, IdentityError>>()?;

        Ok(RoutingPolicy {
            owner_identity: owner.to_string(),
            assigned_address,
            custom_routes,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoutingPolicyResponse {
    #[serde(flatten)]
    pub policy: RoutingPolicy,
    /// Whether the caller may save changes.
    pub editable: bool,
}
