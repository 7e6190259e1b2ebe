//! OpenVPN client-config-dir backed routing policies.
//!
//! One file per identity, named after it:
//!
//! ```text
//! ifconfig-push 10.8.0.100 255.255.255.0
//! push "route 192.168.1.0 255.255.255.0" # Office LAN
//! ```

use crate::models::{CustomRoute, RoutingPolicy};
use crate::services::routing_store::RoutingPolicyStore;
use anyhow::Context;
use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct CcdDirectory {
    dir: PathBuf,
    client_netmask: Ipv4Addr,
}

impl CcdDirectory {
    pub fn new(dir: impl Into<PathBuf>, client_netmask: Ipv4Addr) -> Self {
        Self {
            dir: dir.into(),
            client_netmask,
        }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

/// Parse a CCD file. Lines this service does not manage are skipped.
pub fn parse_ccd(owner: &str, contents: &str) -> RoutingPolicy {
    let mut policy = RoutingPolicy::empty(owner);

    for line in contents.lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix("ifconfig-push ") {
            policy.assigned_address = rest
                .split_whitespace()
                .next()
                .and_then(|addr| addr.parse().ok());
        } else if let Some(rest) = line.strip_prefix("push \"route ") {
            let Some((route, tail)) = rest.split_once('"') else {
                tracing::debug!(owner, line, "Skipping malformed route line");
                continue;
            };
            let mut parts = route.split_whitespace();
            let address = parts.next().and_then(|a| a.parse().ok());
            let mask = parts.next().and_then(|m| m.parse().ok());
            let description = tail
                .trim()
                .strip_prefix('#')
                .map(|d| d.trim().to_string())
                .unwrap_or_default();

            match (address, mask) {
                (Some(address), Some(mask)) => policy.custom_routes.push(CustomRoute {
                    address,
                    mask,
                    description,
                }),
                _ => tracing::debug!(owner, line, "Skipping route with invalid address"),
            }
        }
    }

    policy
}

pub fn render_ccd(policy: &RoutingPolicy, client_netmask: Ipv4Addr) -> String {
    let mut out = String::new();
    if let Some(address) = policy.assigned_address {
        out.push_str(&format!("ifconfig-push {} {}\n", address, client_netmask));
    }
    for route in &policy.custom_routes {
        out.push_str(&format!("push \"route {} {}\"", route.address, route.mask));
        if !route.description.is_empty() {
            out.push_str(&format!(" # {}", route.description));
        }
        out.push('\n');
    }
    out
}

async fn write_atomically(path: &Path, contents: &str) -> Result<(), anyhow::Error> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, contents)
        .await
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("failed to move {} into place", path.display()))?;
    Ok(())
}

#[async_trait]
impl RoutingPolicyStore for CcdDirectory {
    async fn load_routing_policy(
        &self,
        name: &str,
    ) -> Result<Option<RoutingPolicy>, anyhow::Error> {
        let path = self.path_for(name);
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(parse_ccd(name, &contents))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(anyhow::Error::new(e).context(format!("failed to read {}", path.display()))),
        }
    }

    async fn persist_routing_policy(&self, policy: &RoutingPolicy) -> Result<(), anyhow::Error> {
        let path = self.path_for(&policy.owner_identity);
        write_atomically(&path, &render_ccd(policy, self.client_netmask)).await?;
        tracing::info!(
            identity = %policy.owner_identity,
            routes = policy.custom_routes.len(),
            "Routing policy written"
        );
        Ok(())
    }

    async fn remove_routing_policy(&self, name: &str) -> Result<(), anyhow::Error> {
        let path = self.path_for(name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(anyhow::Error::new(e).context(format!("failed to remove {}", path.display()))),
        }
    }
}
