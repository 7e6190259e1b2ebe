use crate::models::{AccountStatus, Identity};
use serde::Serialize;
use utoipa::ToSchema;

/// Dashboard counters. Derived on every read, never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct DashboardStats {
    pub total_identities: usize,
    pub active_connections: u64,
    pub revoked_count: usize,
    pub expiring_soon_count: usize,
}

pub fn aggregate<'a>(identities: impl IntoIterator<Item = &'a Identity>) -> DashboardStats {
    identities
        .into_iter()
        .fold(DashboardStats::default(), |mut stats, identity| {
            stats.total_identities += 1;
            match identity.account_status {
                AccountStatus::Active => {
                    stats.active_connections += u64::from(identity.connection_count)
                }
                AccountStatus::Revoked => stats.revoked_count += 1,
                AccountStatus::Expired => {}
            }
            // Only ever true for active identities.
            if identity.expiring_soon {
                stats.expiring_soon_count += 1;
            }
            stats
        })
}
