//! Node role and the last confirmed sync with the primary.

use crate::models::ServerRole;
use crate::services::IdentityError;
use chrono::{DateTime, Utc};
use std::sync::RwLock;

#[derive(Debug)]
pub struct ReplicationState {
    role: ServerRole,
    last_successful_sync: RwLock<Option<DateTime<Utc>>>,
}

impl ReplicationState {
    pub fn new(role: ServerRole) -> Self {
        Self {
            role,
            last_successful_sync: RwLock::new(None),
        }
    }

    pub fn role(&self) -> ServerRole {
        self.role
    }

    /// Surfaced verbatim; staleness is not judged here. Always `None` on a
    /// primary.
    pub fn last_successful_sync(&self) -> Option<DateTime<Utc>> {
        self.last_successful_sync
            .read()
            .map(|guard| *guard)
            .unwrap_or_else(|poisoned| *poisoned.into_inner())
    }

    /// Record a completed sync reported by the sync agent.
    pub fn record_sync(&self, at: DateTime<Utc>) -> Result<(), IdentityError> {
        if self.role.is_primary() {
            return Err(IdentityError::RoleConflict(
                "this node is the primary and does not sync".to_string(),
            ));
        }
        let mut last = self
            .last_successful_sync
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *last = Some(at);
        Ok(())
    }
}
