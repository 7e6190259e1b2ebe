//! Identity operations exposed to the transport layer.
//!
//! Every operation on an existing identity resolves it at the current instant,
//! asks the capability matrix, and only then touches a collaborator.

use crate::models::{
    AccountStatus, Action, CreateIdentityOptions, Identity, IdentityRecord, Module, ModuleSet,
    OperatorContext, RoutingPolicy, ServerRole,
};
use crate::services::authority::CertificateAuthority;
use crate::services::capability::{self, ActionSet};
use crate::services::clock::Clock;
use crate::services::creation::CreationSerializer;
use crate::services::lifecycle::{build_identity, format_timestamp};
use crate::services::management::ConnectionSource;
use crate::services::metrics::record_operation;
use crate::services::replication::ReplicationState;
use crate::services::routing_store::RoutingPolicyStore;
use crate::services::stats::{aggregate, DashboardStats};
use crate::services::store::IdentityStore;
use crate::services::IdentityError;
use crate::utils::{validate_password, validate_routing_policy};
use chrono::{DateTime, Utc};
use std::sync::Arc;

const REFRESH_ATTEMPTS: u32 = 3;

/// Roster filter. Search is a case-insensitive substring match on the name.
#[derive(Debug, Clone, Default)]
pub struct IdentityFilter {
    pub search: Option<String>,
    pub hide_revoked: bool,
}

impl IdentityFilter {
    fn matches(&self, identity: &Identity) -> bool {
        if self.hide_revoked && identity.account_status == AccountStatus::Revoked {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => identity
                .name
                .to_lowercase()
                .contains(&needle.to_lowercase()),
            _ => true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub role: ServerRole,
    pub modules: ModuleSet,
    pub last_successful_sync: Option<DateTime<Utc>>,
    pub creation_permitted: bool,
}

pub struct IdentityService {
    store: IdentityStore,
    creation: CreationSerializer,
    replication: ReplicationState,
    modules: ModuleSet,
    authority: Arc<dyn CertificateAuthority>,
    routing: Arc<dyn RoutingPolicyStore>,
    connections: Arc<dyn ConnectionSource>,
    clock: Arc<dyn Clock>,
}

impl IdentityService {
    pub fn new(
        role: ServerRole,
        modules: ModuleSet,
        authority: Arc<dyn CertificateAuthority>,
        routing: Arc<dyn RoutingPolicyStore>,
        connections: Arc<dyn ConnectionSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store: IdentityStore::new(),
            creation: CreationSerializer::new(),
            replication: ReplicationState::new(role),
            modules,
            authority,
            routing,
            connections,
            clock,
        }
    }

    pub fn operator_context(&self) -> OperatorContext {
        OperatorContext::new(self.replication.role(), self.modules.clone())
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn store(&self) -> &IdentityStore {
        &self.store
    }

    pub fn server_info(&self) -> ServerInfo {
        let role = self.replication.role();
        ServerInfo {
            role,
            modules: self.modules.clone(),
            last_successful_sync: self.replication.last_successful_sync(),
            creation_permitted: capability::creation_permitted(role),
        }
    }

    /// Actions the current operator may perform on an identity in `status`.
    pub fn permitted_actions(&self, status: AccountStatus) -> ActionSet {
        capability::permitted_actions(self.replication.role(), &self.modules, status)
    }

    /// Classified roster, ordered by name, filtered.
    pub async fn list_identities(&self, filter: &IdentityFilter) -> Vec<Identity> {
        let now = self.now();
        self.store
            .list(now)
            .await
            .into_iter()
            .filter(|identity| filter.matches(identity))
            .collect()
    }

    pub async fn get_identity(&self, name: &str) -> Result<Identity, IdentityError> {
        self.store.find(name, self.now()).await
    }

    /// Counters over the whole, unfiltered roster.
    pub async fn dashboard(&self) -> DashboardStats {
        let identities = self.store.list(self.now()).await;
        aggregate(&identities)
    }

    pub async fn create_identity(
        &self,
        name: &str,
        options: CreateIdentityOptions,
    ) -> Result<Identity, IdentityError> {
        let result = self.create_inner(name, options).await;
        self.finish("create", name, result)
    }

    async fn create_inner(
        &self,
        name: &str,
        options: CreateIdentityOptions,
    ) -> Result<Identity, IdentityError> {
        if !capability::creation_permitted(self.replication.role()) {
            return Err(IdentityError::NotPermitted(
                "Identities can only be created on the primary".to_string(),
            ));
        }
        let options = self.password_options(options)?;

        let (record, _credential) = self
            .creation
            .create(&self.store, self.authority.as_ref(), name, &options)
            .await?;

        self.refresh_after_mutation("create").await;
        let now = self.now();
        Ok(self
            .store
            .find(name, now)
            .await
            .unwrap_or_else(|_| build_identity(&record, now)))
    }

    pub async fn revoke_identity(&self, name: &str) -> Result<Identity, IdentityError> {
        let result = self.revoke_inner(name).await;
        self.finish("revoke", name, result)
    }

    async fn revoke_inner(&self, name: &str) -> Result<Identity, IdentityError> {
        self.authorize(name, Action::Revoke).await?;
        self.authority
            .revoke_certificate(name)
            .await
            .map_err(IdentityError::BackingStore)?;

        let now = self.now();
        self.update_record(name, |record| {
            record.revocation = Some(format_timestamp(now));
            record.connection_count = 0;
        })
        .await?;
        self.refresh_after_mutation("revoke").await;
        self.store.find(name, self.now()).await
    }

    pub async fn unrevoke_identity(&self, name: &str) -> Result<Identity, IdentityError> {
        let result = self.unrevoke_inner(name).await;
        self.finish("unrevoke", name, result)
    }

    async fn unrevoke_inner(&self, name: &str) -> Result<Identity, IdentityError> {
        self.authorize(name, Action::Unrevoke).await?;
        self.authority
            .unrevoke_certificate(name)
            .await
            .map_err(IdentityError::BackingStore)?;

        self.update_record(name, |record| record.revocation = None)
            .await?;
        self.refresh_after_mutation("unrevoke").await;
        self.store.find(name, self.now()).await
    }

    pub async fn rotate_identity(
        &self,
        name: &str,
        options: CreateIdentityOptions,
    ) -> Result<Identity, IdentityError> {
        let result = self.rotate_inner(name, options).await;
        self.finish("rotate", name, result)
    }

    async fn rotate_inner(
        &self,
        name: &str,
        options: CreateIdentityOptions,
    ) -> Result<Identity, IdentityError> {
        self.authorize(name, Action::RotateCertificate).await?;
        let options = self.password_options(options)?;
        let credential = self
            .authority
            .rotate_certificate(name, &options)
            .await
            .map_err(IdentityError::BackingStore)?;

        self.update_record(name, |record| {
            record.expiration = Some(credential.expiration.clone());
            record.revocation = None;
            record.connection_count = 0;
        })
        .await?;
        self.refresh_after_mutation("rotate").await;
        self.store.find(name, self.now()).await
    }

    pub async fn delete_identity(&self, name: &str) -> Result<(), IdentityError> {
        let result = self.delete_inner(name).await;
        self.finish("delete", name, result)
    }

    async fn delete_inner(&self, name: &str) -> Result<(), IdentityError> {
        self.authorize(name, Action::Delete).await?;
        self.authority
            .delete_certificate(name)
            .await
            .map_err(IdentityError::BackingStore)?;

        self.store.remove(name).await?;
        if let Err(e) = self.routing.remove_routing_policy(name).await {
            tracing::error!(identity = %name, error = %e, "Failed to remove routing policy of deleted identity");
        }
        self.refresh_after_mutation("delete").await;
        Ok(())
    }

    pub async fn set_password(&self, name: &str, password: &str) -> Result<(), IdentityError> {
        let result = self.set_password_inner(name, password).await;
        self.finish("set_password", name, result)
    }

    async fn set_password_inner(&self, name: &str, password: &str) -> Result<(), IdentityError> {
        self.authorize(name, Action::SetPassword).await?;
        validate_password(password)?;
        self.authority
            .set_password(name, password)
            .await
            .map_err(IdentityError::BackingStore)
    }

    /// Rendered client profile.
    pub async fn client_config(&self, name: &str) -> Result<String, IdentityError> {
        self.authorize(name, Action::DownloadConfig).await?;
        self.authority
            .client_config(name)
            .await
            .map_err(IdentityError::BackingStore)
    }

    /// Saved policy, or an empty one when nothing was saved yet.
    pub async fn get_routing_policy(&self, name: &str) -> Result<RoutingPolicy, IdentityError> {
        self.authorize(name, Action::ViewRoutes).await?;
        Ok(self
            .routing
            .load_routing_policy(name)
            .await
            .map_err(IdentityError::BackingStore)?
            .unwrap_or_else(|| RoutingPolicy::empty(name)))
    }

    pub async fn save_routing_policy(
        &self,
        name: &str,
        policy: RoutingPolicy,
    ) -> Result<RoutingPolicy, IdentityError> {
        let result = self.save_routing_policy_inner(name, policy).await;
        self.finish("save_routing_policy", name, result)
    }

    async fn save_routing_policy_inner(
        &self,
        name: &str,
        mut policy: RoutingPolicy,
    ) -> Result<RoutingPolicy, IdentityError> {
        self.authorize(name, Action::ManageRoutes).await?;
        policy.owner_identity = name.to_string();
        validate_routing_policy(&policy)?;
        self.routing
            .persist_routing_policy(&policy)
            .await
            .map_err(IdentityError::BackingStore)?;
        Ok(policy)
    }

    /// Reload the roster from the certificate authority and merge live
    /// connection counts. Returns the number of identities loaded.
    ///
    /// A listing that raced a local mutation is discarded and taken again;
    /// after a few lost races the roster is left as the mutations wrote it.
    /// An unreachable connection source degrades to zero connections.
    pub async fn refresh(&self) -> Result<usize, IdentityError> {
        for attempt in 1..=REFRESH_ATTEMPTS {
            let seen = self.store.revision();
            let records = self.load_records().await?;
            let loaded = records.len();
            if self.store.replace_all_if(seen, records).await {
                tracing::debug!(identities = loaded, "Roster refreshed");
                return Ok(loaded);
            }
            tracing::debug!(attempt, "Roster changed during refresh, listing again");
        }
        tracing::warn!(
            attempts = REFRESH_ATTEMPTS,
            "Roster kept changing during refresh, keeping local state"
        );
        Ok(self.store.len().await)
    }

    async fn load_records(&self) -> Result<Vec<IdentityRecord>, IdentityError> {
        let mut records = self
            .authority
            .list_records()
            .await
            .map_err(IdentityError::BackingStore)?;

        let counts = match self.connections.connection_counts().await {
            Ok(counts) => counts,
            Err(e) => {
                tracing::warn!(error = %e, "Connection counts unavailable");
                Default::default()
            }
        };
        for record in &mut records {
            record.connection_count = counts.get(&record.name).copied().unwrap_or(0);
        }
        Ok(records)
    }

    /// Record a sync reported by the sync agent, then reload the roster.
    pub async fn record_sync(&self) -> Result<DateTime<Utc>, IdentityError> {
        let at = self.now();
        self.replication.record_sync(at)?;
        tracing::info!(synced_at = %at, "Replica sync recorded");
        self.refresh_after_mutation("sync").await;
        Ok(at)
    }

    /// Resolve `name` now and check `action` against the capability matrix.
    async fn authorize(&self, name: &str, action: Action) -> Result<Identity, IdentityError> {
        let identity = self.store.find(name, self.now()).await?;
        let ctx = self.operator_context();
        if !capability::is_permitted(&ctx, identity.account_status, action) {
            tracing::warn!(
                identity = %name,
                action = %action,
                status = %identity.account_status,
                role = %ctx.role,
                "Action denied"
            );
            return Err(IdentityError::Forbidden {
                action,
                identity: name.to_string(),
            });
        }
        Ok(identity)
    }

    /// Password handling for issuance: required with password auth, dropped
    /// otherwise.
    fn password_options(
        &self,
        options: CreateIdentityOptions,
    ) -> Result<CreateIdentityOptions, IdentityError> {
        if !self.modules.contains(Module::PasswordAuth) {
            return Ok(CreateIdentityOptions::default());
        }
        match options.password.as_deref() {
            Some(password) => validate_password(password)?,
            None => {
                return Err(IdentityError::Validation(
                    "Password is required when password authentication is enabled".to_string(),
                ))
            }
        }
        Ok(options)
    }

    async fn update_record(
        &self,
        name: &str,
        apply: impl FnOnce(&mut IdentityRecord),
    ) -> Result<(), IdentityError> {
        let mut record = self
            .store
            .record(name)
            .await
            .ok_or_else(|| IdentityError::NotFound(name.to_string()))?;
        apply(&mut record);
        self.store.upsert(record).await;
        Ok(())
    }

    async fn refresh_after_mutation(&self, operation: &str) {
        if let Err(e) = self.refresh().await {
            tracing::error!(operation, error = %e, "Roster refresh failed after mutation");
        }
    }

    fn finish<T>(
        &self,
        operation: &'static str,
        name: &str,
        result: Result<T, IdentityError>,
    ) -> Result<T, IdentityError> {
        match &result {
            Ok(_) => {
                record_operation(operation, "ok");
                tracing::info!(identity = %name, operation, "Identity operation succeeded");
            }
            Err(e) => {
                record_operation(operation, e.kind());
                tracing::warn!(identity = %name, operation, error = %e, "Identity operation failed");
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CustomRoute;
    use crate::services::authority::{AuthorityCall, MockCertificateAuthority};
    use crate::services::clock::FixedClock;
    use crate::services::management::StaticConnections;
    use crate::services::routing_store::InMemoryRoutingStore;
    use chrono::{Duration, TimeZone};
    use std::net::Ipv4Addr;

    struct Harness {
        service: IdentityService,
        authority: Arc<MockCertificateAuthority>,
        routing: Arc<InMemoryRoutingStore>,
        connections: Arc<StaticConnections>,
        clock: Arc<FixedClock>,
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    async fn harness(role: ServerRole, modules: ModuleSet) -> Harness {
        let clock = Arc::new(FixedClock::new(now()));
        let authority = Arc::new(
            MockCertificateAuthority::new()
                .with_clock(clock.clone())
                .with_records([
                    IdentityRecord::new("alice")
                        .with_expiration(format_timestamp(now() + Duration::days(10))),
                    IdentityRecord::new("bob")
                        .with_expiration(format_timestamp(now() + Duration::days(365))),
                    IdentityRecord::new("charlie")
                        .with_expiration(format_timestamp(now() + Duration::days(365)))
                        .with_revocation("2025-05-01 00:00:00"),
                    IdentityRecord::new("dave")
                        .with_expiration(format_timestamp(now() - Duration::days(5))),
                ]),
        );
        let routing = Arc::new(InMemoryRoutingStore::new());
        let connections = Arc::new(StaticConnections::new());
        connections.set("alice", 2);
        connections.set("charlie", 1);

        let service = IdentityService::new(
            role,
            modules,
            authority.clone(),
            routing.clone(),
            connections.clone(),
            clock.clone(),
        );
        service.refresh().await.unwrap();

        Harness {
            service,
            authority,
            routing,
            connections,
            clock,
        }
    }

    fn all_modules() -> ModuleSet {
        ModuleSet::new([Module::PasswordAuth, Module::PerClientRouting])
    }

    fn names(identities: &[Identity]) -> Vec<&str> {
        identities.iter().map(|i| i.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_search_is_substring_match() {
        let h = harness(ServerRole::Primary, ModuleSet::core_only()).await;
        let filter = IdentityFilter {
            search: Some("ali".to_string()),
            hide_revoked: false,
        };
        assert_eq!(names(&h.service.list_identities(&filter).await), vec!["alice"]);
    }

    #[tokio::test]
    async fn test_hide_revoked_preserves_order() {
        let h = harness(ServerRole::Primary, ModuleSet::core_only()).await;
        let filter = IdentityFilter {
            search: None,
            hide_revoked: true,
        };
        assert_eq!(
            names(&h.service.list_identities(&filter).await),
            vec!["alice", "bob", "dave"]
        );
    }

    #[tokio::test]
    async fn test_dashboard_reflects_classification() {
        let h = harness(ServerRole::Primary, ModuleSet::core_only()).await;
        let stats = h.service.dashboard().await;
        assert_eq!(stats.total_identities, 4);
        // charlie is connected but revoked and does not count.
        assert_eq!(stats.active_connections, 2);
        assert_eq!(stats.revoked_count, 1);
        assert_eq!(stats.expiring_soon_count, 1);
    }

    #[tokio::test]
    async fn test_classification_follows_the_clock() {
        let h = harness(ServerRole::Primary, ModuleSet::core_only()).await;
        h.clock.advance(Duration::days(11));
        let alice = h.service.get_identity("alice").await.unwrap();
        assert_eq!(alice.account_status, AccountStatus::Expired);
        assert!(!alice.expiring_soon);
    }

    #[tokio::test]
    async fn test_create_on_primary() {
        let h = harness(ServerRole::Primary, ModuleSet::core_only()).await;
        let created = h
            .service
            .create_identity("erin", CreateIdentityOptions::default())
            .await
            .unwrap();
        assert_eq!(created.account_status, AccountStatus::Active);
        assert_eq!(h.service.dashboard().await.total_identities, 5);

        let err = h
            .service
            .create_identity("erin", CreateIdentityOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_create_requires_password_with_password_auth() {
        let h = harness(ServerRole::Primary, all_modules()).await;
        let err = h
            .service
            .create_identity("erin", CreateIdentityOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::Validation(_)));

        let err = h
            .service
            .create_identity("erin", CreateIdentityOptions::with_password("12345"))
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::Validation(_)));
        assert!(h.authority.calls().is_empty());

        h.service
            .create_identity("erin", CreateIdentityOptions::with_password("s3cret!"))
            .await
            .unwrap();
        assert_eq!(h.authority.password_of("erin").as_deref(), Some("s3cret!"));
    }

    #[tokio::test]
    async fn test_password_is_ignored_without_password_auth() {
        let h = harness(ServerRole::Primary, ModuleSet::core_only()).await;
        h.service
            .create_identity("erin", CreateIdentityOptions::with_password("s3cret!"))
            .await
            .unwrap();
        assert_eq!(h.authority.password_of("erin"), None);
    }

    #[tokio::test]
    async fn test_replica_never_reaches_the_authority() {
        let h = harness(ServerRole::Replica, all_modules()).await;

        let err = h
            .service
            .create_identity("erin", CreateIdentityOptions::with_password("s3cret!"))
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::NotPermitted(_)));

        assert!(matches!(
            h.service.revoke_identity("alice").await,
            Err(IdentityError::Forbidden { action: Action::Revoke, .. })
        ));
        assert!(matches!(
            h.service.set_password("alice", "s3cret!").await,
            Err(IdentityError::Forbidden { .. })
        ));
        assert!(matches!(
            h.service.unrevoke_identity("charlie").await,
            Err(IdentityError::Forbidden { .. })
        ));
        assert!(matches!(
            h.service
                .rotate_identity("dave", CreateIdentityOptions::with_password("s3cret!"))
                .await,
            Err(IdentityError::Forbidden { .. })
        ));
        assert!(matches!(
            h.service.delete_identity("dave").await,
            Err(IdentityError::Forbidden { .. })
        ));
        assert!(matches!(
            h.service
                .save_routing_policy("alice", RoutingPolicy::empty("alice"))
                .await,
            Err(IdentityError::Forbidden { action: Action::ManageRoutes, .. })
        ));

        assert!(h.authority.calls().is_empty());

        // Read paths still work.
        assert!(h.service.client_config("alice").await.is_ok());
        assert!(h.service.get_routing_policy("alice").await.is_ok());
    }

    #[tokio::test]
    async fn test_revoke_then_unrevoke() {
        let h = harness(ServerRole::Primary, ModuleSet::core_only()).await;

        let revoked = h.service.revoke_identity("alice").await.unwrap();
        assert_eq!(revoked.account_status, AccountStatus::Revoked);
        assert_eq!(revoked.connection_count, 0);
        assert_eq!(revoked.revocation_date.as_deref(), Some("2025-06-01 12:00:00"));

        // Revoking twice is not in the matrix for a revoked identity.
        assert!(matches!(
            h.service.revoke_identity("alice").await,
            Err(IdentityError::Forbidden { .. })
        ));

        let restored = h.service.unrevoke_identity("alice").await.unwrap();
        assert_eq!(restored.account_status, AccountStatus::Active);
        assert_eq!(restored.revocation_date, None);
    }

    #[tokio::test]
    async fn test_rotate_expired_identity() {
        let h = harness(ServerRole::Primary, ModuleSet::core_only()).await;
        let rotated = h
            .service
            .rotate_identity("dave", CreateIdentityOptions::default())
            .await
            .unwrap();
        assert_eq!(rotated.account_status, AccountStatus::Active);
        assert!(!rotated.expiring_soon);
        assert!(h
            .authority
            .calls()
            .contains(&AuthorityCall::Rotate("dave".to_string())));
    }

    #[tokio::test]
    async fn test_active_identity_cannot_be_deleted() {
        let h = harness(ServerRole::Primary, ModuleSet::core_only()).await;
        assert!(matches!(
            h.service.delete_identity("bob").await,
            Err(IdentityError::Forbidden { action: Action::Delete, .. })
        ));
        assert!(h.authority.calls().is_empty());
    }

    #[tokio::test]
    async fn test_delete_removes_routing_policy() {
        let h = harness(ServerRole::Primary, all_modules()).await;
        h.routing
            .persist_routing_policy(&RoutingPolicy {
                owner_identity: "charlie".to_string(),
                assigned_address: Some("10.8.0.50".parse().unwrap()),
                custom_routes: Vec::new(),
            })
            .await
            .unwrap();

        h.service.delete_identity("charlie").await.unwrap();

        assert!(matches!(
            h.service.get_identity("charlie").await,
            Err(IdentityError::NotFound(_))
        ));
        assert_eq!(h.routing.load_routing_policy("charlie").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_backing_store_failure_leaves_roster_unchanged() {
        let h = harness(ServerRole::Primary, ModuleSet::core_only()).await;
        let before = h.service.store().snapshot().await;

        h.authority.fail_with("easyrsa: revoke failed");
        let err = h.service.revoke_identity("alice").await.unwrap_err();
        assert!(matches!(err, IdentityError::BackingStore(_)));
        assert_eq!(h.service.store().snapshot().await, before);
    }

    #[tokio::test]
    async fn test_unknown_identity_is_not_found() {
        let h = harness(ServerRole::Primary, all_modules()).await;
        assert!(matches!(
            h.service.revoke_identity("ghost").await,
            Err(IdentityError::NotFound(_))
        ));
        assert!(matches!(
            h.service.get_routing_policy("ghost").await,
            Err(IdentityError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_set_password() {
        let h = harness(ServerRole::Primary, all_modules()).await;
        assert!(matches!(
            h.service.set_password("alice", "abc").await,
            Err(IdentityError::Validation(_))
        ));
        h.service.set_password("alice", "n3w-secret").await.unwrap();
        assert_eq!(h.authority.password_of("alice").as_deref(), Some("n3w-secret"));
    }

    #[tokio::test]
    async fn test_set_password_needs_module() {
        let h = harness(ServerRole::Primary, ModuleSet::core_only()).await;
        assert!(matches!(
            h.service.set_password("alice", "n3w-secret").await,
            Err(IdentityError::Forbidden { action: Action::SetPassword, .. })
        ));
    }

    #[tokio::test]
    async fn test_routing_policy_round_trip() {
        let h = harness(ServerRole::Primary, all_modules()).await;
        assert!(h.service.get_routing_policy("alice").await.unwrap().is_empty());

        let policy = RoutingPolicy {
            // Owner is taken from the path, not the body.
            owner_identity: "someone-else".to_string(),
            assigned_address: Some("10.8.0.100".parse().unwrap()),
            custom_routes: vec![
                CustomRoute {
                    address: Ipv4Addr::new(192, 168, 2, 0),
                    mask: Ipv4Addr::new(255, 255, 255, 0),
                    description: "Lab".to_string(),
                },
                CustomRoute {
                    address: Ipv4Addr::new(192, 168, 1, 0),
                    mask: Ipv4Addr::new(255, 255, 255, 0),
                    description: "Office".to_string(),
                },
            ],
        };
        let saved = h.service.save_routing_policy("alice", policy).await.unwrap();
        assert_eq!(saved.owner_identity, "alice");

        let loaded = h.service.get_routing_policy("alice").await.unwrap();
        assert_eq!(loaded, saved);
    }

    #[tokio::test]
    async fn test_routing_needs_module() {
        let h = harness(ServerRole::Primary, ModuleSet::core_only()).await;
        assert!(matches!(
            h.service.get_routing_policy("alice").await,
            Err(IdentityError::Forbidden { action: Action::ViewRoutes, .. })
        ));
    }

    #[tokio::test]
    async fn test_refresh_merges_connection_counts() {
        let h = harness(ServerRole::Primary, ModuleSet::core_only()).await;
        h.connections.set("bob", 3);
        h.service.refresh().await.unwrap();
        let bob = h.service.get_identity("bob").await.unwrap();
        assert_eq!(bob.connection_count, 3);
    }

    #[tokio::test]
    async fn test_stale_refresh_cannot_undo_a_creation() {
        let h = harness(ServerRole::Primary, ModuleSet::core_only()).await;
        let service = Arc::new(h.service);
        h.authority
            .slow_next_listing(std::time::Duration::from_millis(200));

        let refresh = {
            let service = service.clone();
            tokio::spawn(async move { service.refresh().await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        service
            .create_identity("erin", CreateIdentityOptions::default())
            .await
            .unwrap();
        refresh.await.unwrap().unwrap();

        assert!(service.get_identity("erin").await.is_ok());
        let err = service
            .create_identity("erin", CreateIdentityOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::Conflict(_)));

        let issued = h
            .authority
            .calls()
            .into_iter()
            .filter(|c| *c == AuthorityCall::Issue("erin".to_string()))
            .count();
        assert_eq!(issued, 1);
    }

    #[tokio::test]
    async fn test_stale_refresh_cannot_undo_a_revocation() {
        let h = harness(ServerRole::Primary, ModuleSet::core_only()).await;
        let service = Arc::new(h.service);
        h.authority
            .slow_next_listing(std::time::Duration::from_millis(200));

        let refresh = {
            let service = service.clone();
            tokio::spawn(async move { service.refresh().await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        service.revoke_identity("bob").await.unwrap();
        refresh.await.unwrap().unwrap();

        let bob = service.get_identity("bob").await.unwrap();
        assert_eq!(bob.account_status, AccountStatus::Revoked);
    }

    #[tokio::test]
    async fn test_sync_report_only_on_replica() {
        let primary = harness(ServerRole::Primary, ModuleSet::core_only()).await;
        assert!(matches!(
            primary.service.record_sync().await,
            Err(IdentityError::RoleConflict(_))
        ));

        let replica = harness(ServerRole::Replica, ModuleSet::core_only()).await;
        let at = replica.service.record_sync().await.unwrap();
        assert_eq!(at, now());
        assert_eq!(replica.service.server_info().last_successful_sync, Some(now()));
    }
}
