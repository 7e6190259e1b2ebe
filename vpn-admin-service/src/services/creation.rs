//! Serialized identity creation.
//!
//! Certificate issuance is neither idempotent nor atomic with the name
//! uniqueness check, so every creation runs under one process-wide lock,
//! regardless of the requested name. Creation is rare; a per-name lock table
//! is not worth it.

use crate::models::{CreateIdentityOptions, IdentityRecord, IssuedCredential};
use crate::services::authority::CertificateAuthority;
use crate::services::store::IdentityStore;
use crate::services::IdentityError;
use crate::utils::validate_identity_name;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
pub struct CreationSerializer {
    lock: Mutex<()>,
}

impl CreationSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while some creation holds the lock.
    pub fn is_busy(&self) -> bool {
        self.lock.try_lock().is_err()
    }

    /// Validate, check uniqueness, issue and commit, all under the lock.
    ///
    /// Nothing is committed to the roster unless issuance succeeded. The lock
    /// is released on every exit path when the guard drops.
    pub async fn create(
        &self,
        store: &IdentityStore,
        authority: &dyn CertificateAuthority,
        name: &str,
        options: &CreateIdentityOptions,
    ) -> Result<(IdentityRecord, IssuedCredential), IdentityError> {
        validate_identity_name(name)?;
        if store.contains(name).await {
            return Err(IdentityError::Conflict(name.to_string()));
        }

        let _guard = self.lock.lock().await;

        // Another creation may have committed while we waited.
        if store.contains(name).await {
            return Err(IdentityError::Conflict(name.to_string()));
        }

        let credential = authority
            .issue_certificate(name, options)
            .await
            .map_err(IdentityError::BackingStore)?;

        let record = IdentityRecord::new(name).with_expiration(credential.expiration.clone());
        store.upsert(record.clone()).await;

        tracing::info!(identity = %name, serial = %credential.serial, "Identity created");
        Ok((record, credential))
    }
}
