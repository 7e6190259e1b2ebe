use crate::models::{CreateIdentityOptions, IdentityRecord, IssuedCredential};
use crate::services::clock::{Clock, SystemClock};
use crate::services::lifecycle::format_timestamp;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Certificate tooling the core drives as opaque, side-effecting calls.
///
/// Calls are treated as blocking and non-reentrant; the service never issues
/// two creations concurrently.
#[async_trait]
pub trait CertificateAuthority: Send + Sync {
    /// Current raw roster as the PKI sees it, without connection counts.
    async fn list_records(&self) -> Result<Vec<IdentityRecord>, anyhow::Error>;

    async fn issue_certificate(
        &self,
        name: &str,
        options: &CreateIdentityOptions,
    ) -> Result<IssuedCredential, anyhow::Error>;

    async fn revoke_certificate(&self, name: &str) -> Result<(), anyhow::Error>;

    async fn unrevoke_certificate(&self, name: &str) -> Result<(), anyhow::Error>;

    async fn rotate_certificate(
        &self,
        name: &str,
        options: &CreateIdentityOptions,
    ) -> Result<IssuedCredential, anyhow::Error>;

    async fn delete_certificate(&self, name: &str) -> Result<(), anyhow::Error>;

    async fn set_password(&self, name: &str, password: &str) -> Result<(), anyhow::Error>;

    /// Rendered client profile for download.
    async fn client_config(&self, name: &str) -> Result<String, anyhow::Error>;
}

/// Operations recorded by [`MockCertificateAuthority`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorityCall {
    Issue(String),
    Revoke(String),
    Unrevoke(String),
    Rotate(String),
    Delete(String),
    SetPassword(String),
}

/// In-memory PKI for tests and local development.
pub struct MockCertificateAuthority {
    clock: Arc<dyn Clock>,
    validity: chrono::Duration,
    issue_delay: Duration,
    records: Mutex<BTreeMap<String, IdentityRecord>>,
    passwords: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<AuthorityCall>>,
    failing: Mutex<Option<String>>,
    list_delay: Mutex<Option<Duration>>,
    next_serial: Mutex<u64>,
}

impl Default for MockCertificateAuthority {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCertificateAuthority {
    pub fn new() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            validity: chrono::Duration::days(825),
            issue_delay: Duration::ZERO,
            records: Mutex::new(BTreeMap::new()),
            passwords: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(None),
            list_delay: Mutex::new(None),
            next_serial: Mutex::new(1),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Make issuance slow enough for concurrent callers to overlap.
    pub fn with_issue_delay(mut self, delay: Duration) -> Self {
        self.issue_delay = delay;
        self
    }

    pub fn with_records(self, records: impl IntoIterator<Item = IdentityRecord>) -> Self {
        if let Ok(mut map) = self.records.lock() {
            map.extend(records.into_iter().map(|r| (r.name.clone(), r)));
        }
        self
    }

    /// Every following call fails with `message` until cleared.
    pub fn fail_with(&self, message: impl Into<String>) {
        if let Ok(mut failing) = self.failing.lock() {
            *failing = Some(message.into());
        }
    }

    pub fn clear_failure(&self) {
        if let Ok(mut failing) = self.failing.lock() {
            *failing = None;
        }
    }

    /// The next listing copies the roster, then waits `delay` before
    /// returning that copy.
    pub fn slow_next_listing(&self, delay: Duration) {
        if let Ok(mut list_delay) = self.list_delay.lock() {
            *list_delay = Some(delay);
        }
    }

    pub fn calls(&self) -> Vec<AuthorityCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn password_of(&self, name: &str) -> Option<String> {
        self.passwords.lock().ok()?.get(name).cloned()
    }

    fn check_failure(&self) -> Result<(), anyhow::Error> {
        let failing = self
            .failing
            .lock()
            .map_err(|e| anyhow::anyhow!("Mock authority mutex poisoned: {}", e))?;
        match failing.as_ref() {
            Some(message) => Err(anyhow::anyhow!(message.clone())),
            None => Ok(()),
        }
    }

    fn record_call(&self, call: AuthorityCall) -> Result<(), anyhow::Error> {
        self.calls
            .lock()
            .map_err(|e| anyhow::anyhow!("Mock authority mutex poisoned: {}", e))?
            .push(call);
        Ok(())
    }

    fn records(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, IdentityRecord>>, anyhow::Error> {
        self.records
            .lock()
            .map_err(|e| anyhow::anyhow!("Mock authority mutex poisoned: {}", e))
    }

    fn mint(&self, name: &str, options: &CreateIdentityOptions) -> Result<IssuedCredential, anyhow::Error> {
        let serial = {
            let mut next = self
                .next_serial
                .lock()
                .map_err(|e| anyhow::anyhow!("Mock authority mutex poisoned: {}", e))?;
            let serial = format!("{:02X}", *next);
            *next += 1;
            serial
        };
        let credential = IssuedCredential {
            serial,
            expiration: format_timestamp(self.clock.now() + self.validity),
        };

        self.records()?.insert(
            name.to_string(),
            IdentityRecord::new(name).with_expiration(credential.expiration.clone()),
        );
        if let Some(password) = &options.password {
            self.passwords
                .lock()
                .map_err(|e| anyhow::anyhow!("Mock authority mutex poisoned: {}", e))?
                .insert(name.to_string(), password.clone());
        }
        Ok(credential)
    }
}

#[async_trait]
impl CertificateAuthority for MockCertificateAuthority {
    async fn list_records(&self) -> Result<Vec<IdentityRecord>, anyhow::Error> {
        self.check_failure()?;
        let listed: Vec<IdentityRecord> = self.records()?.values().cloned().collect();
        let delay = self
            .list_delay
            .lock()
            .map_err(|e| anyhow::anyhow!("Mock authority mutex poisoned: {}", e))?
            .take();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(listed)
    }

    async fn issue_certificate(
        &self,
        name: &str,
        options: &CreateIdentityOptions,
    ) -> Result<IssuedCredential, anyhow::Error> {
        self.record_call(AuthorityCall::Issue(name.to_string()))?;
        if !self.issue_delay.is_zero() {
            tokio::time::sleep(self.issue_delay).await;
        }
        self.check_failure()?;
        if self.records()?.contains_key(name) {
            anyhow::bail!("certificate for {} already exists", name);
        }
        self.mint(name, options)
    }

    async fn revoke_certificate(&self, name: &str) -> Result<(), anyhow::Error> {
        self.record_call(AuthorityCall::Revoke(name.to_string()))?;
        self.check_failure()?;
        let revoked_at = format_timestamp(self.clock.now());
        let mut records = self.records()?;
        let record = records
            .get_mut(name)
            .ok_or_else(|| anyhow::anyhow!("no certificate for {}", name))?;
        record.revocation = Some(revoked_at);
        Ok(())
    }

    async fn unrevoke_certificate(&self, name: &str) -> Result<(), anyhow::Error> {
        self.record_call(AuthorityCall::Unrevoke(name.to_string()))?;
        self.check_failure()?;
        let mut records = self.records()?;
        let record = records
            .get_mut(name)
            .ok_or_else(|| anyhow::anyhow!("no certificate for {}", name))?;
        record.revocation = None;
        Ok(())
    }

    async fn rotate_certificate(
        &self,
        name: &str,
        options: &CreateIdentityOptions,
    ) -> Result<IssuedCredential, anyhow::Error> {
        self.record_call(AuthorityCall::Rotate(name.to_string()))?;
        self.check_failure()?;
        if !self.records()?.contains_key(name) {
            anyhow::bail!("no certificate for {}", name);
        }
        self.mint(name, options)
    }

    async fn delete_certificate(&self, name: &str) -> Result<(), anyhow::Error> {
        self.record_call(AuthorityCall::Delete(name.to_string()))?;
        self.check_failure()?;
        self.records()?
            .remove(name)
            .ok_or_else(|| anyhow::anyhow!("no certificate for {}", name))?;
        Ok(())
    }

    async fn set_password(&self, name: &str, password: &str) -> Result<(), anyhow::Error> {
        self.record_call(AuthorityCall::SetPassword(name.to_string()))?;
        self.check_failure()?;
        self.passwords
            .lock()
            .map_err(|e| anyhow::anyhow!("Mock authority mutex poisoned: {}", e))?
            .insert(name.to_string(), password.to_string());
        Ok(())
    }

    async fn client_config(&self, name: &str) -> Result<String, anyhow::Error> {
        self.check_failure()?;
        if !self.records()?.contains_key(name) {
            anyhow::bail!("no certificate for {}", name);
        }
        Ok(format!(
            "client\ndev tun\nremote vpn.example.com 1194\n# identity {}\n",
            name
        ))
    }
}
