use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
pub enum AccountStatus {
    Active,
    Revoked,
    Expired,
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AccountStatus::Active => write!(f, "Active"),
            AccountStatus::Revoked => write!(f, "Revoked"),
            AccountStatus::Expired => write!(f, "Expired"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

impl ConnectionState {
    pub fn from_count(connection_count: u32) -> Self {
        if connection_count > 0 {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }
}

/// Identity as the backing store knows it, before classification.
///
/// Timestamps are kept as the raw text the store produced; the classifier
/// decides what they mean relative to "now".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub name: String,
    pub expiration: Option<String>,
    pub revocation: Option<String>,
    pub connection_count: u32,
}

impl IdentityRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_expiration(mut self, expiration: impl Into<String>) -> Self {
        self.expiration = Some(expiration.into());
        self
    }

    pub fn with_revocation(mut self, revocation: impl Into<String>) -> Self {
        self.revocation = Some(revocation.into());
        self
    }

    pub fn with_connections(mut self, connection_count: u32) -> Self {
        self.connection_count = connection_count;
        self
    }

    /// A revocation marker counts when it carries any non-blank text.
    pub fn is_revoked(&self) -> bool {
        self.revocation
            .as_deref()
            .is_some_and(|r| !r.trim().is_empty())
    }
}

/// Classified view of one VPN account, valid for the instant it was built at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Identity {
    pub name: String,
    pub account_status: AccountStatus,
    pub connection_count: u32,
    pub connection_state: ConnectionState,
    /// Raw expiration text as stored.
    pub expiration_date: Option<String>,
    /// Parsed expiration, absent when missing or unparsable.
    #[schema(value_type = Option<String>, format = "date-time")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Raw revocation text; present exactly when the account is revoked.
    pub revocation_date: Option<String>,
    pub expiring_soon: bool,
}

/// Options accepted when issuing (or re-issuing) an identity's certificate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateIdentityOptions {
    /// Account password, used only when password authentication is enabled.
    pub password: Option<String>,
}

impl CreateIdentityOptions {
    pub fn with_password(password: impl Into<String>) -> Self {
        Self {
            password: Some(password.into()),
        }
    }
}

/// What the certificate authority hands back after issuing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCredential {
    pub serial: String,
    pub expiration: String,
}
