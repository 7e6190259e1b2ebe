//! Lifecycle classification of identity records.
//!
//! Status is never stored: it is derived from the raw record and the caller's
//! "now" on every read, so it cannot go stale while the roster sits idle.

use crate::models::{AccountStatus, ConnectionState, Identity, IdentityRecord};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};

/// Forward-looking window in which an active certificate counts as expiring soon.
pub const EXPIRING_SOON_WINDOW_DAYS: i64 = 30;

const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const OPENSSL_INDEX_FORMAT: &str = "%y%m%d%H%M%SZ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub account_status: AccountStatus,
    pub expiring_soon: bool,
}

/// Parse a stored timestamp. Unknown formats yield `None`, never an error.
///
/// Accepted: `2006-01-02 15:04:05` (UTC), RFC 3339, and OpenSSL index
/// UTCTime `060102150405Z`.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, DISPLAY_FORMAT) {
        return Some(naive.and_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // OpenSSL index timestamps may carry a ",reason" suffix on revocations.
    let stamp = raw.split(',').next().unwrap_or(raw);
    NaiveDateTime::parse_from_str(stamp, OPENSSL_INDEX_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Format an instant the way the roster displays it.
pub fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.format(DISPLAY_FORMAT).to_string()
}

/// Derive status and expiry risk. Rules are evaluated in order:
/// revoked, then expired, then active.
pub fn classify(record: &IdentityRecord, now: DateTime<Utc>) -> Classification {
    if record.is_revoked() {
        return Classification {
            account_status: AccountStatus::Revoked,
            expiring_soon: false,
        };
    }

    let expires_at = record.expiration.as_deref().and_then(parse_timestamp);

    match expires_at {
        Some(expiration) if now > expiration => Classification {
            account_status: AccountStatus::Expired,
            expiring_soon: false,
        },
        Some(expiration) => Classification {
            account_status: AccountStatus::Active,
            expiring_soon: expiration - now <= Duration::days(EXPIRING_SOON_WINDOW_DAYS),
        },
        None => Classification {
            account_status: AccountStatus::Active,
            expiring_soon: false,
        },
    }
}

/// Build the classified view of a record at `now`.
pub fn build_identity(record: &IdentityRecord, now: DateTime<Utc>) -> Identity {
    let classification = classify(record, now);
    let connection_count = match classification.account_status {
        AccountStatus::Active => record.connection_count,
        _ => 0,
    };

    Identity {
        name: record.name.clone(),
        account_status: classification.account_status,
        connection_count,
        connection_state: ConnectionState::from_count(connection_count),
        expiration_date: record.expiration.clone(),
        expires_at: record.expiration.as_deref().and_then(parse_timestamp),
        revocation_date: match classification.account_status {
            AccountStatus::Revoked => record.revocation.clone(),
            _ => None,
        },
        expiring_soon: classification.expiring_soon,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn expiring_in(days: i64) -> IdentityRecord {
        IdentityRecord::new("alice").with_expiration(format_timestamp(now() + Duration::days(days)))
    }

    #[test]
    fn test_ten_days_out_is_expiring_soon() {
        let c = classify(&expiring_in(10), now());
        assert_eq!(c.account_status, AccountStatus::Active);
        assert!(c.expiring_soon);
    }

    #[test]
    fn test_sixty_days_out_is_not_expiring_soon() {
        let c = classify(&expiring_in(60), now());
        assert_eq!(c.account_status, AccountStatus::Active);
        assert!(!c.expiring_soon);
    }

    #[test]
    fn test_past_expiration_is_expired() {
        let c = classify(&expiring_in(-5), now());
        assert_eq!(c.account_status, AccountStatus::Expired);
        assert!(!c.expiring_soon);
    }

    #[test]
    fn test_window_boundary_is_inclusive() {
        assert!(classify(&expiring_in(30), now()).expiring_soon);
        let just_over = IdentityRecord::new("alice").with_expiration(format_timestamp(
            now() + Duration::days(30) + Duration::seconds(1),
        ));
        assert!(!classify(&just_over, now()).expiring_soon);
    }

    #[test]
    fn test_expiring_exactly_now_is_still_active() {
        let record = IdentityRecord::new("alice").with_expiration(format_timestamp(now()));
        let c = classify(&record, now());
        assert_eq!(c.account_status, AccountStatus::Active);
        assert!(c.expiring_soon);
    }

    #[test]
    fn test_revocation_wins_over_expiration() {
        let record = expiring_in(10).with_revocation("2025-01-01 00:00:00");
        let c = classify(&record, now());
        assert_eq!(c.account_status, AccountStatus::Revoked);
        assert!(!c.expiring_soon);

        let expired_and_revoked = expiring_in(-100).with_revocation("2025-01-01 00:00:00");
        assert_eq!(
            classify(&expired_and_revoked, now()).account_status,
            AccountStatus::Revoked
        );
    }

    #[test]
    fn test_blank_revocation_is_ignored() {
        let record = expiring_in(90).with_revocation("  ");
        assert_eq!(classify(&record, now()).account_status, AccountStatus::Active);
    }

    #[test]
    fn test_unparsable_or_missing_expiration_never_expires() {
        for raw in ["invalid-date", "", "31/12/2099"] {
            let record = IdentityRecord::new("alice").with_expiration(raw);
            let c = classify(&record, now());
            assert_eq!(c.account_status, AccountStatus::Active, "input {:?}", raw);
            assert!(!c.expiring_soon, "input {:?}", raw);
        }
        let c = classify(&IdentityRecord::new("alice"), now());
        assert_eq!(c.account_status, AccountStatus::Active);
        assert!(!c.expiring_soon);
    }

    #[test]
    fn test_classify_is_deterministic_and_pure() {
        let record = expiring_in(10).with_connections(3);
        let before = record.clone();
        assert_eq!(classify(&record, now()), classify(&record, now()));
        assert_eq!(record, before);
    }

    #[test]
    fn test_status_follows_now() {
        let record = expiring_in(10);
        assert_eq!(
            classify(&record, now() + Duration::days(11)).account_status,
            AccountStatus::Expired
        );
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2030, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(parse_timestamp("2030-12-31 23:59:59"), Some(expected));
        assert_eq!(parse_timestamp("2030-12-31T23:59:59Z"), Some(expected));
        assert_eq!(parse_timestamp("301231235959Z"), Some(expected));
        assert_eq!(parse_timestamp("301231235959Z,keyCompromise"), Some(expected));
        assert_eq!(parse_timestamp("garbage"), None);
    }

    #[test]
    fn test_build_identity_drops_connections_for_inactive() {
        let revoked = expiring_in(90)
            .with_revocation("2025-01-01 00:00:00")
            .with_connections(2);
        let identity = build_identity(&revoked, now());
        assert_eq!(identity.connection_count, 0);
        assert_eq!(identity.connection_state, ConnectionState::Disconnected);
        assert!(identity.revocation_date.is_some());

        let active = expiring_in(90).with_connections(2);
        let identity = build_identity(&active, now());
        assert_eq!(identity.connection_count, 2);
        assert_eq!(identity.connection_state, ConnectionState::Connected);
        assert!(identity.revocation_date.is_none());
    }
}
