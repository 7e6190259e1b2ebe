//! Test helper module for vpn-admin-service integration tests.
//!
//! Builds the full router over in-memory collaborators and drives it with
//! `oneshot`, so no PKI tooling or OpenVPN daemon is needed.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use http_body_util::BodyExt;
use service_core::axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    response::Response,
    Router,
};
use service_core::config::Config;
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;
use vpn_admin_service::{
    build_router,
    config::AdminConfig,
    models::IdentityRecord,
    services::{
        lifecycle::format_timestamp, metrics::init_metrics, FixedClock, IdentityService,
        InMemoryRoutingStore, MockCertificateAuthority, StaticConnections,
    },
    AppState,
};

pub const ALL_MODULES: &str = "core,password-auth,ccd";

/// Options for [`TestApp::spawn_with`].
pub struct TestOptions {
    pub role: &'static str,
    pub modules: &'static str,
    pub issue_delay: std::time::Duration,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            role: "primary",
            modules: ALL_MODULES,
            issue_delay: std::time::Duration::ZERO,
        }
    }
}

/// Test application with a seeded roster:
///
/// | name    | state                      | connections |
/// |---------|----------------------------|-------------|
/// | alice   | active, expires in 10 days | 2           |
/// | bob     | active, expires in 1 year  | 0           |
/// | charlie | revoked                    | 1           |
/// | dave    | expired 5 days ago         | 0           |
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub authority: Arc<MockCertificateAuthority>,
    pub routing: Arc<InMemoryRoutingStore>,
    pub connections: Arc<StaticConnections>,
    pub clock: Arc<FixedClock>,
}

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(TestOptions::default()).await
    }

    pub async fn spawn_with(options: TestOptions) -> Self {
        init_metrics().expect("Failed to register metrics");

        let vars: HashMap<&str, &str> = HashMap::from([
            ("SERVICE_NAME", "vpn-admin-service-test"),
            ("SERVER_ROLE", options.role),
            ("ENABLED_MODULES", options.modules),
            ("PASSWORD_DB_PATH", "/tmp/vpn-admin-test/users.db"),
            ("CCD_DIR", "/tmp/vpn-admin-test/ccd"),
        ]);
        let config = AdminConfig::from_lookup(Config::default(), |key| {
            vars.get(key).map(|v| v.to_string())
        })
        .expect("Failed to build test config");

        let clock = Arc::new(FixedClock::new(now()));
        let authority = Arc::new(
            MockCertificateAuthority::new()
                .with_clock(clock.clone())
                .with_issue_delay(options.issue_delay)
                .with_records(seed_records()),
        );
        let routing = Arc::new(InMemoryRoutingStore::new());
        let connections = Arc::new(StaticConnections::new());
        connections.set("alice", 2);
        connections.set("charlie", 1);

        let identities = Arc::new(IdentityService::new(
            config.role,
            config.modules.clone(),
            authority.clone(),
            routing.clone(),
            connections.clone(),
            clock.clone(),
        ));
        identities
            .refresh()
            .await
            .expect("Failed to load seeded roster");

        let state = AppState { config, identities };
        let router = build_router(state.clone())
            .await
            .expect("Failed to build router");

        Self {
            router,
            state,
            authority,
            routing,
            connections,
            clock,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request")
    }

    /// Send a request and decode the JSON body (`Null` when empty).
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");

        let response = self.send(request).await;
        let status = response.status();
        (status, body_json(response).await)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, serde_json::Value) {
        self.request(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        self.request(Method::POST, uri, Some(body)).await
    }
}

fn seed_records() -> Vec<IdentityRecord> {
    vec![
        IdentityRecord::new("alice").with_expiration(format_timestamp(now() + Duration::days(10))),
        IdentityRecord::new("bob").with_expiration(format_timestamp(now() + Duration::days(365))),
        IdentityRecord::new("charlie")
            .with_expiration(format_timestamp(now() + Duration::days(365)))
            .with_revocation("2025-05-01 00:00:00"),
        IdentityRecord::new("dave").with_expiration(format_timestamp(now() - Duration::days(5))),
    ]
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    if bytes.is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}

/// Names in response order.
pub fn names(list: &serde_json::Value) -> Vec<String> {
    list["identities"]
        .as_array()
        .expect("identities array")
        .iter()
        .map(|i| i["name"].as_str().unwrap_or_default().to_string())
        .collect()
}
