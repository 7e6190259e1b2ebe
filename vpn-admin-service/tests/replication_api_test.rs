//! Replica behavior: read-only roster and sync reporting.

mod common;

use common::{TestApp, TestOptions};
use serde_json::json;
use service_core::axum::http::Method;

async fn replica() -> TestApp {
    TestApp::spawn_with(TestOptions {
        role: "replica",
        ..Default::default()
    })
    .await
}

#[tokio::test]
async fn replica_serves_reads() {
    let app = replica().await;

    let (status, body) = app.get("/api/identities").await;
    assert_eq!(status, 200);
    assert_eq!(body["total"], 4);

    let (status, _) = app.get("/api/identities/alice/config").await;
    assert_eq!(status, 200);

    let (status, body) = app.get("/api/identities/alice/routes").await;
    assert_eq!(status, 200);
    assert_eq!(body["editable"], false);
}

#[tokio::test]
async fn replica_offers_no_mutating_actions() {
    let app = replica().await;

    let (_, body) = app.get("/api/identities").await;
    for identity in body["identities"].as_array().unwrap() {
        for action in identity["actions"].as_array().unwrap() {
            assert!(
                ["view", "downloadConfig", "viewRoutes"].contains(&action.as_str().unwrap()),
                "replica offered {} on {}",
                action,
                identity["name"]
            );
        }
    }
}

#[tokio::test]
async fn replica_rejects_every_mutation_without_touching_the_pki() {
    let app = replica().await;

    let attempts = [
        (Method::POST, "/api/identities", Some(json!({ "name": "erin", "password": "hunter22" }))),
        (Method::POST, "/api/identities/alice/revoke", None),
        (Method::POST, "/api/identities/charlie/unrevoke", None),
        (Method::POST, "/api/identities/dave/rotate", Some(json!({ "password": "hunter22" }))),
        (Method::DELETE, "/api/identities/charlie", None),
        (Method::POST, "/api/identities/alice/password", Some(json!({ "password": "hunter22" }))),
        (Method::PUT, "/api/identities/alice/routes", Some(json!({ "assigned_address": "10.8.0.9" }))),
    ];

    for (method, uri, body) in attempts {
        let (status, _) = app.request(method.clone(), uri, body).await;
        assert_eq!(status, 403, "{} {} was allowed", method, uri);
    }

    assert!(app.authority.calls().is_empty());
}

#[tokio::test]
async fn replica_records_sync_reports() {
    let app = replica().await;

    let (status, body) = app.post("/api/replication/sync", json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(body["last_successful_sync"], "2025-06-01T12:00:00Z");

    let (_, info) = app.get("/api/server").await;
    assert_eq!(info["last_successful_sync"], "2025-06-01T12:00:00Z");
}

#[tokio::test]
async fn sync_report_reloads_the_roster() {
    let app = replica().await;
    app.connections.set("bob", 3);

    app.post("/api/replication/sync", json!({})).await;

    let (_, bob) = app.get("/api/identities/bob").await;
    assert_eq!(bob["connection_count"], 3);
}

#[tokio::test]
async fn primary_refuses_sync_reports() {
    let app = TestApp::spawn().await;

    let (status, _) = app.post("/api/replication/sync", json!({})).await;

    assert_eq!(status, 409);
}
