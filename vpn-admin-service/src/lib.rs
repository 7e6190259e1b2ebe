pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use service_core::axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use service_core::middleware::{
    security_headers::security_headers_middleware, tracing::request_id_middleware,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;

use crate::config::AdminConfig;
use crate::middleware::metrics_middleware;
use crate::services::IdentityService;
use service_core::error::AppError;
use std::sync::Arc;

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::server::server_info,
        handlers::server::dashboard,
        handlers::server::report_sync,
        handlers::identity::list_identities,
        handlers::identity::get_identity,
        handlers::identity::create_identity,
        handlers::identity::revoke_identity,
        handlers::identity::unrevoke_identity,
        handlers::identity::rotate_identity,
        handlers::identity::delete_identity,
        handlers::identity::set_password,
        handlers::identity::download_config,
        handlers::routing::get_routing_policy,
        handlers::routing::save_routing_policy,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::MessageResponse,
            dtos::identity::IdentityResponse,
            dtos::identity::IdentityListResponse,
            dtos::identity::CreateIdentityRequest,
            dtos::identity::RotateIdentityRequest,
            dtos::identity::SetPasswordRequest,
            dtos::routing::RoutingPolicyRequest,
            dtos::routing::CustomRouteRequest,
            dtos::routing::RoutingPolicyResponse,
            dtos::server::ServerInfoResponse,
            dtos::server::SyncResponse,
            services::DashboardStats,
            models::Identity,
            models::AccountStatus,
            models::ConnectionState,
            models::Action,
            models::Module,
            models::ServerRole,
            models::RoutingPolicy,
            models::CustomRoute,
        )
    ),
    tags(
        (name = "Identities", description = "Identity lifecycle operations"),
        (name = "Routing", description = "Per-client routing policies"),
        (name = "Server", description = "Node role, replication and dashboard"),
        (name = "Observability", description = "Service health and monitoring"),
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub config: AdminConfig,
    pub identities: Arc<IdentityService>,
}

pub async fn build_router(state: AppState) -> Result<Router, AppError> {
    let cors = CorsLayer::new()
        .allow_origin(
            state
                .config
                .allowed_origins
                .iter()
                .filter_map(|o| match o.parse::<service_core::axum::http::HeaderValue>() {
                    Ok(origin) => Some(origin),
                    Err(e) => {
                        tracing::error!("Invalid CORS origin '{}': {}. Skipping.", o, e);
                        None
                    }
                })
                .collect::<Vec<service_core::axum::http::HeaderValue>>(),
        )
        .allow_methods([
            service_core::axum::http::Method::GET,
            service_core::axum::http::Method::POST,
            service_core::axum::http::Method::PUT,
            service_core::axum::http::Method::DELETE,
            service_core::axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            service_core::axum::http::header::CONTENT_TYPE,
            service_core::axum::http::header::HeaderName::from_static("x-request-id"),
        ]);

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .route(
            "/.well-known/openapi.json",
            get(|| async { service_core::axum::Json(ApiDoc::openapi()) }),
        )
        .route("/api/server", get(handlers::server::server_info))
        .route("/api/dashboard", get(handlers::server::dashboard))
        .route("/api/replication/sync", post(handlers::server::report_sync))
        .route(
            "/api/identities",
            get(handlers::identity::list_identities).post(handlers::identity::create_identity),
        )
        .route(
            "/api/identities/:name",
            get(handlers::identity::get_identity).delete(handlers::identity::delete_identity),
        )
        .route(
            "/api/identities/:name/revoke",
            post(handlers::identity::revoke_identity),
        )
        .route(
            "/api/identities/:name/unrevoke",
            post(handlers::identity::unrevoke_identity),
        )
        .route(
            "/api/identities/:name/rotate",
            post(handlers::identity::rotate_identity),
        )
        .route(
            "/api/identities/:name/password",
            post(handlers::identity::set_password),
        )
        .route(
            "/api/identities/:name/config",
            get(handlers::identity::download_config),
        )
        .route(
            "/api/identities/:name/routes",
            get(handlers::routing::get_routing_policy).put(handlers::routing::save_routing_policy),
        )
        .with_state(state)
        // Route-level so MatchedPath is available
        .route_layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &service_core::axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors);

    Ok(app)
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy")
    ),
    tag = "Observability"
)]
pub async fn health_check(
    service_core::axum::extract::State(state): service_core::axum::extract::State<AppState>,
) -> service_core::axum::Json<serde_json::Value> {
    let info = state.identities.server_info();
    service_core::axum::Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "role": info.role,
        "identities": state.identities.store().len().await,
    }))
}
