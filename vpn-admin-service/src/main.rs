use service_core::observability::logging::init_tracing;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use vpn_admin_service::{
    build_router,
    config::AdminConfig,
    services::{
        metrics::init_metrics, CcdDirectory, CertificateAuthority, ConnectionSource,
        EasyRsaAuthority, IdentityService, InMemoryRoutingStore, ManagementClient,
        PasswordDatabase, RemoteEndpoint, RoutingPolicyStore, StaticConnections, SystemClock,
    },
    AppState,
};

const MANAGEMENT_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), service_core::error::AppError> {
    // Load configuration - fail fast if invalid
    let config = AdminConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.log_format,
        config.otlp_endpoint.as_deref(),
    );

    init_metrics().map_err(|e| {
        service_core::error::AppError::InternalError(anyhow::anyhow!(
            "Failed to register metrics: {}",
            e
        ))
    })?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        role = %config.role,
        "Starting VPN admin service"
    );

    let mut easyrsa = EasyRsaAuthority::new(
        &config.pki.easyrsa_bin,
        &config.pki.pki_dir,
        &config.pki.server_common_name,
        RemoteEndpoint {
            host: config.remote.host.clone(),
            port: config.remote.port,
            protocol: config.remote.protocol.clone(),
        },
    );
    if let Some(passwords) = &config.passwords {
        easyrsa = easyrsa.with_password_database(PasswordDatabase {
            bin: passwords.openvpn_user_bin.clone(),
            db_path: passwords.db_path.clone(),
        });
        tracing::info!(db = %passwords.db_path.display(), "Password authentication enabled");
    }
    let authority: Arc<dyn CertificateAuthority> = Arc::new(easyrsa);

    let routing: Arc<dyn RoutingPolicyStore> = match &config.ccd {
        Some(ccd) => {
            tracing::info!(dir = %ccd.dir.display(), "Per-client routing enabled");
            Arc::new(CcdDirectory::new(&ccd.dir, ccd.client_netmask))
        }
        None => Arc::new(InMemoryRoutingStore::new()),
    };

    let connections: Arc<dyn ConnectionSource> = match &config.management_address {
        Some(address) => Arc::new(ManagementClient::new(address, MANAGEMENT_TIMEOUT)),
        None => {
            tracing::warn!("MANAGEMENT_ADDRESS not set; connection counts will read as zero");
            Arc::new(StaticConnections::new())
        }
    };

    let identities = Arc::new(IdentityService::new(
        config.role,
        config.modules.clone(),
        authority,
        routing,
        connections,
        Arc::new(SystemClock),
    ));

    match identities.refresh().await {
        Ok(count) => tracing::info!(identities = count, "Roster loaded"),
        Err(e) => tracing::warn!(error = %e, "Initial roster load failed; starting empty"),
    }

    let refresher = identities.clone();
    let period = Duration::from_secs(config.roster_refresh_seconds);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // First tick fires immediately and the roster was just loaded
        interval.tick().await;
        loop {
            interval.tick().await;
            if let Err(e) = refresher.refresh().await {
                tracing::warn!(error = %e, "Periodic roster refresh failed");
            }
        }
    });

    let state = AppState {
        config: config.clone(),
        identities,
    };
    let app = build_router(state).await?;

    let addr = config.common.listen_addr();

    let service_span = tracing::info_span!(
        "service",
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
    );
    let _guard = service_span.enter();

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    service_core::axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
