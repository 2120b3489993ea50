use chrono::Duration;
use identity_service::{
    build_router,
    config::IdentityConfig,
    db,
    middleware::AuthorizationGuard,
    services::{IdentityService, SessionLedger, TokenCodec},
    store::PgStore,
    AppState,
};
use service_core::middleware::rate_limit::create_ip_rate_limiter;
use service_core::observability::logging::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), service_core::error::AppError> {
    // Load configuration - fail fast if invalid
    let config = IdentityConfig::from_env()?;

    init_tracing(&config.service_name, &config.log_level);

    tracing::info!(
        service = %config.service_name,
        environment = ?config.environment,
        "Starting identity service"
    );

    let pool = db::create_pool(&config.database)
        .await
        .map_err(|e| service_core::error::AppError::DatabaseError(anyhow::anyhow!(e)))?;
    db::run_migrations(&pool)
        .await
        .map_err(|e| service_core::error::AppError::DatabaseError(anyhow::anyhow!(e)))?;

    let store = Arc::new(PgStore::new(pool.clone()));
    let codec = TokenCodec::new(&config.token.signing_secret);
    let ledger = SessionLedger::new(
        store.clone(),
        codec.clone(),
        Duration::minutes(config.token.access_expiry_minutes),
        Duration::days(config.token.refresh_expiry_days),
    );
    let identity = IdentityService::new(store.clone(), ledger);
    let guard = AuthorizationGuard::new(codec, store);

    let login_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.login_attempts,
        config.rate_limit.login_window_seconds,
    );
    let join_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.join_attempts,
        config.rate_limit.join_window_seconds,
    );
    let ip_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.global_ip_limit,
        config.rate_limit.global_ip_window_seconds,
    );

    let state = AppState {
        config: config.clone(),
        identity,
        guard,
        pool: Some(pool),
        login_rate_limiter,
        join_rate_limiter,
        ip_rate_limiter,
    };

    let app = build_router(state);

    let addr = config.common.socket_addr()?;
    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
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
