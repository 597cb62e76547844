use opensound_backend::{
    AppState,
    config::AppConfig,
    create_router,
    repository::{self, PostgresRepository, RepositoryState},
    telemetry,
};
use std::sync::Arc;
use tokio::net::TcpListener;

/// main
///
/// Entry point: configuration, logging, database, then the HTTP server. Startup failures are
/// fatal; once serving, the process exits only on SIGINT/SIGTERM after draining requests.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast on missing production secrets)
    dotenv::dotenv().ok();
    let config = AppConfig::load().unwrap_or_else(|e| panic!("FATAL: invalid configuration: {e}"));

    // 2. Logging
    telemetry::init_tracing(config.env);
    tracing::info!(env = config.env.as_str(), "application starting");

    // 3. Database
    let pool = repository::connect_pool(&config)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");
    repository::run_migrations(&pool)
        .await
        .expect("FATAL: Failed to apply database migrations.");

    let repo = Arc::new(PostgresRepository::new(pool.clone())) as RepositoryState;

    // 4. State, router, server
    let port = config.port;
    let app = create_router(AppState::new(repo, config));

    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .unwrap_or_else(|e| panic!("FATAL: cannot bind port {port}: {e}"));

    tracing::info!("Listening on 0.0.0.0:{port}");
    tracing::info!("API Documentation (Swagger UI) available at: http://localhost:{port}/swagger-ui");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "server terminated with an error");
    }

    pool.close().await;
    tracing::info!("shutdown complete");
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, draining connections");
}
