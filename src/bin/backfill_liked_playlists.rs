use opensound_backend::{
    PlaylistStore,
    config::AppConfig,
    repository::{self, PostgresRepository, RepositoryState},
    telemetry,
};
use std::{process::ExitCode, sync::Arc};

/// backfill-liked-playlists
///
/// Gives every user that lacks one its liked playlist. Safe to re-run.
#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    telemetry::init_tracing(config.env);

    let pool = match repository::connect_pool(&config).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "failed to connect to Postgres");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = repository::run_migrations(&pool).await {
        tracing::error!(error = %e, "failed to apply migrations");
        return ExitCode::FAILURE;
    }

    let repo = Arc::new(PostgresRepository::new(pool.clone())) as RepositoryState;
    let code = match PlaylistStore::new(repo).ensure_liked_playlists().await {
        Ok(created) => {
            tracing::info!(created, "liked playlist backfill finished");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "liked playlist backfill failed");
            ExitCode::FAILURE
        }
    };

    pool.close().await;
    code
}
