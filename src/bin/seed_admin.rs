use opensound_backend::{
    CredentialStore,
    config::AppConfig,
    credentials::SeedOutcome,
    repository::{self, PostgresRepository, RepositoryState},
    telemetry,
};
use std::{env, process::ExitCode, sync::Arc};

/// seed-admin
///
/// Creates the first administrator from `SEED_ADMIN_EMAIL`, `SEED_ADMIN_PASSWORD` and the
/// optional `SEED_ADMIN_NAME`. Running it again against an existing email changes nothing.
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

    let (Ok(email), Ok(password)) = (env::var("SEED_ADMIN_EMAIL"), env::var("SEED_ADMIN_PASSWORD"))
    else {
        tracing::error!("SEED_ADMIN_EMAIL and SEED_ADMIN_PASSWORD must be set");
        return ExitCode::FAILURE;
    };
    let name = env::var("SEED_ADMIN_NAME").ok();

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
    let code = match CredentialStore::new(repo).seed_admin(&email, password, name).await {
        Ok(SeedOutcome::Created(admin)) => {
            tracing::info!(user_id = %admin.id, email = %admin.email, "admin created");
            ExitCode::SUCCESS
        }
        Ok(SeedOutcome::AlreadyExists(user)) => {
            tracing::info!(user_id = %user.id, role = %user.role, "account already exists, nothing to do");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "admin seeding failed");
            ExitCode::FAILURE
        }
    };

    pool.close().await;
    code
}
