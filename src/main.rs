use campaign_portal::{
    AppState,
    config::{AppConfig, Env, RuntimeConfig},
    create_router,
    provider::{AuthProviderState, HostedAuthClient},
    repository::{PostgresRepository, RepositoryState},
    session::SessionStore,
    storage::{S3StorageClient, StorageState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// The asynchronous entry point, responsible for initializing all core
/// components in order: Configuration (including the one-time runtime
/// configuration fetch), Logging, Database, Storage, Identity Provider,
/// Session Store, and the HTTP server.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (fail-fast)
    dotenv::dotenv().ok();
    let mut config = AppConfig::load();

    // 2. Logging filter setup. RUST_LOG wins; otherwise sensible defaults.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "campaign_portal=debug,tower_http=info,axum=trace".into());

    // 3. Initialize logging based on environment.
    match config.env {
        Env::Local => {
            // LOCAL: pretty output for human readability.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // PROD: JSON output for centralized log aggregators.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 4. Runtime configuration fetch. Happens exactly once, before any of the
    // identity provider, document store, or blob store is initialized.
    if let Some(config_url) = config.config_url.clone() {
        let runtime = RuntimeConfig::fetch(&config_url)
            .await
            .expect("FATAL: failed to fetch runtime configuration");
        config.apply_runtime(runtime);
        tracing::info!("Runtime configuration applied from {}", config_url);
    }

    // 5. Database initialization (Postgres).
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    // 6. Storage initialization (S3/MinIO).
    let s3_client = S3StorageClient::new(
        &config.s3_endpoint,
        &config.s3_region,
        &config.s3_key,
        &config.s3_secret,
        &config.s3_bucket,
    )
    .await;

    // LOCAL-ONLY: provision the MinIO bucket for the Dockerized setup.
    if config.env == Env::Local {
        use campaign_portal::storage::StorageService;
        s3_client.ensure_bucket_exists().await;
    }

    let storage = Arc::new(s3_client) as StorageState;

    // 7. Identity provider and session store. The session store spawns its
    // single ambient auth-state listener here and tears it down on drop.
    let provider =
        Arc::new(HostedAuthClient::new(&config.auth_url, &config.auth_api_key)) as AuthProviderState;
    let session = Arc::new(SessionStore::new(
        provider.clone(),
        repo.clone(),
        &config.jwt_secret,
    ));

    // 8. Unified state assembly.
    let app_state = AppState {
        repo,
        storage,
        provider,
        session,
        config,
    };

    // 9. Router and server startup.
    let app = create_router(app_state);

    let listener = TcpListener::bind("0.0.0.0:3000").await.unwrap();

    tracing::info!("HTTP server bound successfully.");
    tracing::info!("Listening on 0.0.0.0:3000");
    tracing::info!("API Documentation (Swagger UI) available at: http://localhost:3000/swagger-ui");

    axum::serve(listener, app).await.unwrap();
}
