use page_gate::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    repository::{MemorySettingsRepository, PostgresSettingsRepository, RepositoryState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// `DATABASE_URL` value selecting the in-process store (local development only).
const MEMORY_STORE_URL: &str = "memory";

/// main
///
/// Initializes configuration, logging and the settings store, then serves HTTP.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast on missing production secrets).
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: RUST_LOG wins, otherwise sensible local defaults.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "page_gate=debug,tower_http=info,axum=trace".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // JSON lines for the log aggregator.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Settings store.
    let repo: RepositoryState = if config.env == Env::Local && config.db_url == MEMORY_STORE_URL {
        tracing::warn!("using in-memory settings store; changes are lost on restart");
        Arc::new(MemorySettingsRepository::new())
    } else {
        let reader = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.db_url)
            .await
            .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

        let writer = PgPoolOptions::new()
            .max_connections(2)
            .connect(&config.write_db_url)
            .await
            .expect("FATAL: Failed to connect to Postgres. Check SETTINGS_WRITE_DATABASE_URL.");

        sqlx::migrate!("./migrations")
            .run(&writer)
            .await
            .expect("FATAL: Failed to run settings migrations.");

        Arc::new(PostgresSettingsRepository::new(reader, writer))
    };

    if config.settings_admin_emails.is_empty() {
        tracing::warn!("SETTINGS_ADMIN_EMAILS is empty; page-visibility settings are read-only");
    }
    match &config.settings_endpoint_url {
        Some(url) => tracing::info!(%url, "enforcement reads settings over HTTP"),
        None => tracing::info!("enforcement reads settings from the store in-process"),
    }

    // 4. State, router, server.
    let bind_addr = config.bind_addr.clone();
    let app = create_router(AppState::new(config, repo));

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind listener. Check BIND_ADDR.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at: http://{}/api/docs", bind_addr);

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}
