// src/main.rs

use std::sync::Arc;
use std::time::Duration;

use quiz_api::broker::MemoryBroker;
use quiz_api::config::Config;
use quiz_api::routes;
use quiz_api::state::{AppState, Backends};
use quiz_api::stores::{
    FsArtifactStore, HttpNotifier, MemoryKeyValueStore, PgQuizGraphReader, PgUserDirectory,
};
use quiz_api::utils::hash::hash_password;
use quiz_api::wide_column::{MemoryCluster, schema};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[tokio::main]
async fn main() {
    // Load configuration from environment (.env included)
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    // Initialize Database Pool with Retry
    let mut retry_count = 0;
    let pool = loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    panic!("Failed to connect to database after 5 retries: {}", e);
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    };

    tracing::info!("Database connected...");

    // Run Migrations Automatically
    tracing::info!("Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Migrations applied successfully.");

    // Seed Admin User
    if let Err(e) = seed_admin_user(&pool, &config).await {
        tracing::error!("Failed to seed admin user: {:?}", e);
    }

    // The wide-column keyspace is served in-process; the DDL is what a
    // real cluster would need provisioned.
    for statement in schema::ddl() {
        tracing::debug!("Schema: {}", statement);
    }

    let backends = Backends {
        users: Arc::new(PgUserDirectory::new(pool.clone())),
        quizzes: Arc::new(PgQuizGraphReader::new(pool.clone())),
        artifacts: Arc::new(FsArtifactStore::new(&config.artifact_root)),
        notifier: Arc::new(HttpNotifier::new(config.notification_url.clone())),
        kv: Arc::new(MemoryKeyValueStore::new()),
        cql: Arc::new(MemoryCluster::new()),
        transport: Arc::new(MemoryBroker::new()),
    };

    let (state, consumers) = AppState::start(config.clone(), backends).await;
    let broker = state.broker.clone();

    // Create the Axum application router
    let app = routes::create_router(state);

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind BIND_ADDR");

    // Start the server
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error: {}", e);
    }

    // Consumers first, so nothing they enqueue is lost when the pool drains.
    consumers.shutdown().await;
    broker.close().await;
    tracing::info!("Shutdown complete");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutdown signal received");
}

async fn seed_admin_user(pool: &PgPool, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if let (Some(username), Some(password)) = (&config.admin_username, &config.admin_password) {
        let user_exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(pool)
            .await?;

        if user_exists.is_none() {
            tracing::info!("Seeding admin user: {}", username);
            let hashed_password = hash_password(password)?;
            let full_name = config.admin_full_name.clone().unwrap_or_else(|| username.clone());

            sqlx::query(
                "INSERT INTO users (uuid, username, password, full_name, is_admin) VALUES ($1, $2, $3, $4, TRUE)",
            )
            .bind(Uuid::new_v4())
            .bind(username)
            .bind(hashed_password)
            .bind(full_name)
            .execute(pool)
            .await?;
            tracing::info!("Admin user created successfully.");
        }
    }
    Ok(())
}
