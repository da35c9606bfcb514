use axum::{routing::get, Router};
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use eraverse::api::{health::health_check, protected_router, state::AppState, telegram_webhook};
use eraverse::config::Config;
use eraverse::db;
use eraverse::jobs::scheduler;
use eraverse::services::telegram::TelegramClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eraverse=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Eraverse server...");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!(
        timezone = %config.timezone,
        cron = %config.notification_cron,
        "Configuration loaded successfully"
    );

    // Create database pool
    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    // Run migrations
    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    let telegram = TelegramClient::new(
        &config.telegram_api_url,
        config.telegram_bot_token.clone(),
        Duration::from_secs(config.http_timeout_secs),
    )?;

    // Build application state
    let state = AppState {
        pool: pool.clone(),
        config: config.clone(),
        telegram,
    };

    // Keep the handle alive for the lifetime of the server
    let mut notification_scheduler = scheduler::start(state.clone()).await?;

    // Build router
    let app = Router::new()
        .route("/health", get(health_check))
        .merge(telegram_webhook::router())
        .merge(protected_router(state.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Listening on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    notification_scheduler.shutdown().await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received, cleaning up...");
}
