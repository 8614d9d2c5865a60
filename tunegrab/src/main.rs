use tracing::info;

use tunegrab::api::server::{AppState, build_router};
use tunegrab::config::AppConfig;
use tunegrab::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env_or_default();

    // Keep the guard alive for the application lifetime.
    let _log_guard = logging::init_logging(config.log_dir.as_deref())?;

    tokio::fs::create_dir_all(&config.data_dir).await?;

    let addr = format!("{}:{}", config.bind_address, config.port);
    let state = AppState::new(config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "tunegrab listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
