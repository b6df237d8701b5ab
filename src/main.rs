use anyhow::Context;
use tracing_subscriber::EnvFilter;

use mspfa_api::app::build_router;
use mspfa_api::config::config;
use mspfa_api::database::DatabaseManager;
use mspfa_api::is_production;
use mspfa_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, SECURITY_JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config();
    tracing::info!("Starting MSPFA API in {:?} mode", config.environment);

    if is_production!() && config.security.jwt_secret.trim().is_empty() {
        tracing::warn!("SECURITY_JWT_SECRET is empty; session tokens cannot be issued");
    }

    let db = DatabaseManager::connect_lazy(&config.database).context("failed to configure database pool")?;
    let app = build_router(AppState::from_database(&db));

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("MSPFA API listening on http://{}", bind_addr);

    axum::serve(listener, app).await.context("server error")?;

    db.close().await;
    Ok(())
}
