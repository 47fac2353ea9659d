use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bookstore_api::{config::Config, router, services::clock::SystemClock, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    info!(
        access_ttl_minutes = config.jwt_access_expiration_minutes,
        refresh_ttl_days = config.jwt_refresh_expiration_days,
        "Configuration loaded"
    );

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(&config, Arc::new(SystemClock));
    let app = router(state);

    info!("bookstore API listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
