use anyhow::{Context, Result};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use veo_bridge::bridge::{self, AppState};
use veo_bridge::config::Config;
use veo_bridge::generator::build_http_client;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "veo_bridge=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::var("VEO_CONFIG").unwrap_or_else(|_| "config.json".into());
    let config = Config::load_or_env(&config_path).await?;
    tracing::info!(
        project = %config.project_id,
        location = %config.location,
        model = %config.model_id,
        image_model = %config.image_model_id,
        "bridge configured"
    );

    let state = AppState::from_config(&config, build_http_client()?);
    let app = bridge::build_router(state);

    let addr: SocketAddr = config
        .bind_addr
        .parse()
        .with_context(|| format!("Invalid bind address: {}", config.bind_addr))?;
    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app).await?;
    Ok(())
}
