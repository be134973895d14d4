//! Example server: loads the backend config, migrates every backend, then serves the
//! health and backend admin routes.

use shop_data::config::config_path;
use shop_data::health::spawn_health_checks;
use shop_data::{app_router, bootstrap, load_from_path};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("shop_data=info")),
        )
        .init();

    let config = load_from_path(config_path()).await?;
    let state = bootstrap(&config).await?;

    if let Some(policy) = &state.fallback {
        spawn_health_checks(
            Arc::clone(&state.catalog),
            Arc::clone(&state.factory),
            Arc::clone(policy),
            Duration::from_secs(15),
        );
    }

    let addr = std::env::var("SHOP_LISTEN_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".into());
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app_router(state.clone())).await?;
    state.factory.close().await;
    Ok(())
}
