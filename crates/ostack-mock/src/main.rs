use std::net::SocketAddr;
use std::time::Duration;

use ostack_mock::{create_router, CloudState};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let addr: SocketAddr = std::env::var("OSTACK_MOCK_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:8774".to_string())
        .parse()?;
    let state = CloudState::new(Duration::from_millis(500));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "mock control plane listening");
    axum::serve(listener, create_router(state)).await?;
    Ok(())
}
