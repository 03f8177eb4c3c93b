//! Visual-delta API server binary

use tracing_subscriber::EnvFilter;
use visual_delta_api_server::{start_server, ApiState, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let addr =
        std::env::var("VISUAL_DELTA_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let auth_token = std::env::var("VISUAL_DELTA_AUTH_TOKEN").ok();

    let config = ServerConfig {
        auth_token,
        ..Default::default()
    };
    let state = ApiState::new(config);

    start_server(&addr, state).await?;
    Ok(())
}
