use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{fmt, EnvFilter};

use listing_wizard::config::Config;
use listing_wizard::demo::DemoGateway;
use listing_wizard::gateway::GenerationGateway;
use listing_wizard::gemini::GeminiClient;
use listing_wizard::routes::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Init tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = Config::from_env()?;
    let gateway: Arc<dyn GenerationGateway> = match &config.api_key {
        Some(key) => {
            tracing::info!("Using API key: {}...", config.key_preview().unwrap_or_default());
            Arc::new(GeminiClient::new(key.clone(), &config).context("building Gemini client")?)
        }
        None => {
            tracing::warn!("GEMINI_API_KEY not set, running with canned demo responses");
            Arc::new(DemoGateway)
        }
    };

    let app = router(AppState::new(gateway)).layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr).await.with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
