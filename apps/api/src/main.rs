mod anti_cheat;
mod aws;
mod config;
mod db;
mod errors;
mod interview;
mod llm_client;
mod models;
mod resume;
mod routes;
mod sessions;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::interview::coordinator::TurnCoordinator;
use crate::llm_client::ProviderAdapter;
use crate::routes::build_router;
use crate::sessions::store::PgInterviewStore;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Zuri API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL (runs migrations)
    let db = create_pool(&config.database_url).await?;
    let store = Arc::new(PgInterviewStore::new(db));

    // Shared AWS config for S3 + Bedrock
    let sdk = aws::load_sdk_config(&config).await;
    let s3 = aws::build_s3_client(&sdk, &config);
    info!("S3 client initialized (bucket: {})", config.s3_bucket);

    // Initialize LLM provider adapter
    if !config.has_bedrock_credentials() && !config.has_gemini_credentials() {
        warn!("No static LLM credentials configured; relying on the default AWS credential chain");
    }
    let llm = ProviderAdapter::from_config(&config, &sdk).await;
    info!(
        "LLM provider initialized (primary: {}, requested: {})",
        llm.primary_name(),
        config.llm_provider.as_str()
    );

    let state = AppState {
        store,
        s3,
        llm,
        turns: TurnCoordinator::new(),
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
