//! # MarketMatch Web Server
//!
//! The HTTP boundary of the portfolio pipeline. Every route returns JSON; failures
//! are `{"error": ..., "kind": ...}` objects with a matching status code.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use configuration::Settings;
use market_data::CsvDirectoryProvider;
use pipeline::PortfolioPipeline;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, Any, CorsLayer, ExposeHeaders},
    trace::TraceLayer,
};

pub mod error;
pub mod handlers;

/// The shared application state that all handlers can access.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: PortfolioPipeline,
}

/// Builds the router. Separate from `run_server` so tests can drive it in-process.
pub fn router(pipeline: PortfolioPipeline) -> Router {
    let body_limit = pipeline.settings().server.body_limit_bytes;
    let app_state = Arc::new(AppState { pipeline });
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods(Any)
        .allow_headers(AllowHeaders::any())
        .expose_headers(ExposeHeaders::any());

    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/filter-stocks", post(handlers::filter_stocks))
        .route("/api/rate-stocks", post(handlers::rate_stocks))
        .route("/api/optimize-portfolio", post(handlers::optimize_portfolio))
        .route("/api/market-data", get(handlers::market_data))
        .route("/api/upload-csv", post(handlers::upload_csv))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(body_limit))
}

/// Serves the API over the CSV data directory named in `settings`.
pub async fn run_server(settings: Settings) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port).parse()?;
    let provider = CsvDirectoryProvider::open(&settings.market_data.data_dir)?;
    let pipeline = PortfolioPipeline::new(Arc::new(provider), settings);
    let app = router(pipeline);

    tracing::info!("Web server started and listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
