use crate::{error::AppError, AppState};
use axum::{
    extract::{rejection::JsonRejection, Multipart, State},
    Json,
};
use pipeline::{FilterReport, MarketDataReport, OptimizeRequest, PipelineError, PortfolioReport, RatingReport};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Body of the filter and rate routes.
#[derive(Debug, Deserialize)]
pub struct TickersRequest {
    #[serde(default)]
    pub tickers: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub tickers: Vec<String>,
    pub total_count: usize,
    pub message: String,
}

/// Turns a malformed JSON body into the structured error every route returns.
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

/// # GET /api/health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        message: "MarketMatch API is running",
    })
}

/// # POST /api/filter-stocks
pub async fn filter_stocks(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TickersRequest>, JsonRejection>,
) -> Result<Json<FilterReport>, AppError> {
    let request = body(payload)?;
    let report = state.pipeline.filter_stocks(&request.tickers).await?;
    Ok(Json(report))
}

/// # POST /api/rate-stocks
/// Candidates that pass filtering, best score first.
pub async fn rate_stocks(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TickersRequest>, JsonRejection>,
) -> Result<Json<RatingReport>, AppError> {
    let request = body(payload)?;
    let report = state.pipeline.rate_stocks(&request.tickers).await?;
    Ok(Json(report))
}

/// # POST /api/optimize-portfolio
pub async fn optimize_portfolio(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<OptimizeRequest>, JsonRejection>,
) -> Result<Json<PortfolioReport>, AppError> {
    let request = body(payload)?;
    let report = state.pipeline.optimize_portfolio(&request).await?;
    Ok(Json(report))
}

/// # GET /api/market-data
pub async fn market_data(State(state): State<Arc<AppState>>) -> Result<Json<MarketDataReport>, AppError> {
    let report = state.pipeline.market_data().await?;
    Ok(Json(report))
}

/// # POST /api/upload-csv
/// Reads the ticker list from the first column of the multipart `file` field.
pub async fn upload_csv(mut multipart: Multipart) -> Result<Json<UploadResponse>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let bytes = field.bytes().await.map_err(|e| AppError::BadRequest(e.body_text()))?;
        let tickers = market_data::parse_ticker_csv(bytes.as_ref())?;
        if tickers.is_empty() {
            return Err(PipelineError::EmptyRequest.into());
        }
        tracing::info!(count = tickers.len(), "Ticker file uploaded.");
        return Ok(Json(UploadResponse {
            total_count: tickers.len(),
            message: format!("Successfully loaded {} tickers", tickers.len()),
            tickers,
        }));
    }
    Err(AppError::BadRequest("No file provided".to_string()))
}
