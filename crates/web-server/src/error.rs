use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use market_data::ProviderError;
use pipeline::PipelineError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("Could not read the uploaded file: {0}")]
    Upload(#[from] ProviderError),
    #[error("{0}")]
    BadRequest(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Pipeline(err) => match err {
                PipelineError::EmptyRequest
                | PipelineError::NoValidStocks
                | PipelineError::InvalidRequest(_)
                | PipelineError::InsufficientUniverse { .. }
                | PipelineError::InfeasibleConstraints { .. } => StatusCode::BAD_REQUEST,
                PipelineError::DataUnavailable(_) => StatusCode::BAD_GATEWAY,
                PipelineError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                PipelineError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
                err if err.is_unprocessable() => StatusCode::UNPROCESSABLE_ENTITY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Upload(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AppError::Pipeline(err) => err.kind(),
            AppError::Upload(_) => "invalid-upload",
            AppError::BadRequest(_) => "bad-request",
        }
    }
}

/// Converts our custom `AppError` into an HTTP response.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = ?self, "Request failed.");
            "An internal error occurred while building the portfolio".to_string()
        } else {
            tracing::warn!(error = %self, status = %status, "Request rejected.");
            self.to_string()
        };

        let body = Json(json!({ "error": message, "kind": self.kind() }));
        (status, body).into_response()
    }
}
