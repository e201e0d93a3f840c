use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::{Body, Bytes},
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tallyscan_core::{ExtractionResult, ScanError, TransactionRecord};
use tallyscan_ocr::{OcrBackend, ReceiptPipeline};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::{RawTextMode, ServerConfig};

pub type SharedPipeline = Arc<ReceiptPipeline<Box<dyn OcrBackend>>>;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: SharedPipeline,
    pub raw_text: RawTextMode,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResponse {
    pub success: bool,
    pub transactions: Vec<TransactionRecord>,
    pub raw_text: String,
}

impl ScanResponse {
    pub fn new(result: ExtractionResult, mode: RawTextMode) -> Self {
        let raw_text = match mode {
            RawTextMode::Ocr => result.raw_text.clone(),
            RawTextMode::Summary => result.summary_text(),
        };
        Self { success: true, transactions: result.transactions, raw_text }
    }
}

#[derive(Debug, Serialize)]
pub struct FailureResponse {
    pub success: bool,
    pub message: String,
}

/// Every failure leaves the endpoint as `{ success: false, message }`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

/// Scan failures: 400 for bad input, 500 otherwise.
impl From<ScanError> for ApiError {
    fn from(e: ScanError) -> Self {
        let status = if e.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        ApiError { status, message: e.to_string() }
    }
}

/// Body that could not be read, e.g. over the size limit (413).
impl From<BytesRejection> for ApiError {
    fn from(rejection: BytesRejection) -> Self {
        ApiError { status: rejection.status(), message: rejection.body_text() }
    }
}

impl ApiError {
    pub fn body(&self) -> FailureResponse {
        FailureResponse { success: false, message: self.message.clone() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body())).into_response()
    }
}

pub fn router(state: AppState, config: &ServerConfig) -> Result<Router> {
    let app = Router::new()
        .route("/api/ocr", post(scan_image))
        .route("/health", get(health))
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(cors_layer(&config.cors_origins)?)
        .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
            tracing::info_span!(
                "http_request",
                method = %req.method(),
                uri = %req.uri(),
                request_id = %uuid::Uuid::new_v4(),
            )
        }));
    Ok(app)
}

fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    if origins.is_empty() {
        return Ok(CorsLayer::permissive());
    }
    let origins = origins
        .iter()
        .map(|o| {
            HeaderValue::from_str(o).with_context(|| format!("invalid CORS origin '{o}'"))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any))
}

/// GET /health
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// POST /api/ocr. Body is the raw image with `Content-Type: image/*`.
async fn scan_image(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<ScanResponse>, ApiError> {
    let body = body.inspect_err(|r| tracing::warn!("Rejected request body: {}", r.body_text()))?;
    if !is_image_content(&headers) || body.is_empty() {
        tracing::warn!(bytes = body.len(), "Rejected request without image payload");
        return Err(ScanError::InvalidInput("No image data provided".to_string()).into());
    }

    let result = state
        .pipeline
        .process_bytes(&body)
        .await
        .map_err(ScanError::from)?;

    Ok(Json(ScanResponse::new(result, state.raw_text)))
}

fn is_image_content(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_ascii_lowercase().starts_with("image/"))
        .unwrap_or(false)
}
