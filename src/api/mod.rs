use axum::{
    extract::{multipart::Multipart, rejection::QueryRejection, DefaultBodyLimit, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use validator::Validate;

use crate::food::models::{ScanRecord, ScanResponse};
use crate::food::scan::{ScanError, ScanPipeline};

pub const DEFAULT_HISTORY_LIMIT: usize = 10;

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<ScanPipeline>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct HistoryQuery {
    #[validate(range(min = 1, max = 100))]
    limit: Option<usize>,
}

#[derive(Serialize)]
struct StatusResponse {
    message: String,
    status: String,
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

/// Error surfaced to HTTP callers as `{"detail": ...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }
}

impl From<ScanError> for ApiError {
    fn from(e: ScanError) -> Self {
        Self::new(e.status_code(), e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { detail: self.detail })).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Limits applied to the HTTP surface.
#[derive(Debug, Clone, Copy)]
pub struct ApiLimits {
    pub max_upload_bytes: usize,
    pub max_concurrent_scans: usize,
}

impl Default for ApiLimits {
    fn default() -> Self {
        Self {
            max_upload_bytes: 10 * 1024 * 1024,
            max_concurrent_scans: 16,
        }
    }
}

/// Create and configure the API router
pub fn create_api(pipeline: ScanPipeline, limits: ApiLimits) -> Router {
    let state = AppState {
        pipeline: Arc::new(pipeline),
    };

    // Fully permissive CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/", get(root))
        .route(
            "/api/scan",
            post(scan_handler).layer(ConcurrencyLimitLayer::new(limits.max_concurrent_scans.max(1))),
        )
        .route("/api/history", get(history_handler))
        .layer(DefaultBodyLimit::max(limits.max_upload_bytes))
        .layer(cors)
        .with_state(state)
}

async fn root() -> Json<StatusResponse> {
    Json(StatusResponse {
        message: "Welcome to MealScan API".to_string(),
        status: "running".to_string(),
    })
}

async fn scan_handler(State(state): State<AppState>, mut multipart: Multipart) -> ApiResult<ScanResponse> {
    let mut upload = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!("Malformed multipart upload: {}", e);
                return Err(ApiError::new(StatusCode::BAD_REQUEST, "Malformed upload"));
            }
        };

        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().map(|s| s.to_string());
        let content_type = field.content_type().map(|s| s.to_string());
        info!("Received file: {:?}, content_type: {:?}", file_name, content_type);

        let bytes = field.bytes().await.map_err(|e| {
            warn!("Failed to read upload: {}", e);
            ApiError::new(e.status(), "Could not read uploaded file")
        })?;
        upload = Some((content_type, bytes.to_vec()));
        break;
    }

    let (content_type, bytes) =
        upload.ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, "No file uploaded"))?;

    let outcome = state.pipeline.scan(content_type.as_deref(), bytes).await?;
    info!(
        "Scan complete: {} ({:.3}), nutrition {:?}, storage {:?}",
        outcome.record.food_item, outcome.record.confidence, outcome.nutrition, outcome.persistence
    );

    Ok(Json(outcome.response()))
}

async fn history_handler(
    State(state): State<AppState>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> ApiResult<Vec<ScanRecord>> {
    let Query(query) = query.map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e.body_text()))?;
    query.validate().map_err(|e| {
        ApiError::new(StatusCode::BAD_REQUEST, format!("Invalid history query: {}", e))
    })?;
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);

    let store = match state.pipeline.history() {
        Some(store) => store,
        None => return Ok(Json(Vec::new())),
    };

    store.list_recent(limit).await.map(Json).map_err(|e| {
        error!("Error fetching scan history: {}", e);
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Error fetching scan history")
    })
}
