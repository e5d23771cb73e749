// 🌐 REST API (Axum)
// Every request runs a full render pass; nothing is cached but the
// source connection.

use crate::dashboard::{DashboardView, DisplayTable, MonthOption};
use crate::error::SourceError;
use crate::period::YearMonth;
use crate::service::DashboardService;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

/// Shared application state
pub type AppState = Arc<DashboardService>;

/// API Response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MonthQuery {
    /// "2024-01" or "January 2024"
    pub month: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RejectedResponse {
    pub count: usize,
    pub date_column: String,
    pub rows: DisplayTable,
}

/// Request failures mapped to status codes.
pub enum ApiError {
    BadRequest(String),
    Source(SourceError),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Source(err) => {
                error!(error = %err, "Render pass failed");
                (StatusCode::BAD_GATEWAY, err.to_string())
            }
            ApiError::Internal(msg) => {
                error!(error = %msg, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };
        (status, Json(ApiResponse::<()>::err(message))).into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Run the blocking pass off the async workers.
async fn run_pass(state: AppState, query: &MonthQuery) -> Result<DashboardView, ApiError> {
    let requested = query
        .month
        .as_deref()
        .map(str::parse::<YearMonth>)
        .transpose()
        .map_err(ApiError::BadRequest)?;

    tokio::task::spawn_blocking(move || state.render(requested))
        .await
        .map_err(|e| ApiError::Internal(format!("render task failed: {}", e)))?
        .map_err(ApiError::Source)
}

/// GET /api/health
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/dashboard?month=YYYY-MM
async fn get_dashboard(
    State(state): State<AppState>,
    Query(query): Query<MonthQuery>,
) -> Result<Json<ApiResponse<DashboardView>>, ApiError> {
    let view = run_pass(state, &query).await?;
    Ok(Json(ApiResponse::ok(view)))
}

/// GET /api/months
async fn get_months(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<MonthOption>>>, ApiError> {
    let view = run_pass(state, &MonthQuery { month: None }).await?;
    Ok(Json(ApiResponse::ok(view.available_months)))
}

/// GET /api/rejected
async fn get_rejected(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<RejectedResponse>>, ApiError> {
    let date_column = state.date_column().to_string();
    let view = run_pass(state, &MonthQuery { month: None }).await?;
    Ok(Json(ApiResponse::ok(RejectedResponse {
        count: view.rejected_count,
        date_column,
        rows: view.rejected,
    })))
}

/// GET / - Serve index.html
async fn serve_index() -> impl IntoResponse {
    Html(include_str!("../web/index.html"))
}

/// Build the router the server binary uses.
pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/dashboard", get(get_dashboard))
        .route("/months", get(get_months))
        .route("/rejected", get(get_rejected))
        .with_state(state);

    Router::new()
        .route("/", get(serve_index))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Tests
// ============================================================================
