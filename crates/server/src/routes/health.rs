use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json as ResponseJson, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use ts_rs::TS;
use utils_core::response::ApiResponse;

use crate::AppState;

#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: String,
    pub database: String,
    pub timestamp: DateTime<Utc>,
}

pub async fn health_check(State(state): State<AppState>) -> Response {
    match state.db().ping().await {
        Ok(()) => ResponseJson(ApiResponse::success(HealthStatus {
            status: "ok".to_string(),
            database: "connected".to_string(),
            timestamp: Utc::now(),
        }))
        .into_response(),
        Err(err) => {
            tracing::error!(error = %err, "health check database ping failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                ResponseJson(ApiResponse::<()>::error("Database unavailable")),
            )
                .into_response()
        }
    }
}
