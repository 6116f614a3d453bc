use axum::{Router, http::StatusCode, response::Json as ResponseJson, routing::get};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utils_core::response::ApiResponse;

use crate::{AppState, routes};

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .merge(routes::users::router(&state))
        .merge(routes::profiles::router(&state))
        .merge(routes::categories::router(&state))
        .merge(routes::tasks::router(&state))
        .fallback(api_not_found);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn api_not_found() -> (StatusCode, ResponseJson<ApiResponse<()>>) {
    (
        StatusCode::NOT_FOUND,
        ResponseJson(ApiResponse::error("Route not found")),
    )
}
