use axum::{
    Extension, Router,
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::user::{CreateUser, UpdateUser, User};
use utils_core::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError, extract::ApiJson, middleware::load_user_middleware};

pub async fn get_users(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<User>>>, ApiError> {
    let users = User::find_all(&state.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(users)))
}

pub async fn get_user(
    Extension(user): Extension<User>,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(user)))
}

pub async fn create_user(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateUser>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<User>>), ApiError> {
    payload.validate().map_err(ApiError::validation)?;
    let user = User::create(&state.db().pool, &payload, Uuid::new_v4()).await?;
    tracing::info!(user_id = %user.id, "user created");
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(user))))
}

pub async fn update_user(
    Extension(user): Extension<User>,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<UpdateUser>,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    payload.validate().map_err(ApiError::validation)?;
    let user = User::update(&state.db().pool, user.id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(user)))
}

pub async fn delete_user(
    Extension(user): Extension<User>,
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let removed = User::delete(&state.db().pool, user.id).await?;
    if removed == 0 {
        return Err(ApiError::NotFound("User not found".to_string()));
    }
    tracing::info!(user_id = %user.id, "user deleted");
    Ok(ResponseJson(ApiResponse::success_with_message(
        (),
        "User deleted",
    )))
}

pub fn router(state: &AppState) -> Router<AppState> {
    let user_id_router = Router::new()
        .route("/", get(get_user).put(update_user).delete(delete_user))
        .layer(from_fn_with_state(state.clone(), load_user_middleware::<AppState>));

    let inner = Router::new()
        .route("/", get(get_users).post(create_user))
        .nest("/{user_id}", user_id_router);

    Router::new().nest("/users", inner)
}
