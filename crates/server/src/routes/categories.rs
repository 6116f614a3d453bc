use axum::{
    Extension, Router,
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::category::{Category, CategoryError, CreateCategory, UpdateCategory};
use serde::Deserialize;
use utils_core::response::ApiResponse;
use uuid::Uuid;

use crate::{
    AppState,
    error::ApiError,
    extract::{ApiJson, ApiQuery, parse_uuid},
    middleware::load_category_middleware,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryQuery {
    pub profile_id: Option<String>,
}

pub async fn get_categories(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CategoryQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Category>>>, ApiError> {
    let raw = query.profile_id.ok_or_else(|| {
        ApiError::BadRequest("profileId query parameter is required".to_string())
    })?;
    let profile_id = parse_uuid(&raw, "profile")?;
    let categories = Category::find_by_profile_id(&state.db().pool, profile_id).await?;
    Ok(ResponseJson(ApiResponse::success(categories)))
}

pub async fn get_category(
    Extension(category): Extension<Category>,
) -> Result<ResponseJson<ApiResponse<Category>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(category)))
}

pub async fn create_category(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateCategory>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Category>>), ApiError> {
    payload.validate().map_err(ApiError::validation)?;
    let category = Category::create(&state.db().pool, &payload, Uuid::new_v4()).await?;
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(category))))
}

pub async fn update_category(
    Extension(category): Extension<Category>,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<UpdateCategory>,
) -> Result<ResponseJson<ApiResponse<Category>>, ApiError> {
    payload.validate().map_err(ApiError::validation)?;
    let category = Category::update(&state.db().pool, category.id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(category)))
}

pub async fn delete_category(
    Extension(category): Extension<Category>,
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let removed = Category::delete(&state.db().pool, category.id).await?;
    if removed == 0 {
        return Err(CategoryError::CategoryNotFound.into());
    }
    Ok(ResponseJson(ApiResponse::success_with_message(
        (),
        "Category deleted",
    )))
}

pub fn router(state: &AppState) -> Router<AppState> {
    let category_id_router = Router::new()
        .route(
            "/",
            get(get_category).put(update_category).delete(delete_category),
        )
        .layer(from_fn_with_state(state.clone(), load_category_middleware::<AppState>));

    let inner = Router::new()
        .route("/", get(get_categories).post(create_category))
        .nest("/{category_id}", category_id_router);

    Router::new().nest("/categories", inner)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::{
        http,
        test_utils::{send, test_state},
    };

    #[tokio::test]
    async fn deleting_a_category_keeps_its_tasks() {
        let app = http::router(test_state().await);
        let (_, user) = send(
            &app,
            "POST",
            "/api/users",
            Some(json!({"email": "lin@example.com", "name": "Lin"})),
        )
        .await;
        let (_, profile) = send(
            &app,
            "POST",
            "/api/profiles",
            Some(json!({"userId": user["data"]["id"], "name": "Work"})),
        )
        .await;
        let profile_id = profile["data"]["id"].as_str().unwrap().to_string();

        let (status, category) = send(
            &app,
            "POST",
            "/api/categories",
            Some(json!({"profileId": profile_id, "name": "Errands", "color": "#10b981"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let category_id = category["data"]["id"].as_str().unwrap().to_string();

        let (_, task) = send(
            &app,
            "POST",
            "/api/tasks",
            Some(json!({"profileId": profile_id, "categoryId": category_id, "title": "Post office"})),
        )
        .await;
        let task_id = task["data"]["id"].as_str().unwrap().to_string();
        assert_eq!(task["data"]["categoryId"], category_id.as_str());

        let (status, _) = send(
            &app,
            "DELETE",
            &format!("/api/categories/{category_id}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, task) = send(&app, "GET", &format!("/api/tasks/{task_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(task["data"]["categoryId"].is_null());

        let (_, listed) = send(
            &app,
            "GET",
            &format!("/api/categories?profileId={profile_id}"),
            None,
        )
        .await;
        assert_eq!(listed["data"].as_array().map(Vec::len), Some(0));
    }

    #[tokio::test]
    async fn bad_color_is_a_validation_error() {
        let app = http::router(test_state().await);
        let (status, body) = send(
            &app,
            "POST",
            "/api/categories",
            Some(json!({
                "profileId": uuid::Uuid::new_v4(),
                "name": "Colors",
                "color": "blue",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["details"]["color"].is_string());
    }
}
