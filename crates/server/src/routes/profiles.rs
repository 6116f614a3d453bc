use axum::{
    Extension, Router,
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{
    profile::{CreateProfile, Profile, ProfileError, ProfileWithStats, UpdateProfile},
    task::{Task, TaskStats},
};
use serde::Deserialize;
use utils_core::response::ApiResponse;
use uuid::Uuid;

use crate::{
    AppState,
    error::ApiError,
    extract::{ApiJson, ApiQuery, parse_uuid},
    middleware::load_profile_middleware,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileQuery {
    pub user_id: Option<String>,
}

pub async fn get_profiles(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ProfileQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Profile>>>, ApiError> {
    let raw = query
        .user_id
        .ok_or_else(|| ApiError::BadRequest("userId query parameter is required".to_string()))?;
    let user_id = parse_uuid(&raw, "user")?;
    let profiles = Profile::find_by_user_id(&state.db().pool, user_id).await?;
    Ok(ResponseJson(ApiResponse::success(profiles)))
}

pub async fn get_profile(
    Extension(profile): Extension<Profile>,
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<ProfileWithStats>>, ApiError> {
    let with_stats = Profile::find_with_stats(&state.db().pool, profile.id)
        .await?
        .ok_or(ProfileError::ProfileNotFound)?;
    Ok(ResponseJson(ApiResponse::success(with_stats)))
}

pub async fn get_profile_stats(
    Extension(profile): Extension<Profile>,
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<TaskStats>>, ApiError> {
    let stats = Task::stats_for_profile(&state.db().pool, profile.id).await?;
    Ok(ResponseJson(ApiResponse::success(stats)))
}

pub async fn create_profile(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateProfile>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Profile>>), ApiError> {
    payload.validate().map_err(ApiError::validation)?;
    let profile = Profile::create(&state.db().pool, &payload, Uuid::new_v4()).await?;
    tracing::info!(profile_id = %profile.id, user_id = %profile.user_id, "profile created");
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(profile))))
}

pub async fn update_profile(
    Extension(profile): Extension<Profile>,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<UpdateProfile>,
) -> Result<ResponseJson<ApiResponse<Profile>>, ApiError> {
    payload.validate().map_err(ApiError::validation)?;
    let profile = Profile::update(&state.db().pool, profile.id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(profile)))
}

pub async fn delete_profile(
    Extension(profile): Extension<Profile>,
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let removed = Profile::delete(&state.db().pool, profile.id).await?;
    if removed == 0 {
        return Err(ProfileError::ProfileNotFound.into());
    }
    tracing::info!(profile_id = %profile.id, "profile deleted");
    Ok(ResponseJson(ApiResponse::success_with_message(
        (),
        "Profile deleted",
    )))
}

pub fn router(state: &AppState) -> Router<AppState> {
    let profile_id_router = Router::new()
        .route(
            "/",
            get(get_profile).put(update_profile).delete(delete_profile),
        )
        .route("/stats", get(get_profile_stats))
        .layer(from_fn_with_state(state.clone(), load_profile_middleware::<AppState>));

    let inner = Router::new()
        .route("/", get(get_profiles).post(create_profile))
        .nest("/{profile_id}", profile_id_router);

    Router::new().nest("/profiles", inner)
}

#[cfg(test)]
mod tests {
    use axum::{Router, http::StatusCode};
    use serde_json::{Value, json};

    use crate::{
        http,
        test_utils::{send, test_state},
    };

    async fn create_user(app: &Router) -> String {
        let (_, body) = send(
            app,
            "POST",
            "/api/users",
            Some(json!({"email": "grace@example.com", "name": "Grace"})),
        )
        .await;
        body["data"]["id"].as_str().unwrap().to_string()
    }

    async fn create_profile(app: &Router, user_id: &str, name: &str) -> (StatusCode, Value) {
        send(
            app,
            "POST",
            "/api/profiles",
            Some(json!({"userId": user_id, "name": name, "color": "#3B82F6"})),
        )
        .await
    }

    #[tokio::test]
    async fn profile_names_conflict_case_insensitively() {
        let app = http::router(test_state().await);
        let user_id = create_user(&app).await;

        let (status, _) = create_profile(&app, &user_id, "Work").await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) = create_profile(&app, &user_id, "work").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn profile_detail_includes_task_stats() {
        let app = http::router(test_state().await);
        let user_id = create_user(&app).await;
        let (_, body) = create_profile(&app, &user_id, "Home").await;
        let profile_id = body["data"]["id"].as_str().unwrap().to_string();

        for title in ["a", "b"] {
            let (status, _) = send(
                &app,
                "POST",
                "/api/tasks",
                Some(json!({"profileId": profile_id, "title": title})),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, body) = send(&app, "GET", &format!("/api/profiles/{profile_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], "Home");
        assert_eq!(body["data"]["taskStats"]["total"], 2);
        assert_eq!(body["data"]["taskStats"]["pending"], 2);

        let (_, body) = send(
            &app,
            "GET",
            &format!("/api/profiles/{profile_id}/stats"),
            None,
        )
        .await;
        assert_eq!(body["data"]["inProgress"], 0);
    }

    #[tokio::test]
    async fn listing_requires_a_valid_user_id() {
        let app = http::router(test_state().await);
        let (status, _) = send(&app, "GET", "/api/profiles", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, body) = send(&app, "GET", "/api/profiles?userId=xyz", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid user ID format");
    }

    #[tokio::test]
    async fn unknown_user_cannot_own_a_profile() {
        let app = http::router(test_state().await);
        let (status, _) = create_profile(&app, &uuid::Uuid::new_v4().to_string(), "Ghost").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
