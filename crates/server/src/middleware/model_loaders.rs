use std::{fmt::Display, future::Future};

use axum::{
    extract::{Path, Request, State},
    middleware::Next,
    response::Response,
};
use db::{
    DBService,
    models::{category::Category, profile::Profile, task::Task, user::User},
};
use uuid::Uuid;

use crate::{AppState, error::ApiError, extract::parse_uuid};

pub trait ModelLoaderDeps {
    fn db_service(&self) -> &DBService;
}

impl ModelLoaderDeps for AppState {
    fn db_service(&self) -> &DBService {
        self.db()
    }
}

async fn fetch_model_or_status<M, E, Fut>(
    model_name: &'static str,
    model_id: Uuid,
    load_future: Fut,
) -> Result<M, ApiError>
where
    E: Display,
    Fut: Future<Output = Result<Option<M>, E>>,
{
    match load_future.await {
        Ok(Some(model)) => Ok(model),
        Ok(None) => {
            tracing::warn!("{model_name} {model_id} not found");
            Err(ApiError::NotFound(format!("{model_name} not found")))
        }
        Err(error) => {
            tracing::error!("Failed to fetch {model_name} {model_id}: {error}");
            Err(ApiError::Internal(format!("failed to load {model_name}")))
        }
    }
}

async fn load_request_extension<M, E, Fut>(
    request: Request,
    next: Next,
    model_name: &'static str,
    model_id: Uuid,
    load_future: Fut,
) -> Result<Response, ApiError>
where
    M: Clone + Send + Sync + 'static,
    E: Display,
    Fut: Future<Output = Result<Option<M>, E>>,
{
    let model = fetch_model_or_status(model_name, model_id, load_future).await?;
    let mut request = request;
    request.extensions_mut().insert(model);
    Ok(next.run(request).await)
}

pub async fn load_user_middleware<S>(
    State(state): State<S>,
    Path(user_id): Path<String>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError>
where
    S: ModelLoaderDeps,
{
    let user_id = parse_uuid(&user_id, "user")?;
    load_request_extension(
        request,
        next,
        "User",
        user_id,
        User::find_by_id(&state.db_service().pool, user_id),
    )
    .await
}

pub async fn load_profile_middleware<S>(
    State(state): State<S>,
    Path(profile_id): Path<String>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError>
where
    S: ModelLoaderDeps,
{
    let profile_id = parse_uuid(&profile_id, "profile")?;
    load_request_extension(
        request,
        next,
        "Profile",
        profile_id,
        Profile::find_by_id(&state.db_service().pool, profile_id),
    )
    .await
}

pub async fn load_category_middleware<S>(
    State(state): State<S>,
    Path(category_id): Path<String>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError>
where
    S: ModelLoaderDeps,
{
    let category_id = parse_uuid(&category_id, "category")?;
    load_request_extension(
        request,
        next,
        "Category",
        category_id,
        Category::find_by_id(&state.db_service().pool, category_id),
    )
    .await
}

pub async fn load_task_middleware<S>(
    State(state): State<S>,
    Path(task_id): Path<String>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError>
where
    S: ModelLoaderDeps,
{
    let task_id = parse_uuid(&task_id, "task")?;
    load_request_extension(
        request,
        next,
        "Task",
        task_id,
        Task::find_by_id(&state.db_service().pool, task_id),
    )
    .await
}
