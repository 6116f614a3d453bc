use axum::{
    Extension, Router,
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, post, put},
};
use chrono::NaiveDate;
use db::models::task::{
    BulkReorder, CreateTask, Page, ReorderOutcome, SortDirection, Task, TaskError, TaskFilters,
    TaskSort, TaskSortField, TaskStatus, UpdateTask,
};
use serde::{
    Deserialize, Serialize,
    de::{DeserializeOwned, IntoDeserializer, value::StrDeserializer},
};
use ts_rs::TS;
use utils_core::response::{ApiResponse, ErrorDetails};
use uuid::Uuid;

use crate::{
    AppState,
    error::ApiError,
    extract::{ApiJson, ApiQuery, parse_uuid},
    middleware::load_task_middleware,
};

/// Raw list query. Every field is parsed by hand so that bad values get a
/// readable 400 instead of a generic query rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskListQuery {
    pub profile_id: Option<String>,
    pub status: Option<String>,
    pub category_id: Option<String>,
    pub priority: Option<String>,
    pub search: Option<String>,
    pub due_date_from: Option<String>,
    pub due_date_to: Option<String>,
    pub sort_by: Option<String>,
    pub sort_direction: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

struct ParsedListQuery {
    profile_id: Uuid,
    filters: TaskFilters,
    sort: TaskSort,
    page: Page,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_enum<T: DeserializeOwned>(raw: &str, label: &str) -> Result<T, ApiError> {
    let deserializer: StrDeserializer<'_, serde::de::value::Error> = raw.into_deserializer();
    T::deserialize(deserializer).map_err(|_| ApiError::BadRequest(format!("Invalid {label}: {raw}")))
}

fn parse_date(raw: &str, label: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("{label} must be a YYYY-MM-DD date")))
}

impl TaskListQuery {
    fn parse(&self) -> Result<ParsedListQuery, ApiError> {
        let profile_id = present(&self.profile_id).ok_or_else(|| {
            ApiError::BadRequest("profileId query parameter is required".to_string())
        })?;
        let profile_id = parse_uuid(profile_id, "profile")?;

        let filters = TaskFilters {
            status: present(&self.status)
                .map(|raw| parse_enum(raw, "status"))
                .transpose()?,
            category_id: present(&self.category_id)
                .map(|raw| parse_uuid(raw, "category"))
                .transpose()?,
            priority: present(&self.priority)
                .map(|raw| parse_enum(raw, "priority"))
                .transpose()?,
            search: present(&self.search).map(str::to_string),
            due_date_from: present(&self.due_date_from)
                .map(|raw| parse_date(raw, "dueDateFrom"))
                .transpose()?,
            due_date_to: present(&self.due_date_to)
                .map(|raw| parse_date(raw, "dueDateTo"))
                .transpose()?,
        };

        let sort = TaskSort {
            field: present(&self.sort_by)
                .map(|raw| parse_enum::<TaskSortField>(raw, "sortBy"))
                .transpose()?
                .unwrap_or_default(),
            direction: present(&self.sort_direction)
                .map(|raw| parse_enum::<SortDirection>(raw, "sortDirection"))
                .transpose()?
                .unwrap_or_default(),
        };

        let limit = match present(&self.limit) {
            Some(raw) => match raw.parse::<u64>() {
                Ok(limit) if limit > 0 => Some(limit),
                _ => {
                    return Err(ApiError::BadRequest(
                        "limit must be a positive integer".to_string(),
                    ));
                }
            },
            None => None,
        };
        let offset = present(&self.offset)
            .map(|raw| {
                raw.parse::<u64>().map_err(|_| {
                    ApiError::BadRequest("offset must be a non-negative integer".to_string())
                })
            })
            .transpose()?;

        Ok(ParsedListQuery {
            profile_id,
            filters,
            sort,
            page: Page { limit, offset },
        })
    }
}

#[derive(Debug, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskStatus {
    pub status: TaskStatus,
}

#[derive(Debug, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct SearchTasksRequest {
    pub user_id: Uuid,
    pub query: String,
    #[serde(default)]
    #[ts(optional)]
    pub filters: Option<TaskFilters>,
}

#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct SearchTasksResponse {
    pub results: Vec<Task>,
    pub query: String,
    pub total: usize,
}

pub async fn get_tasks(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<TaskListQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Task>>>, ApiError> {
    let parsed = query.parse()?;
    let tasks = Task::find_by_profile(
        &state.db().pool,
        parsed.profile_id,
        &parsed.filters,
        parsed.sort,
        parsed.page,
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(tasks)))
}

pub async fn get_task(
    Extension(task): Extension<Task>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn create_task(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateTask>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Task>>), ApiError> {
    payload.validate().map_err(ApiError::validation)?;
    tracing::debug!(
        "Creating task '{}' in profile {}",
        payload.title,
        payload.profile_id
    );

    let task = Task::create(&state.db().pool, &payload, Uuid::new_v4()).await?;
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(task))))
}

pub async fn update_task(
    Extension(existing): Extension<Task>,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<UpdateTask>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    payload.validate().map_err(ApiError::validation)?;
    let task = Task::update(&state.db().pool, existing.id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn update_task_status(
    Extension(existing): Extension<Task>,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<UpdateTaskStatus>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let task = Task::update_status(&state.db().pool, existing.id, payload.status).await?;
    tracing::debug!(
        task_id = %task.id,
        from = %existing.status,
        to = %task.status,
        "task status changed"
    );
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn delete_task(
    Extension(task): Extension<Task>,
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let removed = Task::delete(&state.db().pool, task.id).await?;
    if removed == 0 {
        return Err(TaskError::TaskNotFound.into());
    }
    Ok(ResponseJson(ApiResponse::success_with_message(
        (),
        "Task deleted",
    )))
}

/// Validates the whole batch and checks every target before writing, so a
/// rejected request leaves all sort orders untouched.
pub async fn reorder_tasks(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<BulkReorder>,
) -> Result<ResponseJson<ApiResponse<ReorderOutcome>>, ApiError> {
    if payload.task_updates.is_empty() {
        let mut details = ErrorDetails::new();
        details.insert(
            "taskUpdates".to_string(),
            "At least one task update is required".to_string(),
        );
        return Err(ApiError::validation(details));
    }
    payload.validate().map_err(ApiError::validation)?;

    let pool = &state.db().pool;
    let ids: Vec<Uuid> = payload.task_updates.iter().map(|u| u.id).collect();
    Task::verify_reorder_targets(pool, &ids).await?;

    let updated = Task::bulk_update_sort_order(pool, &payload.task_updates).await?;
    tracing::info!(updated, "tasks reordered");
    Ok(ResponseJson(ApiResponse::success(ReorderOutcome {
        updated,
        failed: 0,
    })))
}

pub async fn search_tasks(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<SearchTasksRequest>,
) -> Result<ResponseJson<ApiResponse<SearchTasksResponse>>, ApiError> {
    let query = payload.query.trim().to_string();
    if query.is_empty() {
        let mut details = ErrorDetails::new();
        details.insert("query".to_string(), "Search query is required".to_string());
        return Err(ApiError::validation(details));
    }

    let filters = payload.filters.unwrap_or_default();
    let results = Task::search_for_user(&state.db().pool, payload.user_id, &query, &filters).await?;
    Ok(ResponseJson(ApiResponse::success(SearchTasksResponse {
        total: results.len(),
        results,
        query,
    })))
}

pub fn router(state: &AppState) -> Router<AppState> {
    let task_actions_router = Router::new()
        .route("/", put(update_task).delete(delete_task))
        .route("/status", put(update_task_status));

    let task_id_router = Router::new()
        .route("/", get(get_task))
        .merge(task_actions_router)
        .layer(from_fn_with_state(state.clone(), load_task_middleware::<AppState>));

    let inner = Router::new()
        .route("/", get(get_tasks).post(create_task))
        .route("/reorder", post(reorder_tasks))
        .route("/bulk-update-order", post(reorder_tasks))
        .route("/search", post(search_tasks))
        .nest("/{task_id}", task_id_router);

    Router::new().nest("/tasks", inner)
}
