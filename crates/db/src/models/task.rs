use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Select, Set, TransactionSession, TransactionTrait,
};
use sea_orm::sea_query::{Expr, Order};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use utils_core::{response::ErrorDetails, serde_helpers::deserialize_some};
use uuid::Uuid;

pub use crate::types::{TaskPriority, TaskStatus};
use super::{
    ids,
    validation::{check_length, finish},
};
use crate::{
    entities::{category, profile, task},
    retry::{BusyError, retry_on_sqlite_busy},
};

pub const CROSS_PARTITION_MESSAGE: &str = "All tasks must belong to the same profile";

#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Task not found")]
    TaskNotFound,
    #[error("Profile not found")]
    ProfileNotFound,
    #[error("Category not found")]
    CategoryNotFound,
    #[error("Category does not belong to the task's profile")]
    CategoryProfileMismatch,
    #[error("{CROSS_PARTITION_MESSAGE}")]
    CrossPartition,
    #[error("Invalid reorder request")]
    InvalidReorder(ErrorDetails),
}

impl BusyError for TaskError {
    fn is_sqlite_busy(&self) -> bool {
        matches!(self, TaskError::Database(err) if err.is_sqlite_busy())
    }
}

/// The ordering domain of a task. Sort orders only compare within one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct PartitionKey {
    pub profile_id: Uuid,
    pub status: TaskStatus,
}

impl PartitionKey {
    pub fn new(profile_id: Uuid, status: TaskStatus) -> Self {
        Self { profile_id, status }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub category_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<NaiveDate>,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CreateTask {
    pub profile_id: Uuid,
    #[serde(default)]
    pub category_id: Option<Uuid>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

impl CreateTask {
    pub fn new(profile_id: Uuid, title: impl Into<String>) -> Self {
        Self {
            profile_id,
            category_id: None,
            title: title.into(),
            description: None,
            status: None,
            priority: None,
            due_date: None,
        }
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn validate(&self) -> Result<(), ErrorDetails> {
        let mut details = ErrorDetails::new();
        check_length(&mut details, "title", "Task title", &self.title, 200);
        finish(details)
    }
}

/// Partial update. Absent fields are left alone; `null` clears nullable ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTask {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub title: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_some"
    )]
    #[ts(optional)]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub priority: Option<TaskPriority>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_some"
    )]
    #[ts(optional)]
    pub due_date: Option<Option<NaiveDate>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_some"
    )]
    #[ts(optional)]
    pub category_id: Option<Option<Uuid>>,
}

impl UpdateTask {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ErrorDetails> {
        let mut details = ErrorDetails::new();
        if let Some(title) = &self.title {
            check_length(&mut details, "title", "Task title", title, 200);
        }
        finish(details)
    }

    /// Applies the patch to an in-memory copy. Category ids are taken as given.
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.trim().to_string();
        }
        if let Some(description) = &self.description {
            task.description = normalize_description(description.as_deref());
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
        if let Some(category_id) = self.category_id {
            task.category_id = category_id;
        }
    }
}

fn normalize_description(description: Option<&str>) -> Option<String> {
    description
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct TaskSortUpdate {
    pub id: Uuid,
    pub sort_order: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct BulkReorder {
    pub task_updates: Vec<TaskSortUpdate>,
}

impl BulkReorder {
    pub fn validate(&self) -> Result<(), ErrorDetails> {
        validate_sort_updates(&self.task_updates)
    }
}

/// Rejects negative sort orders and repeated ids or sort orders in one batch.
pub fn validate_sort_updates(updates: &[TaskSortUpdate]) -> Result<(), ErrorDetails> {
    let mut details = ErrorDetails::new();
    let mut seen_ids = HashSet::with_capacity(updates.len());
    let mut seen_orders = HashSet::with_capacity(updates.len());
    for (index, update) in updates.iter().enumerate() {
        if update.sort_order < 0 {
            details.insert(
                format!("taskUpdates.{index}.sortOrder"),
                "Sort order must be greater than or equal to 0".to_string(),
            );
        } else if !seen_orders.insert(update.sort_order) {
            details.insert(
                format!("taskUpdates.{index}.sortOrder"),
                "Duplicate sort order".to_string(),
            );
        }
        if !seen_ids.insert(update.id) {
            details.insert(
                format!("taskUpdates.{index}.id"),
                "Duplicate task ID".to_string(),
            );
        }
    }
    finish(details)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct ReorderOutcome {
    #[ts(type = "number")]
    pub updated: u64,
    #[ts(type = "number")]
    pub failed: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    #[ts(type = "number")]
    pub total: u64,
    #[ts(type = "number")]
    pub pending: u64,
    #[ts(type = "number")]
    pub in_progress: u64,
    #[ts(type = "number")]
    pub completed: u64,
    #[ts(type = "number")]
    pub overdue: u64,
}

impl TaskStats {
    /// Overdue means due strictly before `today` and not completed.
    pub fn tally(
        rows: impl IntoIterator<Item = (TaskStatus, Option<NaiveDate>)>,
        today: NaiveDate,
    ) -> Self {
        let mut stats = Self::default();
        for (status, due_date) in rows {
            stats.total += 1;
            match status {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::InProgress => stats.in_progress += 1,
                TaskStatus::Completed => stats.completed += 1,
            }
            if status != TaskStatus::Completed && due_date.is_some_and(|due| due < today) {
                stats.overdue += 1;
            }
        }
        stats
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct TaskFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub category_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub priority: Option<TaskPriority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub due_date_from: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub due_date_to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub enum TaskSortField {
    Title,
    DueDate,
    Priority,
    Status,
    CreatedAt,
    #[default]
    SortOrder,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskSort {
    pub field: TaskSortField,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Task {
    pub fn partition(&self) -> PartitionKey {
        PartitionKey::new(self.profile_id, self.status)
    }

    fn from_parts(model: task::Model, profile_id: Uuid, category_id: Option<Uuid>) -> Self {
        Self {
            id: model.uuid,
            profile_id,
            category_id,
            title: model.title,
            description: model.description,
            status: model.status,
            priority: model.priority,
            due_date: model.due_date,
            sort_order: model.sort_order,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }

    async fn from_model<C: ConnectionTrait>(db: &C, model: task::Model) -> Result<Self, DbErr> {
        let profile_id = ids::profile_uuid_by_id(db, model.profile_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Profile not found".to_string()))?;
        let category_id = match model.category_id {
            Some(id) => ids::category_uuid_by_id(db, id).await?,
            None => None,
        };
        Ok(Self::from_parts(model, profile_id, category_id))
    }

    async fn from_models<C: ConnectionTrait>(
        db: &C,
        models: Vec<task::Model>,
    ) -> Result<Vec<Self>, DbErr> {
        let profile_ids: HashSet<i64> = models.iter().map(|m| m.profile_id).collect();
        let category_ids: HashSet<i64> = models.iter().filter_map(|m| m.category_id).collect();
        let profiles = ids::profile_uuids_by_ids(db, profile_ids).await?;
        let categories = ids::category_uuids_by_ids(db, category_ids).await?;

        models
            .into_iter()
            .map(|model| {
                let profile_id = *profiles
                    .get(&model.profile_id)
                    .ok_or(DbErr::RecordNotFound("Profile not found".to_string()))?;
                let category_id = model
                    .category_id
                    .and_then(|id| categories.get(&id).copied());
                Ok(Self::from_parts(model, profile_id, category_id))
            })
            .collect()
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Self>, DbErr> {
        let record = task::Entity::find()
            .filter(task::Column::Uuid.eq(id))
            .one(db)
            .await?;

        match record {
            Some(model) => Ok(Some(Self::from_model(db, model).await?)),
            None => Ok(None),
        }
    }

    /// Tasks of one profile in manual order, optionally limited to one status.
    pub async fn find_by_partition<C: ConnectionTrait>(
        db: &C,
        profile_id: Uuid,
        status: Option<TaskStatus>,
    ) -> Result<Vec<Self>, DbErr> {
        let Some(profile_row_id) = ids::profile_id_by_uuid(db, profile_id).await? else {
            return Ok(Vec::new());
        };
        let mut query = task::Entity::find().filter(task::Column::ProfileId.eq(profile_row_id));
        if let Some(status) = status {
            query = query.filter(task::Column::Status.eq(status));
        }
        let models = with_stable_order(query).all(db).await?;
        Self::from_models(db, models).await
    }

    pub async fn find_by_profile<C: ConnectionTrait>(
        db: &C,
        profile_id: Uuid,
        filters: &TaskFilters,
        sort: TaskSort,
        page: Page,
    ) -> Result<Vec<Self>, DbErr> {
        let Some(profile_row_id) = ids::profile_id_by_uuid(db, profile_id).await? else {
            return Ok(Vec::new());
        };
        let query = task::Entity::find().filter(task::Column::ProfileId.eq(profile_row_id));
        let Some(query) = apply_filters(db, query, filters, &[profile_row_id]).await? else {
            return Ok(Vec::new());
        };

        let column = match sort.field {
            TaskSortField::Title => task::Column::Title,
            TaskSortField::DueDate => task::Column::DueDate,
            TaskSortField::Priority => task::Column::Priority,
            TaskSortField::Status => task::Column::Status,
            TaskSortField::CreatedAt => task::Column::CreatedAt,
            TaskSortField::SortOrder => task::Column::SortOrder,
        };
        let order = match sort.direction {
            SortDirection::Asc => Order::Asc,
            SortDirection::Desc => Order::Desc,
        };
        let models = with_stable_order(query.order_by(column, order))
            .limit(page.limit)
            .offset(page.offset)
            .all(db)
            .await?;
        Self::from_models(db, models).await
    }

    /// Matches title, description or category name across all of a user's profiles.
    pub async fn search_for_user<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        search: &str,
        filters: &TaskFilters,
    ) -> Result<Vec<Self>, DbErr> {
        let Some(user_row_id) = ids::user_id_by_uuid(db, user_id).await? else {
            return Ok(Vec::new());
        };
        let profile_row_ids: Vec<i64> = profile::Entity::find()
            .select_only()
            .column(profile::Column::Id)
            .filter(profile::Column::UserId.eq(user_row_id))
            .into_tuple()
            .all(db)
            .await?;
        if profile_row_ids.is_empty() {
            return Ok(Vec::new());
        }

        let filters = TaskFilters {
            search: Some(search.to_string()),
            ..filters.clone()
        };
        let query =
            task::Entity::find().filter(task::Column::ProfileId.is_in(profile_row_ids.clone()));
        let Some(query) = apply_filters(db, query, &filters, &profile_row_ids).await? else {
            return Ok(Vec::new());
        };
        let models = query
            .order_by_desc(task::Column::UpdatedAt)
            .order_by_asc(task::Column::Id)
            .all(db)
            .await?;
        Self::from_models(db, models).await
    }

    /// Inserts the task at the end of its partition.
    ///
    /// The transaction opens with a write to the owning profile row, so SQLite
    /// hands out its write lock before the max lookup runs. Concurrent creators
    /// queue on the connection's busy timeout instead of failing on a lock
    /// upgrade; whatever busy error still escapes replays the whole attempt.
    pub async fn create<C>(db: &C, data: &CreateTask, task_id: Uuid) -> Result<Self, TaskError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        retry_on_sqlite_busy(|| Self::create_once(db, data, task_id)).await
    }

    async fn create_once<C>(db: &C, data: &CreateTask, task_id: Uuid) -> Result<Self, TaskError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let tx = db.begin().await?;
        let profile_row_id = claim_profile(&tx, data.profile_id).await?;
        let category_row_id = match data.category_id {
            Some(id) => Some(category_row_in_profile(&tx, id, profile_row_id).await?),
            None => None,
        };
        let status = data.status.unwrap_or_default();
        let sort_order = next_sort_order(&tx, profile_row_id, status).await?;

        let now = Utc::now();
        let active = task::ActiveModel {
            uuid: Set(task_id),
            profile_id: Set(profile_row_id),
            category_id: Set(category_row_id),
            title: Set(data.title.trim().to_string()),
            description: Set(normalize_description(data.description.as_deref())),
            status: Set(status),
            priority: Set(data.priority.unwrap_or_default()),
            due_date: Set(data.due_date),
            sort_order: Set(sort_order),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        let model = active.insert(&tx).await?;
        tx.commit().await?;

        tracing::debug!(task_id = %task_id, status = %status, sort_order, "task created");
        Ok(Self::from_parts(model, data.profile_id, data.category_id))
    }

    /// Applies a field patch. The sort order is never touched, even when the
    /// status moves the task into another partition.
    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        data: &UpdateTask,
    ) -> Result<Self, TaskError> {
        let record = task::Entity::find()
            .filter(task::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(TaskError::TaskNotFound)?;

        let profile_row_id = record.profile_id;
        let mut active: task::ActiveModel = record.into();
        if let Some(title) = &data.title {
            active.title = Set(title.trim().to_string());
        }
        if let Some(description) = &data.description {
            active.description = Set(normalize_description(description.as_deref()));
        }
        if let Some(status) = data.status {
            active.status = Set(status);
        }
        if let Some(priority) = data.priority {
            active.priority = Set(priority);
        }
        if let Some(due_date) = data.due_date {
            active.due_date = Set(due_date);
        }
        if let Some(category_id) = data.category_id {
            let row_id = match category_id {
                Some(id) => Some(category_row_in_profile(db, id, profile_row_id).await?),
                None => None,
            };
            active.category_id = Set(row_id);
        }
        active.updated_at = Set(Utc::now().into());

        let updated = active.update(db).await?;
        Ok(Self::from_model(db, updated).await?)
    }

    /// Moves a task to another status partition, keeping its numeric sort order.
    pub async fn update_status<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        status: TaskStatus,
    ) -> Result<Self, TaskError> {
        let result = task::Entity::update_many()
            .col_expr(task::Column::Status, Expr::value(status))
            .col_expr(task::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(task::Column::Uuid.eq(id))
            .exec(db)
            .await?;
        if result.rows_affected == 0 {
            return Err(TaskError::TaskNotFound);
        }
        Self::find_by_id(db, id)
            .await?
            .ok_or(TaskError::TaskNotFound)
    }

    /// Checks that every id resolves and that all of them share one profile.
    pub async fn verify_reorder_targets<C: ConnectionTrait>(
        db: &C,
        ids: &[Uuid],
    ) -> Result<(), TaskError> {
        load_reorder_targets(db, ids).await.map(|_| ())
    }

    /// Writes every sort order in one transaction. Nothing is written unless
    /// all ids exist and belong to the same profile.
    pub async fn bulk_update_sort_order<C>(
        db: &C,
        updates: &[TaskSortUpdate],
    ) -> Result<u64, TaskError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        validate_sort_updates(updates).map_err(TaskError::InvalidReorder)?;
        if updates.is_empty() {
            return Ok(0);
        }
        retry_on_sqlite_busy(|| Self::bulk_update_once(db, updates)).await
    }

    async fn bulk_update_once<C>(db: &C, updates: &[TaskSortUpdate]) -> Result<u64, TaskError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let tx = db.begin().await?;
        let ids: Vec<Uuid> = updates.iter().map(|u| u.id).collect();
        let now = Utc::now();
        // Write first so the transaction holds the lock before validating.
        task::Entity::update_many()
            .col_expr(task::Column::UpdatedAt, Expr::value(now))
            .filter(task::Column::Uuid.is_in(ids.iter().copied()))
            .exec(&tx)
            .await?;
        load_reorder_targets(&tx, &ids).await?;

        let mut updated = 0;
        for update in updates {
            let result = task::Entity::update_many()
                .col_expr(task::Column::SortOrder, Expr::value(update.sort_order))
                .col_expr(task::Column::UpdatedAt, Expr::value(now))
                .filter(task::Column::Uuid.eq(update.id))
                .exec(&tx)
                .await?;
            if result.rows_affected == 0 {
                return Err(TaskError::TaskNotFound);
            }
            updated += result.rows_affected;
        }
        tx.commit().await?;

        tracing::debug!(updated, "task sort orders updated");
        Ok(updated)
    }

    pub async fn delete<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<u64, DbErr> {
        let result = task::Entity::delete_many()
            .filter(task::Column::Uuid.eq(id))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn stats_for_profile<C: ConnectionTrait>(
        db: &C,
        profile_id: Uuid,
    ) -> Result<TaskStats, DbErr> {
        let Some(profile_row_id) = ids::profile_id_by_uuid(db, profile_id).await? else {
            return Ok(TaskStats::default());
        };
        let rows: Vec<(TaskStatus, Option<NaiveDate>)> = task::Entity::find()
            .select_only()
            .column(task::Column::Status)
            .column(task::Column::DueDate)
            .filter(task::Column::ProfileId.eq(profile_row_id))
            .into_tuple()
            .all(db)
            .await?;
        Ok(TaskStats::tally(rows, Utc::now().date_naive()))
    }
}

fn with_stable_order(query: Select<task::Entity>) -> Select<task::Entity> {
    query
        .order_by_asc(task::Column::SortOrder)
        .order_by_asc(task::Column::CreatedAt)
        .order_by_asc(task::Column::Id)
}

async fn next_sort_order<C: ConnectionTrait>(
    db: &C,
    profile_row_id: i64,
    status: TaskStatus,
) -> Result<i32, DbErr> {
    let max: Option<Option<i32>> = task::Entity::find()
        .select_only()
        .column_as(task::Column::SortOrder.max(), "max_sort_order")
        .filter(task::Column::ProfileId.eq(profile_row_id))
        .filter(task::Column::Status.eq(status))
        .into_tuple()
        .one(db)
        .await?;
    Ok(max.flatten().map_or(0, |max| max + 1))
}

/// Touches the profile row as the transaction's first statement, taking the
/// database write lock, and returns its row id.
async fn claim_profile<C: ConnectionTrait>(tx: &C, profile_id: Uuid) -> Result<i64, TaskError> {
    let claimed = profile::Entity::update_many()
        .col_expr(profile::Column::UpdatedAt, Expr::col(profile::Column::UpdatedAt))
        .filter(profile::Column::Uuid.eq(profile_id))
        .exec(tx)
        .await?;
    if claimed.rows_affected == 0 {
        return Err(TaskError::ProfileNotFound);
    }
    ids::profile_id_by_uuid(tx, profile_id)
        .await?
        .ok_or(TaskError::ProfileNotFound)
}

async fn category_row_in_profile<C: ConnectionTrait>(
    db: &C,
    category_id: Uuid,
    profile_row_id: i64,
) -> Result<i64, TaskError> {
    let record = category::Entity::find()
        .filter(category::Column::Uuid.eq(category_id))
        .one(db)
        .await?
        .ok_or(TaskError::CategoryNotFound)?;
    if record.profile_id != profile_row_id {
        return Err(TaskError::CategoryProfileMismatch);
    }
    Ok(record.id)
}

async fn load_reorder_targets<C: ConnectionTrait>(
    db: &C,
    ids: &[Uuid],
) -> Result<Vec<task::Model>, TaskError> {
    let unique: HashSet<Uuid> = ids.iter().copied().collect();
    if unique.is_empty() {
        return Ok(Vec::new());
    }
    let rows = task::Entity::find()
        .filter(task::Column::Uuid.is_in(unique.iter().copied()))
        .all(db)
        .await?;
    if rows.len() != unique.len() {
        return Err(TaskError::TaskNotFound);
    }
    let profiles: HashSet<i64> = rows.iter().map(|row| row.profile_id).collect();
    if profiles.len() > 1 {
        return Err(TaskError::CrossPartition);
    }
    Ok(rows)
}

/// Returns `None` when a filter can match nothing (unknown category).
async fn apply_filters<C: ConnectionTrait>(
    db: &C,
    mut query: Select<task::Entity>,
    filters: &TaskFilters,
    profile_row_ids: &[i64],
) -> Result<Option<Select<task::Entity>>, DbErr> {
    if let Some(status) = filters.status {
        query = query.filter(task::Column::Status.eq(status));
    }
    if let Some(priority) = filters.priority {
        query = query.filter(task::Column::Priority.eq(priority));
    }
    if let Some(category_id) = filters.category_id {
        let Some(row_id) = ids::category_id_by_uuid(db, category_id).await? else {
            return Ok(None);
        };
        query = query.filter(task::Column::CategoryId.eq(row_id));
    }
    if let Some(from) = filters.due_date_from {
        query = query.filter(task::Column::DueDate.gte(from));
    }
    if let Some(to) = filters.due_date_to {
        query = query.filter(task::Column::DueDate.lte(to));
    }
    if let Some(search) = filters.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let matching_categories: Vec<i64> = category::Entity::find()
            .select_only()
            .column(category::Column::Id)
            .filter(category::Column::ProfileId.is_in(profile_row_ids.to_vec()))
            .filter(category::Column::Name.contains(search))
            .into_tuple()
            .all(db)
            .await?;
        let mut condition = Condition::any()
            .add(task::Column::Title.contains(search))
            .add(task::Column::Description.contains(search));
        if !matching_categories.is_empty() {
            condition = condition.add(task::Column::CategoryId.is_in(matching_categories));
        }
        query = query.filter(condition);
    }
    Ok(Some(query))
}
