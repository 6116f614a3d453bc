use async_trait::async_trait;
use db::{
    DbPool,
    models::task::{
        CreateTask, ReorderOutcome, Task, TaskError, TaskSortUpdate, TaskStats, TaskStatus,
        UpdateTask,
    },
};
use thiserror::Error;
use utils_core::response::ErrorDetails;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{message}")]
    Validation {
        message: String,
        details: ErrorDetails,
    },
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    CrossPartition(String),
    #[error("Persistence failure: {0}")]
    Persistence(String),
    #[error("Transport error: {0}")]
    Transport(String),
}

impl StoreError {
    pub fn validation(details: ErrorDetails) -> Self {
        StoreError::Validation {
            message: "Validation failed".to_string(),
            details,
        }
    }
}

impl From<TaskError> for StoreError {
    fn from(err: TaskError) -> Self {
        let message = err.to_string();
        match err {
            TaskError::Database(db_err) => StoreError::Persistence(db_err.to_string()),
            TaskError::InvalidReorder(details) => StoreError::validation(details),
            TaskError::CrossPartition => StoreError::CrossPartition(message),
            TaskError::CategoryProfileMismatch => StoreError::Validation {
                message,
                details: ErrorDetails::new(),
            },
            TaskError::TaskNotFound | TaskError::ProfileNotFound | TaskError::CategoryNotFound => {
                StoreError::NotFound(message)
            }
        }
    }
}

impl From<db::DbErr> for StoreError {
    fn from(err: db::DbErr) -> Self {
        StoreError::Persistence(err.to_string())
    }
}

/// Everything the client side needs from persistence.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create_task(&self, data: &CreateTask) -> Result<Task, StoreError>;

    async fn update_task(&self, id: Uuid, patch: &UpdateTask) -> Result<Task, StoreError>;

    /// Never alters any sort order.
    async fn change_status(&self, id: Uuid, status: TaskStatus) -> Result<Task, StoreError>;

    /// All or nothing.
    async fn bulk_update_sort_order(
        &self,
        updates: &[TaskSortUpdate],
    ) -> Result<ReorderOutcome, StoreError>;

    async fn list_tasks_by_partition(
        &self,
        profile_id: Uuid,
        status: Option<TaskStatus>,
    ) -> Result<Vec<Task>, StoreError>;

    async fn get_task(&self, id: Uuid) -> Result<Task, StoreError>;

    async fn delete_task(&self, id: Uuid) -> Result<(), StoreError>;

    async fn task_stats(&self, profile_id: Uuid) -> Result<TaskStats, StoreError>;
}

/// Talks to the database directly.
#[derive(Clone)]
pub struct DbTaskStore {
    pool: DbPool,
}

impl DbTaskStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl TaskStore for DbTaskStore {
    async fn create_task(&self, data: &CreateTask) -> Result<Task, StoreError> {
        data.validate().map_err(StoreError::validation)?;
        Ok(Task::create(&self.pool, data, Uuid::new_v4()).await?)
    }

    async fn update_task(&self, id: Uuid, patch: &UpdateTask) -> Result<Task, StoreError> {
        patch.validate().map_err(StoreError::validation)?;
        Ok(Task::update(&self.pool, id, patch).await?)
    }

    async fn change_status(&self, id: Uuid, status: TaskStatus) -> Result<Task, StoreError> {
        Ok(Task::update_status(&self.pool, id, status).await?)
    }

    async fn bulk_update_sort_order(
        &self,
        updates: &[TaskSortUpdate],
    ) -> Result<ReorderOutcome, StoreError> {
        let updated = Task::bulk_update_sort_order(&self.pool, updates).await?;
        Ok(ReorderOutcome { updated, failed: 0 })
    }

    async fn list_tasks_by_partition(
        &self,
        profile_id: Uuid,
        status: Option<TaskStatus>,
    ) -> Result<Vec<Task>, StoreError> {
        Ok(Task::find_by_partition(&self.pool, profile_id, status).await?)
    }

    async fn get_task(&self, id: Uuid) -> Result<Task, StoreError> {
        Task::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| StoreError::NotFound("Task not found".to_string()))
    }

    async fn delete_task(&self, id: Uuid) -> Result<(), StoreError> {
        match Task::delete(&self.pool, id).await? {
            0 => Err(StoreError::NotFound("Task not found".to_string())),
            _ => Ok(()),
        }
    }

    async fn task_stats(&self, profile_id: Uuid) -> Result<TaskStats, StoreError> {
        Ok(Task::stats_for_profile(&self.pool, profile_id).await?)
    }
}
