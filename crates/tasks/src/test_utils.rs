use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use db::{
    DBService,
    models::{
        profile::{CreateProfile, Profile},
        task::{
            CreateTask, ReorderOutcome, Task, TaskSortUpdate, TaskStats, TaskStatus, UpdateTask,
        },
        user::{CreateUser, User},
    },
};
use uuid::Uuid;

use crate::store::{DbTaskStore, StoreError, TaskStore};

pub struct Seeded {
    pub store: DbTaskStore,
    pub user: Uuid,
    pub profile: Uuid,
}

pub async fn seed() -> Seeded {
    let db = DBService::new_in_memory().await.unwrap();
    let user = User::create(
        &db.pool,
        &CreateUser {
            email: "owner@example.com".to_string(),
            name: "Owner".to_string(),
        },
        Uuid::new_v4(),
    )
    .await
    .unwrap();
    let profile = add_profile(&db.pool, user.id, "Work").await;
    Seeded {
        store: DbTaskStore::new(db.pool),
        user: user.id,
        profile,
    }
}

pub async fn add_profile(pool: &db::DbPool, user: Uuid, name: &str) -> Uuid {
    Profile::create(
        pool,
        &CreateProfile {
            user_id: user,
            name: name.to_string(),
            color: None,
        },
        Uuid::new_v4(),
    )
    .await
    .unwrap()
    .id
}

pub async fn add_task(
    store: &impl TaskStore,
    profile: Uuid,
    title: &str,
    status: TaskStatus,
) -> Task {
    store
        .create_task(&CreateTask::new(profile, title).with_status(status))
        .await
        .unwrap()
}

/// Delegates to a real store; writes fail while `fail_writes` is set and
/// reads fail while `fail_reads` is set.
pub struct FlakyStore<S> {
    pub inner: S,
    pub fail_writes: AtomicBool,
    pub fail_reads: AtomicBool,
    pub writes: AtomicUsize,
}

impl<S> FlakyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fail_writes: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn failing(self) -> Self {
        self.fail_writes.store(true, Ordering::SeqCst);
        self
    }

    fn write(&self) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(StoreError::Persistence("disk on fire".to_string()))
        } else {
            Ok(())
        }
    }

    /// Makes every later read fail, so a refetch cannot paper over the cache.
    pub fn break_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    fn read(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            Err(StoreError::Persistence("read replica gone".to_string()))
        } else {
            Ok(())
        }
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<S: TaskStore> TaskStore for FlakyStore<S> {
    async fn create_task(&self, data: &CreateTask) -> Result<Task, StoreError> {
        self.write()?;
        self.inner.create_task(data).await
    }

    async fn update_task(&self, id: Uuid, patch: &UpdateTask) -> Result<Task, StoreError> {
        self.write()?;
        self.inner.update_task(id, patch).await
    }

    async fn change_status(&self, id: Uuid, status: TaskStatus) -> Result<Task, StoreError> {
        self.write()?;
        self.inner.change_status(id, status).await
    }

    async fn bulk_update_sort_order(
        &self,
        updates: &[TaskSortUpdate],
    ) -> Result<ReorderOutcome, StoreError> {
        self.write()?;
        self.inner.bulk_update_sort_order(updates).await
    }

    async fn list_tasks_by_partition(
        &self,
        profile_id: Uuid,
        status: Option<TaskStatus>,
    ) -> Result<Vec<Task>, StoreError> {
        self.read()?;
        self.inner.list_tasks_by_partition(profile_id, status).await
    }

    async fn get_task(&self, id: Uuid) -> Result<Task, StoreError> {
        self.read()?;
        self.inner.get_task(id).await
    }

    async fn delete_task(&self, id: Uuid) -> Result<(), StoreError> {
        self.write()?;
        self.inner.delete_task(id).await
    }

    async fn task_stats(&self, profile_id: Uuid) -> Result<TaskStats, StoreError> {
        self.read()?;
        self.inner.task_stats(profile_id).await
    }
}
