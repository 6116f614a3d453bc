//! Optimistic writes: cancel, snapshot, patch, persist, roll back on
//! failure, then invalidate and refetch whatever the write touched.

use std::{collections::HashMap, future::Future};

use chrono::Utc;
use db::models::task::{
    CreateTask, ReorderOutcome, Task, TaskSortUpdate, TaskStatus, UpdateTask,
};
use uuid::Uuid;

use crate::{
    cache::{QueryCache, QueryKey, QueryScope, sort_tasks},
    store::{StoreError, TaskStore},
};

/// Runs one optimistic write and refetches the touched scope afterwards.
///
/// On error the cache is restored to its pre-patch state before the refetch,
/// and the error is returned to the caller.
pub async fn run_optimistic<S, T, P, Fut>(
    cache: &mut QueryCache,
    store: &S,
    scope: &QueryScope,
    patch: P,
    request: Fut,
) -> Result<T, StoreError>
where
    S: TaskStore + ?Sized,
    P: FnOnce(&mut QueryCache),
    Fut: Future<Output = Result<T, StoreError>>,
{
    cache.cancel(scope);
    let snapshot = cache.snapshot(scope);
    patch(cache);

    let result = request.await;
    if let Err(err) = &result {
        tracing::warn!(error = %err, "optimistic update failed, rolling back");
        cache.rollback(snapshot);
    }

    cache.invalidate(scope);
    cache.refetch_stale(store).await;
    result
}

fn list_accepts(key: &QueryKey, task: &Task) -> bool {
    match key {
        QueryKey::TaskList { profile_id, status } => {
            *profile_id == task.profile_id && status.is_none_or(|s| s == task.status)
        }
        _ => false,
    }
}

pub async fn create_task<S>(
    cache: &mut QueryCache,
    store: &S,
    data: &CreateTask,
) -> Result<Task, StoreError>
where
    S: TaskStore + ?Sized,
{
    let scope = QueryScope::profile(data.profile_id);
    let status = data.status.unwrap_or_default();
    let next_order = cache
        .tasks(&QueryKey::task_list(data.profile_id, Some(status)))
        .and_then(|tasks| tasks.iter().map(|t| t.sort_order).max())
        .map_or(0, |max| max + 1);

    let now = Utc::now();
    let placeholder = Task {
        id: Uuid::new_v4(),
        profile_id: data.profile_id,
        category_id: data.category_id,
        title: data.title.trim().to_string(),
        description: data.description.clone(),
        status,
        priority: data.priority.unwrap_or_default(),
        due_date: data.due_date,
        sort_order: next_order,
        created_at: now,
        updated_at: now,
    };

    run_optimistic(
        cache,
        store,
        &scope,
        |cache| {
            cache.patch_task_lists(&scope, |key, tasks| {
                if list_accepts(key, &placeholder) {
                    tasks.push(placeholder.clone());
                }
            })
        },
        store.create_task(data),
    )
    .await
}

/// Merges the patch into every cached copy and moves the task between
/// status-filtered lists when its status changes.
fn apply_update(cache: &mut QueryCache, scope: &QueryScope, id: Uuid, patch: &UpdateTask) {
    let Some(mut updated) = cache.find_task(id).cloned() else {
        return;
    };
    patch.apply_to(&mut updated);

    cache.patch_task(id, |task| *task = updated.clone());
    cache.patch_task_lists(scope, |key, tasks| {
        let had = tasks.iter().any(|t| t.id == id);
        tasks.retain(|t| t.id != id);
        if list_accepts(key, &updated) {
            tasks.push(updated.clone());
            sort_tasks(tasks);
        } else if had {
            tracing::trace!(key = ?key, task_id = %id, "task left cached list");
        }
    });
}

pub async fn update_task<S>(
    cache: &mut QueryCache,
    store: &S,
    id: Uuid,
    patch: &UpdateTask,
) -> Result<Task, StoreError>
where
    S: TaskStore + ?Sized,
{
    let scope = cache.scope_for_tasks(&[id]);
    run_optimistic(
        cache,
        store,
        &scope,
        |cache| apply_update(cache, &scope, id, patch),
        store.update_task(id, patch),
    )
    .await
}

/// Same cache patch as a status-only update; persisted through
/// [`TaskStore::change_status`] so sort orders stay put.
pub async fn change_status<S>(
    cache: &mut QueryCache,
    store: &S,
    id: Uuid,
    status: TaskStatus,
) -> Result<Task, StoreError>
where
    S: TaskStore + ?Sized,
{
    let scope = cache.scope_for_tasks(&[id]);
    let patch = UpdateTask::status(status);
    run_optimistic(
        cache,
        store,
        &scope,
        |cache| apply_update(cache, &scope, id, &patch),
        store.change_status(id, status),
    )
    .await
}

pub async fn delete_task<S>(cache: &mut QueryCache, store: &S, id: Uuid) -> Result<(), StoreError>
where
    S: TaskStore + ?Sized,
{
    let scope = cache.scope_for_tasks(&[id]);
    run_optimistic(
        cache,
        store,
        &scope,
        |cache| {
            cache.patch_task_lists(&scope, |_, tasks| tasks.retain(|t| t.id != id));
            cache.remove(&QueryKey::Task(id));
        },
        store.delete_task(id),
    )
    .await
}

pub async fn bulk_reorder<S>(
    cache: &mut QueryCache,
    store: &S,
    updates: &[TaskSortUpdate],
) -> Result<ReorderOutcome, StoreError>
where
    S: TaskStore + ?Sized,
{
    let ids: Vec<Uuid> = updates.iter().map(|u| u.id).collect();
    let scope = cache.scope_for_tasks(&ids);
    let orders: HashMap<Uuid, i32> = updates.iter().map(|u| (u.id, u.sort_order)).collect();

    run_optimistic(
        cache,
        store,
        &scope,
        |cache| {
            cache.patch_task_lists(&scope, |_, tasks| {
                let mut touched = false;
                for task in tasks.iter_mut() {
                    if let Some(order) = orders.get(&task.id) {
                        task.sort_order = *order;
                        touched = true;
                    }
                }
                if touched {
                    sort_tasks(tasks);
                }
            });
            for (id, order) in &orders {
                cache.patch_task(*id, |task| task.sort_order = *order);
            }
        },
        store.bulk_update_sort_order(updates),
    )
    .await
}
