//! Turns a finished drag gesture into a reorder, a status change, or nothing.

use db::models::task::{PartitionKey, Task, TaskSortUpdate, TaskStatus};
use uuid::Uuid;

use crate::{
    cache::{QueryCache, QueryKey, sort_tasks},
    mutations,
    store::{StoreError, TaskStore},
};

/// Captured when the gesture starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragStart {
    pub task_id: Uuid,
    pub origin: PartitionKey,
}

/// Something under the pointer when the task is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collision {
    Task {
        task_id: Uuid,
        partition: PartitionKey,
    },
    Container {
        partition: PartitionKey,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoopReason {
    DroppedOnSelf,
    DifferentProfile,
    SameStatus,
    NoTarget,
    /// The dragged task or its target is missing from the partition list.
    StaleList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Reorder {
        partition: PartitionKey,
        task_id: Uuid,
        target_id: Uuid,
    },
    StatusChange {
        task_id: Uuid,
        status: TaskStatus,
    },
    Noop(NoopReason),
}

type Classifier = fn(&DragStart, &[Collision]) -> Option<Transition>;

/// Evaluated in order; the first classifier that answers wins.
const CLASSIFIERS: &[Classifier] = &[
    classify_task_collision,
    classify_container_collision,
    classify_no_target,
];

fn classify_task_collision(start: &DragStart, collisions: &[Collision]) -> Option<Transition> {
    let (target_id, partition) = collisions.iter().find_map(|collision| match collision {
        Collision::Task { task_id, partition } => Some((*task_id, *partition)),
        Collision::Container { .. } => None,
    })?;

    Some(if target_id == start.task_id {
        Transition::Noop(NoopReason::DroppedOnSelf)
    } else if partition.profile_id != start.origin.profile_id {
        Transition::Noop(NoopReason::DifferentProfile)
    } else if partition == start.origin {
        Transition::Reorder {
            partition,
            task_id: start.task_id,
            target_id,
        }
    } else {
        Transition::StatusChange {
            task_id: start.task_id,
            status: partition.status,
        }
    })
}

fn classify_container_collision(
    start: &DragStart,
    collisions: &[Collision],
) -> Option<Transition> {
    let partition = collisions.iter().find_map(|collision| match collision {
        Collision::Container { partition } => Some(*partition),
        Collision::Task { .. } => None,
    })?;

    Some(if partition.profile_id != start.origin.profile_id {
        Transition::Noop(NoopReason::DifferentProfile)
    } else if partition.status == start.origin.status {
        Transition::Noop(NoopReason::SameStatus)
    } else {
        Transition::StatusChange {
            task_id: start.task_id,
            status: partition.status,
        }
    })
}

fn classify_no_target(_: &DragStart, _: &[Collision]) -> Option<Transition> {
    Some(Transition::Noop(NoopReason::NoTarget))
}

pub fn classify(start: &DragStart, collisions: &[Collision]) -> Transition {
    CLASSIFIERS
        .iter()
        .find_map(|classifier| classifier(start, collisions))
        .unwrap_or(Transition::Noop(NoopReason::NoTarget))
}

/// Moves `task_id` to the index `target_id` occupies and renumbers the
/// partition densely from 0.
pub fn compute_reorder(tasks: &[Task], task_id: Uuid, target_id: Uuid) -> Option<Vec<TaskSortUpdate>> {
    let mut ordered = tasks.to_vec();
    sort_tasks(&mut ordered);

    let from = ordered.iter().position(|t| t.id == task_id)?;
    let to = ordered.iter().position(|t| t.id == target_id)?;
    let moved = ordered.remove(from);
    ordered.insert(to, moved);

    Some(
        ordered
            .iter()
            .enumerate()
            .map(|(index, task)| TaskSortUpdate {
                id: task.id,
                sort_order: index as i32,
            })
            .collect(),
    )
}

async fn partition_tasks<S>(
    cache: &QueryCache,
    store: &S,
    partition: PartitionKey,
) -> Result<Vec<Task>, StoreError>
where
    S: TaskStore + ?Sized,
{
    let key = QueryKey::task_list(partition.profile_id, Some(partition.status));
    if let Some(tasks) = cache.tasks(&key) {
        return Ok(tasks.to_vec());
    }
    if let Some(tasks) = cache.tasks(&QueryKey::task_list(partition.profile_id, None)) {
        return Ok(tasks
            .iter()
            .filter(|t| t.status == partition.status)
            .cloned()
            .collect());
    }
    store
        .list_tasks_by_partition(partition.profile_id, Some(partition.status))
        .await
}

/// Classifies the drop and submits the resulting mutation.
///
/// Gestures are not serialized: two overlapping drops on one partition each
/// submit a full renumbering, and whichever commits last wins.
pub async fn handle_drop<S>(
    cache: &mut QueryCache,
    store: &S,
    start: DragStart,
    collisions: &[Collision],
) -> Result<Transition, StoreError>
where
    S: TaskStore + ?Sized,
{
    let transition = classify(&start, collisions);
    tracing::debug!(task_id = %start.task_id, ?transition, "drop classified");

    match transition {
        Transition::Reorder {
            partition,
            task_id,
            target_id,
        } => {
            let tasks = partition_tasks(cache, store, partition).await?;
            let Some(updates) = compute_reorder(&tasks, task_id, target_id) else {
                return Ok(Transition::Noop(NoopReason::StaleList));
            };
            mutations::bulk_reorder(cache, store, &updates).await?;
        }
        Transition::StatusChange { task_id, status } => {
            mutations::change_status(cache, store, task_id, status).await?;
        }
        Transition::Noop(_) => {}
    }
    Ok(transition)
}
