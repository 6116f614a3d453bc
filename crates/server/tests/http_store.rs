use config::Config;
use db::{
    DBService,
    models::{
        profile::{CreateProfile, Profile},
        task::{CreateTask, PartitionKey, TaskSortUpdate, TaskStatus},
        user::{CreateUser, User},
    },
};
use server::{AppState, http};
use tasks::{
    Collision, DragStart, HttpTaskStore, QueryCache, QueryKey, StoreError, TaskStore, Transition,
    handle_drop,
};
use uuid::Uuid;

struct Running {
    store: HttpTaskStore,
    profile_id: Uuid,
    other_profile_id: Uuid,
}

async fn start_server() -> Running {
    let db = DBService::new_in_memory().await.unwrap();
    let user = User::create(
        &db.pool,
        &CreateUser {
            email: "loop@example.com".to_string(),
            name: "Loop".to_string(),
        },
        Uuid::new_v4(),
    )
    .await
    .unwrap();
    let mut profile_ids = Vec::new();
    for name in ["Work", "Home"] {
        let profile = Profile::create(
            &db.pool,
            &CreateProfile {
                user_id: user.id,
                name: name.to_string(),
                color: None,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        profile_ids.push(profile.id);
    }

    let app = http::router(AppState::new(db, Config::default()));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Running {
        store: HttpTaskStore::new(&format!("http://{addr}")),
        profile_id: profile_ids[0],
        other_profile_id: profile_ids[1],
    }
}

#[tokio::test]
async fn drag_reorder_round_trips_over_http() {
    let running = start_server().await;
    let store = &running.store;
    let mut ids = Vec::new();
    for title in ["A", "B", "C"] {
        let task = store
            .create_task(&CreateTask::new(running.profile_id, title))
            .await
            .unwrap();
        ids.push(task.id);
    }
    let pending = PartitionKey::new(running.profile_id, TaskStatus::Pending);
    let key = QueryKey::task_list(running.profile_id, Some(TaskStatus::Pending));
    let mut cache = QueryCache::new();
    cache.fetch(store, key).await.unwrap();

    // Drop A onto C.
    let transition = handle_drop(
        &mut cache,
        store,
        DragStart {
            task_id: ids[0],
            origin: pending,
        },
        &[Collision::Task {
            task_id: ids[2],
            partition: pending,
        }],
    )
    .await
    .unwrap();
    assert!(matches!(transition, Transition::Reorder { .. }));

    let listed = store
        .list_tasks_by_partition(running.profile_id, Some(TaskStatus::Pending))
        .await
        .unwrap();
    let titles: Vec<&str> = listed.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["B", "C", "A"]);
    let orders: Vec<i32> = listed.iter().map(|t| t.sort_order).collect();
    assert_eq!(orders, vec![0, 1, 2]);

    let cached: Vec<&str> = cache
        .tasks(&key)
        .unwrap()
        .iter()
        .map(|t| t.title.as_str())
        .collect();
    assert_eq!(cached, vec!["B", "C", "A"]);
}

#[tokio::test]
async fn container_drop_changes_status_over_http() {
    let running = start_server().await;
    let store = &running.store;
    let task = store
        .create_task(&CreateTask::new(running.profile_id, "ship it"))
        .await
        .unwrap();

    let transition = handle_drop(
        &mut QueryCache::new(),
        store,
        DragStart {
            task_id: task.id,
            origin: task.partition(),
        },
        &[Collision::Container {
            partition: PartitionKey::new(running.profile_id, TaskStatus::Completed),
        }],
    )
    .await
    .unwrap();
    assert_eq!(
        transition,
        Transition::StatusChange {
            task_id: task.id,
            status: TaskStatus::Completed,
        }
    );

    let stored = store.get_task(task.id).await.unwrap();
    assert_eq!(stored.status, TaskStatus::Completed);
    assert_eq!(stored.sort_order, task.sort_order);
    let stats = store.task_stats(running.profile_id).await.unwrap();
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.pending, 0);
}

#[tokio::test]
async fn cross_profile_reorder_is_rejected_over_http() {
    let running = start_server().await;
    let store = &running.store;
    let mine = store
        .create_task(&CreateTask::new(running.profile_id, "mine"))
        .await
        .unwrap();
    let theirs = store
        .create_task(&CreateTask::new(running.other_profile_id, "theirs"))
        .await
        .unwrap();

    let err = store
        .bulk_update_sort_order(&[
            TaskSortUpdate {
                id: mine.id,
                sort_order: 3,
            },
            TaskSortUpdate {
                id: theirs.id,
                sort_order: 4,
            },
        ])
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::CrossPartition(_)), "{err:?}");

    assert_eq!(store.get_task(mine.id).await.unwrap().sort_order, 0);
    assert_eq!(store.get_task(theirs.id).await.unwrap().sort_order, 0);
}

#[tokio::test]
async fn delete_then_get_is_not_found_over_http() {
    let running = start_server().await;
    let store = &running.store;
    let task = store
        .create_task(&CreateTask::new(running.profile_id, "temp"))
        .await
        .unwrap();

    store.delete_task(task.id).await.unwrap();
    assert!(matches!(
        store.get_task(task.id).await,
        Err(StoreError::NotFound(_))
    ));
}
