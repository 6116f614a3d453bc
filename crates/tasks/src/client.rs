//! [`TaskStore`] over the HTTP API.

use async_trait::async_trait;
use db::models::task::{
    CreateTask, ReorderOutcome, Task, TaskSortUpdate, TaskStats, TaskStatus, UpdateTask,
};
use reqwest::{RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use utils_core::response::ErrorDetails;
use uuid::Uuid;

use crate::store::{StoreError, TaskStore};

#[derive(Debug, Deserialize)]
struct ApiResponseEnvelope<T> {
    success: bool,
    data: Option<T>,
    message: Option<String>,
    error: Option<String>,
    #[serde(default)]
    details: Option<ErrorDetails>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusBody {
    status: TaskStatus,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReorderBody<'a> {
    task_updates: &'a [TaskSortUpdate],
}

#[derive(Debug, Clone)]
pub struct HttpTaskStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTaskStore {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, rb: RequestBuilder) -> Result<Option<T>, StoreError> {
        let resp = rb
            .send()
            .await
            .map_err(|e| StoreError::Transport(format!("request failed: {e}")))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| StoreError::Transport(format!("failed to read response: {e}")))?;

        let envelope: ApiResponseEnvelope<T> = serde_json::from_str(&body).map_err(|e| {
            StoreError::Transport(format!("invalid response body ({status}): {e}"))
        })?;

        if !status.is_success() || !envelope.success {
            let message = envelope
                .error
                .or(envelope.message)
                .unwrap_or_else(|| status.to_string());
            return Err(error_for_status(status, message, envelope.details));
        }
        Ok(envelope.data)
    }

    async fn send_json<T: DeserializeOwned>(&self, rb: RequestBuilder) -> Result<T, StoreError> {
        self.send(rb)
            .await?
            .ok_or_else(|| StoreError::Transport("response missing data field".to_string()))
    }
}

fn error_for_status(
    status: StatusCode,
    message: String,
    details: Option<ErrorDetails>,
) -> StoreError {
    match status {
        StatusCode::BAD_REQUEST if message == db::models::task::CROSS_PARTITION_MESSAGE => {
            StoreError::CrossPartition(message)
        }
        StatusCode::BAD_REQUEST => StoreError::Validation {
            message,
            details: details.unwrap_or_default(),
        },
        StatusCode::NOT_FOUND => StoreError::NotFound(message),
        StatusCode::CONFLICT => StoreError::Conflict(message),
        s if s.is_server_error() => StoreError::Persistence(message),
        _ => StoreError::Transport(format!("unexpected status {status}: {message}")),
    }
}

#[async_trait]
impl TaskStore for HttpTaskStore {
    async fn create_task(&self, data: &CreateTask) -> Result<Task, StoreError> {
        self.send_json(self.client.post(self.url("/tasks")).json(data))
            .await
    }

    async fn update_task(&self, id: Uuid, patch: &UpdateTask) -> Result<Task, StoreError> {
        self.send_json(self.client.put(self.url(&format!("/tasks/{id}"))).json(patch))
            .await
    }

    async fn change_status(&self, id: Uuid, status: TaskStatus) -> Result<Task, StoreError> {
        let url = self.url(&format!("/tasks/{id}/status"));
        self.send_json(self.client.put(url).json(&StatusBody { status }))
            .await
    }

    async fn bulk_update_sort_order(
        &self,
        updates: &[TaskSortUpdate],
    ) -> Result<ReorderOutcome, StoreError> {
        let body = ReorderBody {
            task_updates: updates,
        };
        self.send_json(self.client.post(self.url("/tasks/reorder")).json(&body))
            .await
    }

    async fn list_tasks_by_partition(
        &self,
        profile_id: Uuid,
        status: Option<TaskStatus>,
    ) -> Result<Vec<Task>, StoreError> {
        let mut query = vec![("profileId", profile_id.to_string())];
        if let Some(status) = status {
            query.push(("status", status.to_string()));
        }
        self.send_json(self.client.get(self.url("/tasks")).query(&query))
            .await
    }

    async fn get_task(&self, id: Uuid) -> Result<Task, StoreError> {
        self.send_json(self.client.get(self.url(&format!("/tasks/{id}"))))
            .await
    }

    async fn delete_task(&self, id: Uuid) -> Result<(), StoreError> {
        self.send::<serde_json::Value>(self.client.delete(self.url(&format!("/tasks/{id}"))))
            .await
            .map(|_| ())
    }

    async fn task_stats(&self, profile_id: Uuid) -> Result<TaskStats, StoreError> {
        self.send_json(
            self.client
                .get(self.url(&format!("/profiles/{profile_id}/stats"))),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        Json, Router,
        http::StatusCode as AxumStatus,
        routing::{get, post},
    };
    use serde_json::{Value, json};

    use super::*;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn error_envelopes_map_to_store_errors() {
        let router = Router::new()
            .route(
                "/api/tasks/reorder",
                post(|| async {
                    (
                        AxumStatus::BAD_REQUEST,
                        Json(json!({
                            "success": false,
                            "error": db::models::task::CROSS_PARTITION_MESSAGE,
                        })),
                    )
                }),
            )
            .route(
                "/api/tasks",
                post(|| async {
                    (
                        AxumStatus::BAD_REQUEST,
                        Json(json!({
                            "success": false,
                            "error": "Validation failed",
                            "details": {"title": "Task title is required"},
                        })),
                    )
                }),
            )
            .route(
                "/api/tasks/{id}",
                get(|| async {
                    (
                        AxumStatus::NOT_FOUND,
                        Json(json!({"success": false, "error": "Task not found"})),
                    )
                }),
            );
        let store = HttpTaskStore::new(&serve(router).await);

        let err = store
            .bulk_update_sort_order(&[TaskSortUpdate {
                id: Uuid::new_v4(),
                sort_order: 0,
            }])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::CrossPartition(_)));

        let err = store
            .create_task(&CreateTask::new(Uuid::new_v4(), ""))
            .await
            .unwrap_err();
        let StoreError::Validation { details, .. } = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert_eq!(details["title"], "Task title is required");

        let err = store.get_task(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(msg) if msg == "Task not found"));
    }

    #[tokio::test]
    async fn success_envelope_yields_data() {
        let router = Router::new().route(
            "/api/tasks/reorder",
            post(|Json(body): Json<Value>| async move {
                let count = body["taskUpdates"].as_array().map_or(0, Vec::len);
                Json(json!({"success": true, "data": {"updated": count, "failed": 0}}))
            }),
        );
        let store = HttpTaskStore::new(&format!("{}/", serve(router).await));

        let outcome = store
            .bulk_update_sort_order(&[
                TaskSortUpdate { id: Uuid::new_v4(), sort_order: 0 },
                TaskSortUpdate { id: Uuid::new_v4(), sort_order: 1 },
            ])
            .await
            .unwrap();
        assert_eq!(outcome, ReorderOutcome { updated: 2, failed: 0 });
    }

    #[tokio::test]
    async fn unreachable_server_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let store = HttpTaskStore::new(&format!("http://{addr}"));
        assert!(matches!(
            store.get_task(Uuid::new_v4()).await,
            Err(StoreError::Transport(_))
        ));
    }
}
