//! Extractors whose rejections use the API error envelope.

use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Request},
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use serde_path_to_error::Segment;
use utils_core::response::ErrorDetails;
use uuid::Uuid;

use crate::error::ApiError;

/// JSON body extractor. Fields that fail to deserialize are reported under
/// their dotted path (`taskUpdates.0.id`) in the error details.
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<Value>::from_request(req, state).await?;
        let parsed: Result<T, serde_path_to_error::Error<serde_json::Error>> =
            serde_path_to_error::deserialize(value);
        parsed.map(ApiJson).map_err(body_error)
    }
}

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

pub fn parse_uuid(raw: &str, label: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::BadRequest(format!("Invalid {label} ID format")))
}

fn body_error(err: serde_path_to_error::Error<serde_json::Error>) -> ApiError {
    let field = field_path(err.path());
    let inner = err.into_inner();
    if field.is_empty() {
        return ApiError::BadRequest(format!("Invalid request body: {inner}"));
    }

    let message = if inner.to_string().contains("UUID parsing failed") {
        format!("Invalid {} ID format", id_label(&field))
    } else {
        inner.to_string()
    };
    let mut details = ErrorDetails::new();
    details.insert(field, message);
    ApiError::validation(details)
}

fn field_path(path: &serde_path_to_error::Path) -> String {
    path.iter()
        .filter_map(|segment| match segment {
            Segment::Seq { index } => Some(index.to_string()),
            Segment::Map { key } => Some(key.clone()),
            Segment::Enum { variant } => Some(variant.clone()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(".")
}

fn id_label(field: &str) -> &'static str {
    let last = field.rsplit('.').next().unwrap_or(field);
    match last {
        "profileId" => "profile",
        "categoryId" => "category",
        "userId" => "user",
        _ if field.starts_with("taskUpdates") => "task",
        _ => "record",
    }
}

#[cfg(test)]
mod tests {
    use axum::{Router, http::StatusCode, routing::post};
    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::test_utils::send;

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Move {
        id: Uuid,
        sort_order: i32,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Batch {
        profile_id: Uuid,
        task_updates: Vec<Move>,
    }

    fn app() -> Router {
        Router::new().route(
            "/batch",
            post(|ApiJson(batch): ApiJson<Batch>| async move {
                Json(json!({
                    "profileId": batch.profile_id,
                    "moves": batch.task_updates.iter().map(|m| (m.id, m.sort_order)).collect::<Vec<_>>(),
                }))
            }),
        )
    }

    #[test]
    fn malformed_ids_are_bad_requests() {
        let err = parse_uuid("not-a-uuid", "task").unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(msg) if msg == "Invalid task ID format"));

        let id = Uuid::new_v4();
        assert_eq!(parse_uuid(&format!(" {id} "), "task").unwrap(), id);
    }

    #[tokio::test]
    async fn nested_bad_id_is_reported_by_path() {
        let body = json!({
            "profileId": Uuid::new_v4(),
            "taskUpdates": [
                {"id": Uuid::new_v4(), "sortOrder": 0},
                {"id": "nope", "sortOrder": 1},
            ],
        });
        let (status, json) = send(&app(), "POST", "/batch", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Validation failed");
        assert_eq!(json["details"]["taskUpdates.1.id"], "Invalid task ID format");
    }

    #[tokio::test]
    async fn top_level_bad_id_and_wrong_types_get_details() {
        let body = json!({"profileId": "123", "taskUpdates": []});
        let (status, json) = send(&app(), "POST", "/batch", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["details"]["profileId"], "Invalid profile ID format");

        let body = json!({
            "profileId": Uuid::new_v4(),
            "taskUpdates": [{"id": Uuid::new_v4(), "sortOrder": "first"}],
        });
        let (_, json) = send(&app(), "POST", "/batch", Some(body)).await;
        assert!(json["details"]["taskUpdates.0.sortOrder"].is_string());
        assert!(
            !json["details"]["taskUpdates.0.sortOrder"]
                .as_str()
                .unwrap()
                .contains("line")
        );
    }

    #[tokio::test]
    async fn root_level_problems_stay_plain_bad_requests() {
        let (status, json) = send(&app(), "POST", "/batch", Some(json!({"taskUpdates": []}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json.get("details").is_none());
        assert!(json["error"].as_str().unwrap().starts_with("Invalid request body"));
    }
}
