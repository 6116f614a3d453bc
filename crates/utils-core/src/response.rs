use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Field name to human readable message, as reported on validation failures.
pub type ErrorDetails = BTreeMap<String, String>;

/// JSON envelope shared by every API endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub details: Option<ErrorDetails>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            error: None,
            details: None,
        }
    }

    pub fn success_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::success(data)
        }
    }

    pub fn error(message: &str) -> Self {
        Self {
            success: false,
            data: None,
            message: None,
            error: Some(message.to_string()),
            details: None,
        }
    }

    pub fn error_with_details(message: &str, details: ErrorDetails) -> Self {
        Self {
            details: (!details.is_empty()).then_some(details),
            ..Self::error(message)
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Collapses the envelope into its payload or its error text.
    pub fn into_result(self) -> Result<Option<T>, String> {
        if self.success {
            Ok(self.data)
        } else {
            Err(self
                .error
                .or(self.message)
                .unwrap_or_else(|| "Unknown error".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn success_envelope_omits_error_fields() {
        let value = serde_json::to_value(ApiResponse::success(json!({"updated": 3, "failed": 0})))
            .unwrap();
        assert_eq!(
            value,
            json!({"success": true, "data": {"updated": 3, "failed": 0}})
        );
    }

    #[test]
    fn error_envelope_carries_details() {
        let mut details = ErrorDetails::new();
        details.insert("taskUpdates.0.id".to_string(), "Invalid task ID".to_string());
        let value =
            serde_json::to_value(ApiResponse::<()>::error_with_details("Validation failed", details))
                .unwrap();
        assert_eq!(
            value,
            json!({
                "success": false,
                "error": "Validation failed",
                "details": {"taskUpdates.0.id": "Invalid task ID"}
            })
        );
    }

    #[test]
    fn empty_details_are_dropped() {
        let response = ApiResponse::<()>::error_with_details("nope", ErrorDetails::new());
        assert!(response.details.is_none());
    }

    #[test]
    fn into_result_prefers_error_text() {
        let response: ApiResponse<u32> =
            serde_json::from_value(json!({"success": false, "error": "Task not found"})).unwrap();
        assert_eq!(response.into_result(), Err("Task not found".to_string()));

        let response: ApiResponse<u32> =
            serde_json::from_value(json!({"success": true, "data": 7})).unwrap();
        assert_eq!(response.into_result(), Ok(Some(7)));
    }
}
