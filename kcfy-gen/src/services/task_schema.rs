//! Canonical decoder for text-to-3D task API responses
//!
//! The service has shipped several response layouts. Each known layout is a
//! named schema version, tried in a fixed priority order; the first one that
//! yields a usable value wins. A payload matching none of them is a
//! [`TaskError::UnrecognizedSchema`] carrying an excerpt of the raw payload.
//!
//! Creation response, task id field priority:
//! 1. `result`  (current: `{"result": "<id>"}`)
//! 2. `task_id`
//! 3. `id`      (legacy)
//!
//! Status response, status field priority: `status`, `task_status`, `state`.
//! Asset URL: `model_urls.glb`. Error message: `task_error.message`, then
//! `error.message`.

use serde_json::Value;

use super::task_poller::TaskError;
use crate::models::TaskStatus;

/// Longest payload excerpt carried in an error message
const PAYLOAD_EXCERPT_CHARS: usize = 1000;

/// Known creation response layouts, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateSchema {
    Result,
    TaskId,
    LegacyId,
}

impl CreateSchema {
    pub const PRIORITY: [CreateSchema; 3] =
        [CreateSchema::Result, CreateSchema::TaskId, CreateSchema::LegacyId];

    pub fn field(&self) -> &'static str {
        match self {
            Self::Result => "result",
            Self::TaskId => "task_id",
            Self::LegacyId => "id",
        }
    }
}

/// Known status response layouts, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSchema {
    Status,
    TaskStatus,
    State,
}

impl StatusSchema {
    pub const PRIORITY: [StatusSchema; 3] =
        [StatusSchema::Status, StatusSchema::TaskStatus, StatusSchema::State];

    pub fn field(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::TaskStatus => "task_status",
            Self::State => "state",
        }
    }
}

/// Decoded creation response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedTask {
    pub task_id: String,
    pub schema: CreateSchema,
}

/// Decoded status response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSnapshot {
    pub status: TaskStatus,
    pub schema: StatusSchema,
    /// GLB rendering of the model, present on success
    pub glb_url: Option<String>,
    /// Service-supplied failure reason
    pub error_message: Option<String>,
    /// Service-reported progress percentage
    pub progress: Option<u8>,
}

/// Decode a creation response into a task id
pub fn decode_created(payload: &Value) -> Result<CreatedTask, TaskError> {
    for schema in CreateSchema::PRIORITY {
        if let Some(task_id) = non_empty_str(payload.get(schema.field())) {
            return Ok(CreatedTask {
                task_id: task_id.to_string(),
                schema,
            });
        }
    }

    Err(TaskError::UnrecognizedSchema {
        what: "create",
        payload: payload_excerpt(payload),
    })
}

/// Decode a status response
///
/// A missing status field is an unrecognized schema; a status value outside
/// the known set is an unrecognized status. Neither is treated as "still
/// running".
pub fn decode_snapshot(payload: &Value) -> Result<TaskSnapshot, TaskError> {
    let (raw_status, schema) = StatusSchema::PRIORITY
        .iter()
        .find_map(|schema| non_empty_str(payload.get(schema.field())).map(|s| (s, *schema)))
        .ok_or_else(|| TaskError::UnrecognizedSchema {
            what: "status",
            payload: payload_excerpt(payload),
        })?;

    let status = raw_status
        .parse::<TaskStatus>()
        .map_err(|status| TaskError::UnrecognizedStatus {
            status,
            payload: payload_excerpt(payload),
        })?;

    let glb_url = non_empty_str(payload.pointer("/model_urls/glb")).map(str::to_string);

    let error_message = non_empty_str(payload.pointer("/task_error/message"))
        .or_else(|| non_empty_str(payload.pointer("/error/message")))
        .map(str::to_string);

    let progress = payload
        .get("progress")
        .and_then(Value::as_u64)
        .map(|p| p.min(100) as u8);

    Ok(TaskSnapshot {
        status,
        schema,
        glb_url,
        error_message,
        progress,
    })
}

/// Raw payload text for diagnostics, truncated
pub fn payload_excerpt(payload: &Value) -> String {
    text_excerpt(&payload.to_string())
}

/// Truncate diagnostic text on a character boundary
pub fn text_excerpt(text: &str) -> String {
    if text.chars().count() <= PAYLOAD_EXCERPT_CHARS {
        return text.to_string();
    }
    let mut excerpt: String = text.chars().take(PAYLOAD_EXCERPT_CHARS).collect();
    excerpt.push('…');
    excerpt
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_id_priority_order() {
        let all = json!({"id": "legacy", "task_id": "v1", "result": "current"});
        let created = decode_created(&all).unwrap();
        assert_eq!(created.task_id, "current");
        assert_eq!(created.schema, CreateSchema::Result);

        let two = json!({"id": "legacy", "task_id": "v1"});
        assert_eq!(decode_created(&two).unwrap().task_id, "v1");

        let one = json!({"id": "legacy"});
        let created = decode_created(&one).unwrap();
        assert_eq!(created.task_id, "legacy");
        assert_eq!(created.schema, CreateSchema::LegacyId);
    }

    #[test]
    fn test_empty_or_non_string_ids_are_skipped() {
        let payload = json!({"result": "", "task_id": 42, "id": "fallback"});
        assert_eq!(decode_created(&payload).unwrap().task_id, "fallback");
    }

    #[test]
    fn test_missing_task_id_is_unrecognized_schema() {
        let payload = json!({"message": "accepted"});
        match decode_created(&payload) {
            Err(TaskError::UnrecognizedSchema { what, payload }) => {
                assert_eq!(what, "create");
                assert!(payload.contains("accepted"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_snapshot_success_with_asset() {
        let payload = json!({
            "id": "t1",
            "status": "SUCCEEDED",
            "progress": 100,
            "model_urls": {"glb": "https://assets.example/t1.glb", "fbx": "x"}
        });
        let snapshot = decode_snapshot(&payload).unwrap();
        assert_eq!(snapshot.status, TaskStatus::Succeeded);
        assert_eq!(snapshot.glb_url.as_deref(), Some("https://assets.example/t1.glb"));
        assert_eq!(snapshot.progress, Some(100));
    }

    #[test]
    fn test_snapshot_alternate_status_fields() {
        let payload = json!({"task_status": "IN_PROGRESS", "state": "FAILED"});
        let snapshot = decode_snapshot(&payload).unwrap();
        assert_eq!(snapshot.status, TaskStatus::InProgress);
        assert_eq!(snapshot.schema, StatusSchema::TaskStatus);
    }

    #[test]
    fn test_snapshot_error_message_sources() {
        let current = json!({"status": "FAILED", "task_error": {"message": "bad prompt"}});
        assert_eq!(
            decode_snapshot(&current).unwrap().error_message.as_deref(),
            Some("bad prompt")
        );

        let legacy = json!({"status": "FAILED", "error": {"message": "quota"}});
        assert_eq!(
            decode_snapshot(&legacy).unwrap().error_message.as_deref(),
            Some("quota")
        );
    }

    #[test]
    fn test_missing_status_is_unrecognized_schema() {
        let payload = json!({"id": "t1", "progress": 10});
        assert!(matches!(
            decode_snapshot(&payload),
            Err(TaskError::UnrecognizedSchema { what: "status", .. })
        ));
    }

    #[test]
    fn test_unknown_status_is_error() {
        let payload = json!({"status": "EXPIRED"});
        match decode_snapshot(&payload) {
            Err(TaskError::UnrecognizedStatus { status, .. }) => assert_eq!(status, "EXPIRED"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_excerpt_truncates_long_payloads() {
        let long = "x".repeat(5000);
        let excerpt = text_excerpt(&long);
        assert_eq!(excerpt.chars().count(), PAYLOAD_EXCERPT_CHARS + 1);
        assert!(excerpt.ends_with('…'));
    }
}
