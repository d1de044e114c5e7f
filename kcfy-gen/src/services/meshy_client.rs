//! Meshy text-to-3D API client
//!
//! `POST {base}/text-to-3d` creates a task, `GET {base}/text-to-3d/{id}`
//! reads its status. Both carry `Authorization: Bearer <key>`.

use async_trait::async_trait;
use kcfy_common::config::MeshyConfig;
use reqwest::{Response, StatusCode};
use serde_json::Value;
use std::time::Duration;

use super::task_poller::{RequestStage, TaskError, TaskRequest, TaskTransport};
use super::task_schema::text_excerpt;

const USER_AGENT: &str = "KeyChainify/0.1.0";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Meshy API client
pub struct MeshyClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl MeshyClient {
    /// Create a client; a missing or blank key fails before any request
    pub fn new(api_key: Option<String>, base_url: impl Into<String>) -> Result<Self, TaskError> {
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or(TaskError::MissingCredential)?;

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TaskError::Network {
                stage: RequestStage::Create,
                message: e.to_string(),
            })?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Create a client from config plus an already-resolved key
    pub fn from_config(config: &MeshyConfig, api_key: Option<String>) -> Result<Self, TaskError> {
        Self::new(api_key, config.base_url.clone())
    }

    fn tasks_url(&self) -> String {
        format!("{}/text-to-3d", self.base_url)
    }

    async fn read_json(response: Response, stage: RequestStage) -> Result<Value, TaskError> {
        let status = response.status();
        let body = response.text().await.map_err(|e| TaskError::Network {
            stage,
            message: e.to_string(),
        })?;

        if !status.is_success() {
            return Err(http_error(stage, status, &body));
        }

        serde_json::from_str(&body).map_err(|_| TaskError::UnrecognizedSchema {
            what: match stage {
                RequestStage::Create => "create",
                RequestStage::Check => "status",
            },
            payload: text_excerpt(&body),
        })
    }
}

fn http_error(stage: RequestStage, status: StatusCode, body: &str) -> TaskError {
    TaskError::Http {
        stage,
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or("Unknown Status").to_string(),
        body: text_excerpt(body),
    }
}

#[async_trait]
impl TaskTransport for MeshyClient {
    async fn create_task(&self, request: &TaskRequest) -> Result<Value, TaskError> {
        tracing::debug!(mode = %request.mode, "Submitting text-to-3D task");

        let response = self
            .http_client
            .post(self.tasks_url())
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| TaskError::Network {
                stage: RequestStage::Create,
                message: e.to_string(),
            })?;

        Self::read_json(response, RequestStage::Create).await
    }

    async fn fetch_task(&self, task_id: &str) -> Result<Value, TaskError> {
        let response = self
            .http_client
            .get(format!("{}/{}", self.tasks_url(), task_id))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| TaskError::Network {
                stage: RequestStage::Check,
                message: e.to_string(),
            })?;

        Self::read_json(response, RequestStage::Check).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_is_rejected() {
        assert!(matches!(
            MeshyClient::new(None, "https://api.meshy.ai/v1"),
            Err(TaskError::MissingCredential)
        ));
        assert!(matches!(
            MeshyClient::new(Some("  ".to_string()), "https://api.meshy.ai/v1"),
            Err(TaskError::MissingCredential)
        ));
    }

    #[test]
    fn test_tasks_url_strips_trailing_slash() {
        let client = MeshyClient::new(Some("key".to_string()), "http://localhost:9/v1/").unwrap();
        assert_eq!(client.tasks_url(), "http://localhost:9/v1/text-to-3d");
    }

    #[test]
    fn test_http_error_message() {
        let err = http_error(
            RequestStage::Create,
            StatusCode::INTERNAL_SERVER_ERROR,
            "{\"message\":\"upstream exploded\"}",
        );
        assert_eq!(
            err.to_string(),
            "Meshy API error (create): Internal Server Error - {\"message\":\"upstream exploded\"}"
        );
    }
}
