//! External text-to-3D task poller
//!
//! Drives one task through the state machine
//! CREATING → {PENDING, IN_PROGRESS}* → {SUCCEEDED, FAILED}.
//!
//! - One creation request; any failure there is terminal.
//! - Status polls on a fixed interval. The first poll happens one interval
//!   after creation and no two polls are closer than one interval.
//! - Any failed poll (transport, HTTP, undecodable payload, unknown status)
//!   is terminal. There are no retries.
//! - SUCCEEDED without a GLB URL is a failure.
//! - The loop is bounded by `max_attempts` and an optional wall-clock
//!   timeout, and checks the cancellation token around every await.

use async_trait::async_trait;
use kcfy_common::config::MeshyConfig;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::task_schema::{decode_created, decode_snapshot};
use crate::models::{GeneratedPrompt, TaskStatus};

/// Which request of the task lifecycle failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStage {
    Create,
    Check,
}

impl fmt::Display for RequestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => f.write_str("create"),
            Self::Check => f.write_str("check"),
        }
    }
}

/// Poller state, including the client-side CREATING state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PollState {
    Creating,
    Pending,
    InProgress,
    Succeeded,
    Failed,
}

impl From<TaskStatus> for PollState {
    fn from(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Pending => Self::Pending,
            TaskStatus::InProgress => Self::InProgress,
            TaskStatus::Succeeded => Self::Succeeded,
            TaskStatus::Failed => Self::Failed,
        }
    }
}

impl fmt::Display for PollState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Creating => "CREATING",
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Task poller errors
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("MESHY_API_KEY is not configured")]
    MissingCredential,

    #[error("Network error ({stage}): {message}")]
    Network { stage: RequestStage, message: String },

    #[error("Meshy API error ({stage}): {reason} - {body}")]
    Http {
        stage: RequestStage,
        status: u16,
        reason: String,
        body: String,
    },

    #[error("Unrecognized {what} response schema: {payload}")]
    UnrecognizedSchema { what: &'static str, payload: String },

    #[error("Unrecognized task status '{status}': {payload}")]
    UnrecognizedStatus { status: String, payload: String },

    #[error("Task {task_id} reported SUCCEEDED but returned no GLB asset URL")]
    MissingAsset { task_id: String },

    #[error("Meshy task failed with status: {status}. Reason: {}", .message.as_deref().unwrap_or("unknown"))]
    TaskFailed {
        status: TaskStatus,
        message: Option<String>,
    },

    #[error("Gave up after {attempts} status polls (last status: {last_status})")]
    AttemptsExhausted { attempts: u32, last_status: PollState },

    #[error("Task did not finish within {limit:?} (last status: {last_status})")]
    TimedOut { limit: Duration, last_status: PollState },

    #[error("Generation cancelled")]
    Cancelled,
}

/// Creation request body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskRequest {
    pub prompt: String,
    /// Generation mode flag ("preview" or "refine")
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub art_style: Option<String>,
}

/// Transport for the task API
///
/// Implementations return the decoded JSON body of a successful response and
/// map non-success HTTP statuses to [`TaskError::Http`].
#[async_trait]
pub trait TaskTransport: Send + Sync {
    async fn create_task(&self, request: &TaskRequest) -> Result<Value, TaskError>;

    async fn fetch_task(&self, task_id: &str) -> Result<Value, TaskError>;
}

/// Bounds and cadence of the poll loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    /// Fixed delay before every status request
    pub interval: Duration,
    /// Maximum number of status requests
    pub max_attempts: u32,
    /// Wall-clock limit measured from task creation
    pub timeout: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: 120,
            timeout: Some(Duration::from_secs(900)),
        }
    }
}

impl PollPolicy {
    pub fn from_config(config: &MeshyConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.poll_interval_secs),
            max_attempts: config.max_poll_attempts.max(1),
            timeout: (config.timeout_secs > 0).then(|| Duration::from_secs(config.timeout_secs)),
        }
    }
}

/// Progress notifications emitted while a task runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEvent {
    /// The service accepted the task
    Created { task_id: String },
    /// A poll observed a status different from the previous one
    StatusChanged {
        task_id: String,
        status: TaskStatus,
        attempt: u32,
        progress: Option<u8>,
    },
}

/// Successful task result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome {
    pub task_id: String,
    /// GLB asset URL, never empty
    pub model_url: String,
    /// Number of status requests issued
    pub attempts: u32,
}

/// Runs one text-to-3D task to completion
pub struct TaskPoller {
    transport: Arc<dyn TaskTransport>,
    policy: PollPolicy,
    mode: String,
    art_style: Option<String>,
}

impl TaskPoller {
    pub fn new(transport: Arc<dyn TaskTransport>, policy: PollPolicy) -> Self {
        Self {
            transport,
            policy,
            mode: "preview".to_string(),
            art_style: None,
        }
    }

    /// Set the mode and style flags sent with the creation request
    pub fn with_request_flags(mut self, mode: impl Into<String>, art_style: Option<String>) -> Self {
        self.mode = mode.into();
        self.art_style = art_style;
        self
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Create a task for `prompt` and poll it until a terminal status
    pub async fn run<F>(
        &self,
        prompt: &GeneratedPrompt,
        cancel: &CancellationToken,
        mut on_event: F,
    ) -> Result<TaskOutcome, TaskError>
    where
        F: FnMut(PollEvent) + Send,
    {
        if cancel.is_cancelled() {
            return Err(TaskError::Cancelled);
        }

        // CREATING
        let request = TaskRequest {
            prompt: prompt.as_str().to_string(),
            mode: self.mode.clone(),
            art_style: self.art_style.clone(),
        };

        let payload = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TaskError::Cancelled),
            result = self.transport.create_task(&request) => result?,
        };

        let created = decode_created(&payload)?;
        let task_id = created.task_id;
        info!(task_id = %task_id, schema = ?created.schema, "Generation task created");
        on_event(PollEvent::Created {
            task_id: task_id.clone(),
        });

        let started = Instant::now();
        let mut state = PollState::Pending;
        let mut last_status: Option<TaskStatus> = None;
        let mut attempts: u32 = 0;

        // PENDING / IN_PROGRESS
        loop {
            if attempts >= self.policy.max_attempts {
                warn!(task_id = %task_id, attempts, "Poll attempts exhausted");
                return Err(TaskError::AttemptsExhausted {
                    attempts,
                    last_status: state,
                });
            }

            if let Some(limit) = self.policy.timeout {
                let next_poll = started.elapsed().checked_add(self.policy.interval);
                if next_poll.map_or(true, |at| at > limit) {
                    warn!(task_id = %task_id, ?limit, "Task timed out");
                    return Err(TaskError::TimedOut {
                        limit,
                        last_status: state,
                    });
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TaskError::Cancelled),
                _ = tokio::time::sleep(self.policy.interval) => {}
            }

            attempts += 1;
            let payload = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TaskError::Cancelled),
                result = self.transport.fetch_task(&task_id) => result?,
            };

            let snapshot = decode_snapshot(&payload)?;
            debug!(
                task_id = %task_id,
                attempt = attempts,
                status = %snapshot.status,
                progress = ?snapshot.progress,
                "Task status polled"
            );

            if last_status != Some(snapshot.status) {
                on_event(PollEvent::StatusChanged {
                    task_id: task_id.clone(),
                    status: snapshot.status,
                    attempt: attempts,
                    progress: snapshot.progress,
                });
                last_status = Some(snapshot.status);
            }
            state = snapshot.status.into();

            match snapshot.status {
                TaskStatus::Pending | TaskStatus::InProgress => continue,
                TaskStatus::Succeeded => {
                    let model_url = snapshot
                        .glb_url
                        .ok_or_else(|| TaskError::MissingAsset {
                            task_id: task_id.clone(),
                        })?;
                    info!(task_id = %task_id, attempts, "Generation task succeeded");
                    return Ok(TaskOutcome {
                        task_id,
                        model_url,
                        attempts,
                    });
                }
                TaskStatus::Failed => {
                    return Err(TaskError::TaskFailed {
                        status: snapshot.status,
                        message: snapshot.error_message,
                    });
                }
            }
        }
    }
}
