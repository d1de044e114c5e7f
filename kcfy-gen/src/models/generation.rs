//! Generation workflow models
//!
//! A generation request progresses through:
//! ANALYZING → GENERATING → COMPLETED, or ends early in FAILED / CANCELLED.
//! The external task it creates is observed through [`TaskStatus`].

use chrono::{DateTime, Utc};
use kcfy_common::config::GenerationMode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Status of an external generation task as reported by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Succeeded,
    Failed,
}

impl TaskStatus {
    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
        }
    }

    /// No further transition occurs from a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "SUCCEEDED" => Ok(Self::Succeeded),
            "FAILED" => Ok(Self::Failed),
            other => Err(other.to_string()),
        }
    }
}

/// Prompt produced by the language model; immutable once produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeneratedPrompt(String);

impl GeneratedPrompt {
    /// Collapse whitespace; returns `None` for an empty prompt
    pub fn new(text: &str) -> Option<Self> {
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            None
        } else {
            Some(Self(collapsed))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GeneratedPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Procedural primitive identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Primitive {
    Heart,
    Sphere,
    Cube,
    Torus,
    Knot,
}

impl Primitive {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Heart => "heart",
            Self::Sphere => "sphere",
            Self::Cube => "cube",
            Self::Torus => "torus",
            Self::Knot => "knot",
        }
    }
}

/// Locally derived `{color, shape}` pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeSpec {
    /// `#RRGGBB`
    pub color: String,
    pub shape: Primitive,
}

/// Where the displayed model comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSource {
    /// GLB asset produced by the external task
    Remote { url: String },
    /// Primitive built locally from prompt keywords
    Procedural(ShapeSpec),
}

/// View-model handed to the viewer once generation completes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelData {
    pub prompt: GeneratedPrompt,
    pub source: ModelSource,
}

/// Result of one generation request, intermediate or final
///
/// `prompt` is set as soon as synthesis succeeds, even if a later step fails.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape: Option<ShapeSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Milliseconds since the Unix epoch when the prompt became available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl FormState {
    /// State after a failure that happened before a prompt existed
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Intermediate state once the prompt is known
    pub fn with_prompt(prompt: &GeneratedPrompt) -> Self {
        Self {
            prompt: Some(prompt.as_str().to_string()),
            timestamp: Some(Utc::now().timestamp_millis()),
            ..Default::default()
        }
    }

    /// Model data to surface to the viewer, if generation succeeded
    pub fn model_data(&self) -> Option<ModelData> {
        if self.error.is_some() {
            return None;
        }
        let prompt = GeneratedPrompt::new(self.prompt.as_deref()?)?;
        let source = match (&self.model_url, &self.shape) {
            (Some(url), _) if !url.is_empty() => ModelSource::Remote { url: url.clone() },
            (_, Some(shape)) => ModelSource::Procedural(shape.clone()),
            _ => return None,
        };
        Some(ModelData { prompt, source })
    }
}

/// Phase of an asynchronous generation session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GenerationPhase {
    /// Prompt synthesis in progress
    Analyzing,
    /// Task polling or shape derivation in progress
    Generating,
    Completed,
    Failed,
    Cancelled,
}

impl GenerationPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// In-memory record of one asynchronous generation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSession {
    pub session_id: Uuid,
    pub mode: GenerationMode,
    pub phase: GenerationPhase,
    pub form: FormState,
    /// External task id, once created
    pub task_id: Option<String>,
    /// Last status observed by the poller
    pub task_status: Option<TaskStatus>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl GenerationSession {
    pub fn new(mode: GenerationMode) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            mode,
            phase: GenerationPhase::Analyzing,
            form: FormState::default(),
            task_id: None,
            task_status: None,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Move to a new phase; terminal phases record the end time
    pub fn transition_to(&mut self, phase: GenerationPhase) {
        self.phase = phase;
        if phase.is_terminal() {
            self.ended_at = Some(Utc::now());
        }
    }

    /// Apply a final form state and pick the matching terminal phase
    pub fn finish(&mut self, form: FormState) {
        let phase = if form.error.is_some() {
            GenerationPhase::Failed
        } else {
            GenerationPhase::Completed
        };
        self.form = form;
        self.transition_to(phase);
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_status_wire_format() {
        assert_eq!("IN_PROGRESS".parse::<TaskStatus>(), Ok(TaskStatus::InProgress));
        assert_eq!("EXPIRED".parse::<TaskStatus>(), Err("EXPIRED".to_string()));
        assert_eq!(
            serde_json::to_string(&TaskStatus::Succeeded).unwrap(),
            "\"SUCCEEDED\""
        );
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
    }

    #[test]
    fn test_generated_prompt_collapses_whitespace() {
        let prompt = GeneratedPrompt::new("  a  red\n cube ").unwrap();
        assert_eq!(prompt.as_str(), "a red cube");
        assert!(GeneratedPrompt::new(" \n\t").is_none());
    }

    #[test]
    fn test_model_data_requires_success() {
        let mut form = FormState {
            prompt: Some("a blue orb".to_string()),
            model_url: Some("https://assets.example/model.glb".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            form.model_data().unwrap().source,
            ModelSource::Remote { .. }
        ));

        form.error = Some("boom".to_string());
        assert!(form.model_data().is_none());
    }

    #[test]
    fn test_model_data_without_asset_is_none() {
        let form = FormState {
            prompt: Some("a blue orb".to_string()),
            model_url: Some(String::new()),
            ..Default::default()
        };
        assert!(form.model_data().is_none());
    }

    #[test]
    fn test_session_finish_picks_terminal_phase() {
        let mut session = GenerationSession::new(GenerationMode::Remote);
        assert_eq!(session.phase, GenerationPhase::Analyzing);

        session.finish(FormState::failed("nope"));
        assert_eq!(session.phase, GenerationPhase::Failed);
        assert!(session.ended_at.is_some());
        assert!(session.is_terminal());
    }
}
