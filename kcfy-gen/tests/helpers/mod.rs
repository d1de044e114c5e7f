//! Test Helper Utilities
//!
//! Scripted fakes for the language model, the task API and the asset loader.
#![allow(dead_code)]

use async_trait::async_trait;
use kcfy_common::config::GenerationMode;
use kcfy_common::events::EventBus;
use kcfy_gen::services::{
    GenerationOrchestrator, LanguageModel, PollPolicy, PromptSynthesizer, RequestStage,
    SynthesisError, TaskError, TaskPoller, TaskRequest, TaskTransport,
};
use kcfy_gen::viewer::{AssetLoader, ModelViewer, ViewerError};
use kcfy_gen::AppState;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

pub const TEST_PROMPT: &str =
    "Create a glowing heart-shaped keychain representing dreamy melancholy in blue tones";

/// Exactly 50 characters
pub const FIFTY_CHAR_INPUT: &str = "Clair de Lune by Claude Debussy, a soft piano nigh";

pub const GLB_URL: &str = "https://assets.example/tasks/task-1/model.glb";

// ========================================
// Language model
// ========================================

/// Language model returning a canned answer
pub struct FakeLanguageModel {
    answer: Result<String, u16>,
    calls: AtomicUsize,
}

impl FakeLanguageModel {
    /// Answers `{"prompt": <prompt>}`
    pub fn answering(prompt: &str) -> Arc<Self> {
        Arc::new(Self {
            answer: Ok(json!({ "prompt": prompt }).to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    /// Answers with raw text
    pub fn raw(text: &str) -> Arc<Self> {
        Arc::new(Self {
            answer: Ok(text.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    /// Fails with an API error of the given status
    pub fn failing(status: u16) -> Arc<Self> {
        Arc::new(Self {
            answer: Err(status),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModel for FakeLanguageModel {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn complete_json(&self, instructions: &str) -> Result<String, SynthesisError> {
        assert!(!instructions.contains("{{music_info}}"));
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone().map_err(|status| SynthesisError::Api {
            status,
            body: "model unavailable".to_string(),
        })
    }
}

/// Language model that never answers
pub struct HangingLanguageModel;

#[async_trait]
impl LanguageModel for HangingLanguageModel {
    fn name(&self) -> &'static str {
        "hanging"
    }

    async fn complete_json(&self, _instructions: &str) -> Result<String, SynthesisError> {
        std::future::pending().await
    }
}

// ========================================
// Task transport
// ========================================

/// Task API replaying scripted responses
///
/// Once the poll script runs out, every further poll answers PENDING.
pub struct ScriptedTransport {
    create: Mutex<Option<Result<Value, TaskError>>>,
    polls: Mutex<VecDeque<Result<Value, TaskError>>>,
    requests: Mutex<Vec<TaskRequest>>,
    fetched_ids: Mutex<Vec<String>>,
    fetch_times: Mutex<Vec<Instant>>,
    created_at: Mutex<Option<Instant>>,
}

impl ScriptedTransport {
    pub fn new(create: Result<Value, TaskError>) -> Self {
        Self {
            create: Mutex::new(Some(create)),
            polls: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            fetched_ids: Mutex::new(Vec::new()),
            fetch_times: Mutex::new(Vec::new()),
            created_at: Mutex::new(None),
        }
    }

    /// Creation answers `{"result": <task_id>}`
    pub fn created(task_id: &str) -> Self {
        Self::new(Ok(json!({ "result": task_id })))
    }

    pub fn then_poll(self, response: Result<Value, TaskError>) -> Self {
        self.polls.lock().unwrap().push_back(response);
        self
    }

    pub fn then_status(self, status: &str) -> Self {
        self.then_poll(Ok(json!({ "status": status })))
    }

    pub fn then_succeeded(self, glb_url: &str) -> Self {
        self.then_poll(Ok(json!({
            "status": "SUCCEEDED",
            "progress": 100,
            "model_urls": { "glb": glb_url }
        })))
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn create_calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<TaskRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_times.lock().unwrap().len()
    }

    pub fn fetched_ids(&self) -> Vec<String> {
        self.fetched_ids.lock().unwrap().clone()
    }

    /// Offsets of every status request from the creation request
    pub fn fetch_offsets(&self) -> Vec<Duration> {
        let created_at = self
            .created_at
            .lock()
            .unwrap()
            .expect("task was never created");
        self.fetch_times
            .lock()
            .unwrap()
            .iter()
            .map(|t| t.duration_since(created_at))
            .collect()
    }
}

#[async_trait]
impl TaskTransport for ScriptedTransport {
    async fn create_task(&self, request: &TaskRequest) -> Result<Value, TaskError> {
        self.requests.lock().unwrap().push(request.clone());
        *self.created_at.lock().unwrap() = Some(Instant::now());
        self.create
            .lock()
            .unwrap()
            .take()
            .expect("create_task called more than once")
    }

    async fn fetch_task(&self, task_id: &str) -> Result<Value, TaskError> {
        self.fetch_times.lock().unwrap().push(Instant::now());
        self.fetched_ids.lock().unwrap().push(task_id.to_string());
        self.polls
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(json!({ "status": "PENDING" })))
    }
}

/// HTTP 500 from the creation endpoint
pub fn create_http_500() -> TaskError {
    TaskError::Http {
        stage: RequestStage::Create,
        status: 500,
        reason: "Internal Server Error".to_string(),
        body: "{\"message\":\"upstream exploded\"}".to_string(),
    }
}

pub fn fast_policy() -> PollPolicy {
    PollPolicy {
        interval: Duration::from_millis(10),
        max_attempts: 500,
        timeout: None,
    }
}

pub fn poller(transport: Arc<ScriptedTransport>, policy: PollPolicy) -> TaskPoller {
    TaskPoller::new(transport, policy)
}

// ========================================
// Orchestrator and service state
// ========================================

pub fn orchestrator(
    model: Option<Arc<FakeLanguageModel>>,
    transport: Option<Arc<ScriptedTransport>>,
    policy: PollPolicy,
    event_bus: EventBus,
) -> GenerationOrchestrator {
    let synthesizer = model.map(|m| PromptSynthesizer::new(m as Arc<dyn LanguageModel>));
    let poller = transport.map(|t| poller(t, policy));
    GenerationOrchestrator::new(synthesizer, poller, event_bus)
}

/// Asset loader that always fails
pub struct UnreachableAssets;

#[async_trait]
impl AssetLoader for UnreachableAssets {
    async fn fetch(&self, _url: &str) -> Result<Vec<u8>, ViewerError> {
        Err(ViewerError::Http { status: 404 })
    }
}

/// Asset loader that stalls before failing
pub struct SlowAssets(pub Duration);

#[async_trait]
impl AssetLoader for SlowAssets {
    async fn fetch(&self, _url: &str) -> Result<Vec<u8>, ViewerError> {
        tokio::time::sleep(self.0).await;
        Err(ViewerError::Fetch("timed out".to_string()))
    }
}

pub fn app_state(
    model: Arc<dyn LanguageModel>,
    transport: Option<Arc<ScriptedTransport>>,
    default_mode: GenerationMode,
    loader: Arc<dyn AssetLoader>,
) -> AppState {
    let synthesizer = PromptSynthesizer::new(model);
    let poller = transport.map(|t| poller(t, fast_policy()));
    let orchestrator = GenerationOrchestrator::new(Some(synthesizer), poller, EventBus::new(100));
    AppState::new(orchestrator, ModelViewer::new(loader), default_mode)
}

pub fn test_app_state(
    model: Arc<FakeLanguageModel>,
    transport: Option<Arc<ScriptedTransport>>,
    default_mode: GenerationMode,
) -> AppState {
    app_state(model, transport, default_mode, Arc::new(UnreachableAssets))
}
