//! Event types for the KeyChainify event system
//!
//! Provides the generation event definitions and the EventBus shared by the
//! HTTP layer (SSE) and the generation workflow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// KeyChainify event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
/// One generation emits, in order: `GenerationStarted`, `PromptSynthesized`,
/// then (remote mode) `TaskCreated` and one `TaskStatusChanged` per observed
/// status change, and finally exactly one of `GenerationCompleted`,
/// `GenerationFailed` or `GenerationCancelled`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum KcfyEvent {
    /// A generation request passed validation and started
    GenerationStarted {
        session_id: Uuid,
        /// "remote" or "procedural"
        mode: String,
        timestamp: DateTime<Utc>,
    },

    /// The language model produced a prompt (intermediate state)
    PromptSynthesized {
        session_id: Uuid,
        prompt: String,
        timestamp: DateTime<Utc>,
    },

    /// The external service accepted the creation request
    TaskCreated {
        session_id: Uuid,
        task_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A status poll observed a different task status
    TaskStatusChanged {
        session_id: Uuid,
        task_id: String,
        /// Wire status (PENDING, IN_PROGRESS, SUCCEEDED, FAILED)
        status: String,
        /// 1-based poll attempt that observed the status
        attempt: u32,
        /// Service-reported progress percentage, if any
        progress: Option<u8>,
        timestamp: DateTime<Utc>,
    },

    /// Generation finished and a model is available
    GenerationCompleted {
        session_id: Uuid,
        prompt: String,
        /// Remote asset URL (remote mode)
        model_url: Option<String>,
        /// Procedural shape name (procedural mode)
        shape: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// Generation failed; `prompt` is set when synthesis had succeeded
    GenerationFailed {
        session_id: Uuid,
        prompt: Option<String>,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// Generation was cancelled by the user
    GenerationCancelled {
        session_id: Uuid,
        timestamp: DateTime<Utc>,
    },
}

impl KcfyEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &str {
        match self {
            KcfyEvent::GenerationStarted { .. } => "GenerationStarted",
            KcfyEvent::PromptSynthesized { .. } => "PromptSynthesized",
            KcfyEvent::TaskCreated { .. } => "TaskCreated",
            KcfyEvent::TaskStatusChanged { .. } => "TaskStatusChanged",
            KcfyEvent::GenerationCompleted { .. } => "GenerationCompleted",
            KcfyEvent::GenerationFailed { .. } => "GenerationFailed",
            KcfyEvent::GenerationCancelled { .. } => "GenerationCancelled",
        }
    }

    /// Session the event belongs to
    pub fn session_id(&self) -> Uuid {
        match self {
            KcfyEvent::GenerationStarted { session_id, .. }
            | KcfyEvent::PromptSynthesized { session_id, .. }
            | KcfyEvent::TaskCreated { session_id, .. }
            | KcfyEvent::TaskStatusChanged { session_id, .. }
            | KcfyEvent::GenerationCompleted { session_id, .. }
            | KcfyEvent::GenerationFailed { session_id, .. }
            | KcfyEvent::GenerationCancelled { session_id, .. } => *session_id,
        }
    }

    /// Whether this event ends a session
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            KcfyEvent::GenerationCompleted { .. }
                | KcfyEvent::GenerationFailed { .. }
                | KcfyEvent::GenerationCancelled { .. }
        )
    }
}

/// Broadcast bus for [`KcfyEvent`]
///
/// Cloning is cheap; all clones share the same channel.
///
/// ```
/// use kcfy_common::events::{EventBus, KcfyEvent};
///
/// let bus = EventBus::new(16);
/// let mut rx = bus.subscribe();
/// bus.emit_lossy(KcfyEvent::GenerationCancelled {
///     session_id: uuid::Uuid::new_v4(),
///     timestamp: chrono::Utc::now(),
/// });
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<KcfyEvent>,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// `capacity` is the number of events buffered before slow receivers
    /// start missing old events.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<KcfyEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: KcfyEvent) {
        let _ = self.tx.send(event);
    }
}
