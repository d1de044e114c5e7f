//! Generation workflow
//!
//! validate → synthesize prompt → (remote) create + poll task
//!                              → (procedural) derive shape from keywords
//!
//! Every failure collapses into `FormState.error`. The prompt stays in the
//! form once synthesis succeeded, even when the task later fails.

use chrono::Utc;
use kcfy_common::config::GenerationMode;
use kcfy_common::events::{EventBus, KcfyEvent};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::gemini_client::GeminiClient;
use super::meshy_client::MeshyClient;
use super::prompt_synthesizer::{PromptSynthesizer, SynthesisError};
use super::shape_heuristic::shape_for_prompt;
use super::task_poller::{PollEvent, PollPolicy, TaskError, TaskPoller};
use crate::config::GeneratorConfig;
use crate::models::{FormState, MusicInput, ValidationError};

/// Result of one generation run
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationReport {
    pub session_id: Uuid,
    pub form: FormState,
    /// The run stopped because its token was cancelled
    pub cancelled: bool,
}

/// Wires the prompt synthesizer to the task poller or the shape heuristic
///
/// A missing credential leaves the corresponding stage unset; requests that
/// need it fail with a configuration error before any network call.
pub struct GenerationOrchestrator {
    synthesizer: Option<PromptSynthesizer>,
    poller: Option<Arc<TaskPoller>>,
    event_bus: EventBus,
}

impl GenerationOrchestrator {
    pub fn new(
        synthesizer: Option<PromptSynthesizer>,
        poller: Option<TaskPoller>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            synthesizer,
            poller: poller.map(Arc::new),
            event_bus,
        }
    }

    /// Build the production clients from resolved configuration
    pub fn from_config(config: &GeneratorConfig, event_bus: EventBus) -> Self {
        let synthesizer = match GeminiClient::new(&config.toml.llm, config.llm_api_key.clone()) {
            Ok(client) => Some(PromptSynthesizer::new(Arc::new(client))),
            Err(e) => {
                warn!("Prompt synthesis unavailable: {}", e);
                None
            }
        };

        let meshy = &config.toml.meshy;
        let poller = match MeshyClient::from_config(meshy, config.meshy_api_key.clone()) {
            Ok(client) => Some(
                TaskPoller::new(Arc::new(client), PollPolicy::from_config(meshy))
                    .with_request_flags(meshy.mode.clone(), meshy.art_style.clone()),
            ),
            Err(e) => {
                warn!("Remote generation unavailable: {}", e);
                None
            }
        };

        Self::new(synthesizer, poller, event_bus)
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Validate raw text and run a full generation with a fresh session id
    ///
    /// Validation errors are returned before anything else happens.
    pub async fn run(
        &self,
        raw_input: &str,
        mode: GenerationMode,
        cancel: &CancellationToken,
    ) -> Result<GenerationReport, ValidationError> {
        let input = MusicInput::parse(raw_input)?;
        Ok(self.generate(Uuid::new_v4(), &input, mode, cancel, None).await)
    }

    /// Run one generation for validated input
    ///
    /// Events go to the bus and, when given, to `updates` as well. The
    /// update channel is lossless, unlike the broadcast bus.
    pub async fn generate(
        &self,
        session_id: Uuid,
        input: &MusicInput,
        mode: GenerationMode,
        cancel: &CancellationToken,
        updates: Option<&mpsc::UnboundedSender<KcfyEvent>>,
    ) -> GenerationReport {
        let emit = |event: KcfyEvent| {
            if let Some(tx) = updates {
                let _ = tx.send(event.clone());
            }
            self.event_bus.emit_lossy(event);
        };

        info!(session_id = %session_id, ?mode, "Generation started");
        emit(KcfyEvent::GenerationStarted {
            session_id,
            mode: mode_name(mode).to_string(),
            timestamp: Utc::now(),
        });

        // Analyzing
        let Some(synthesizer) = &self.synthesizer else {
            error!(session_id = %session_id, "Prompt synthesis requested without credential");
            let form = FormState::failed(SynthesisError::MissingCredential.to_string());
            return self.fail(session_id, form, &emit);
        };

        let synthesized = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = synthesizer.synthesize(input) => Some(result),
        };

        let prompt = match synthesized {
            None => return self.cancelled(session_id, FormState::default(), &emit),
            Some(Ok(prompt)) => prompt,
            Some(Err(e)) => {
                error!(session_id = %session_id, error = %e, "Error in music analysis step");
                return self.fail(session_id, FormState::failed(e.to_string()), &emit);
            }
        };

        let mut form = FormState::with_prompt(&prompt);
        emit(KcfyEvent::PromptSynthesized {
            session_id,
            prompt: prompt.to_string(),
            timestamp: Utc::now(),
        });

        // Generating
        match mode {
            GenerationMode::Procedural => {
                let shape = shape_for_prompt(&prompt);
                info!(
                    session_id = %session_id,
                    shape = shape.shape.as_str(),
                    color = %shape.color,
                    "Procedural shape derived"
                );
                form.shape = Some(shape);
                self.complete(session_id, form, &emit)
            }
            GenerationMode::Remote => {
                let Some(poller) = &self.poller else {
                    form.error = Some(TaskError::MissingCredential.to_string());
                    error!(session_id = %session_id, "Remote generation requested without credential");
                    return self.fail(session_id, form, &emit);
                };

                let result = poller
                    .run(&prompt, cancel, |event| match event {
                        PollEvent::Created { task_id } => emit(KcfyEvent::TaskCreated {
                            session_id,
                            task_id,
                            timestamp: Utc::now(),
                        }),
                        PollEvent::StatusChanged {
                            task_id,
                            status,
                            attempt,
                            progress,
                        } => emit(KcfyEvent::TaskStatusChanged {
                            session_id,
                            task_id,
                            status: status.to_string(),
                            attempt,
                            progress,
                            timestamp: Utc::now(),
                        }),
                    })
                    .await;

                match result {
                    Ok(outcome) => {
                        form.model_url = Some(outcome.model_url);
                        self.complete(session_id, form, &emit)
                    }
                    Err(TaskError::Cancelled) => self.cancelled(session_id, form, &emit),
                    Err(e) => {
                        error!(session_id = %session_id, error = %e, "Error in 3D generation step");
                        form.error = Some(e.to_string());
                        self.fail(session_id, form, &emit)
                    }
                }
            }
        }
    }

    fn complete(
        &self,
        session_id: Uuid,
        form: FormState,
        emit: &impl Fn(KcfyEvent),
    ) -> GenerationReport {
        info!(session_id = %session_id, model_url = ?form.model_url, "Generation completed");
        emit(KcfyEvent::GenerationCompleted {
            session_id,
            prompt: form.prompt.clone().unwrap_or_default(),
            model_url: form.model_url.clone(),
            shape: form.shape.as_ref().map(|s| s.shape.as_str().to_string()),
            timestamp: Utc::now(),
        });
        GenerationReport {
            session_id,
            form,
            cancelled: false,
        }
    }

    fn fail(&self, session_id: Uuid, form: FormState, emit: &impl Fn(KcfyEvent)) -> GenerationReport {
        emit(KcfyEvent::GenerationFailed {
            session_id,
            prompt: form.prompt.clone(),
            error: form.error.clone().unwrap_or_default(),
            timestamp: Utc::now(),
        });
        GenerationReport {
            session_id,
            form,
            cancelled: false,
        }
    }

    fn cancelled(
        &self,
        session_id: Uuid,
        mut form: FormState,
        emit: &impl Fn(KcfyEvent),
    ) -> GenerationReport {
        info!(session_id = %session_id, "Generation cancelled");
        form.error = Some(TaskError::Cancelled.to_string());
        emit(KcfyEvent::GenerationCancelled {
            session_id,
            timestamp: Utc::now(),
        });
        GenerationReport {
            session_id,
            form,
            cancelled: true,
        }
    }
}

fn mode_name(mode: GenerationMode) -> &'static str {
    match mode {
        GenerationMode::Remote => "remote",
        GenerationMode::Procedural => "procedural",
    }
}
