//! Generation services

pub mod gemini_client;
pub mod generation_orchestrator;
pub mod meshy_client;
pub mod prompt_synthesizer;
pub mod shape_heuristic;
pub mod task_poller;
pub mod task_schema;

pub use gemini_client::GeminiClient;
pub use generation_orchestrator::{GenerationOrchestrator, GenerationReport};
pub use meshy_client::MeshyClient;
pub use prompt_synthesizer::{LanguageModel, PromptSynthesizer, SynthesisError};
pub use shape_heuristic::{default_shape, derive_shape, shape_for_prompt};
pub use task_poller::{
    PollEvent, PollPolicy, PollState, RequestStage, TaskError, TaskOutcome, TaskPoller,
    TaskRequest, TaskTransport,
};
