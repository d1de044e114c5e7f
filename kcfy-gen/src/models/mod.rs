//! Data models for kcfy-gen

pub mod generation;
pub mod music_input;

pub use generation::{
    FormState, GeneratedPrompt, GenerationPhase, GenerationSession, ModelData, ModelSource,
    Primitive, ShapeSpec, TaskStatus,
};
pub use music_input::{MusicInput, ValidationError, MAX_INPUT_CHARS, MIN_INPUT_CHARS};
