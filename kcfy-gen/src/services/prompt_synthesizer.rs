//! Music description → text-to-3D prompt
//!
//! A fixed instruction template is filled with the user's input and sent to
//! a [`LanguageModel`]. The model must answer with `{"prompt": "..."}`;
//! anything else is a [`SynthesisError::NoStructuredOutput`]. No retries.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{GeneratedPrompt, MusicInput};

/// Instruction template; `{{music_info}}` is replaced with the user input
pub const PROMPT_TEMPLATE: &str = r#"You are an AI assistant designed to analyze music information (title, link, or lyrics) and generate a prompt suitable for a text-to-3D model generation service.

Analyze the following music information:
{{music_info}}

Extract the emotional tones, moods, and dominant concepts from the music information.
Translate the extracted emotions and concepts into a concise, single-sentence prompt for the 3D generation service.
The prompt should describe a physical keychain object that captures the emotional essence of the song in form, color, and texture.
Example: 'Create a glowing heart-shaped keychain representing dreamy melancholy in blue tones'.

Respond with a JSON object of the form {"prompt": "<the prompt>"} and nothing else."#;

/// Prompt synthesis errors
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("Language model API key is not configured")]
    MissingCredential,

    #[error("Language model request failed: {0}")]
    Request(String),

    #[error("Language model API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Language model returned no structured output")]
    NoStructuredOutput,
}

/// A text-generation backend returning raw JSON text
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    /// Send the full instructions, return the model's raw text answer
    async fn complete_json(&self, instructions: &str) -> Result<String, SynthesisError>;
}

#[derive(Debug, Deserialize)]
struct PromptOutput {
    prompt: String,
}

/// Renders the template and parses the structured answer
#[derive(Clone)]
pub struct PromptSynthesizer {
    model: Arc<dyn LanguageModel>,
}

impl PromptSynthesizer {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Instructions sent to the model for `input`
    pub fn render(input: &MusicInput) -> String {
        PROMPT_TEMPLATE.replace("{{music_info}}", input.as_str())
    }

    /// Produce a single descriptive prompt for `input`
    pub async fn synthesize(&self, input: &MusicInput) -> Result<GeneratedPrompt, SynthesisError> {
        let instructions = Self::render(input);
        debug!(model = self.model.name(), "Requesting prompt synthesis");

        let raw = self.model.complete_json(&instructions).await?;
        let prompt = parse_prompt_output(&raw)?;

        info!(model = self.model.name(), prompt = %prompt, "Prompt synthesized");
        Ok(prompt)
    }
}

/// Parse `{"prompt": "..."}`, tolerating a surrounding Markdown code fence
pub fn parse_prompt_output(raw: &str) -> Result<GeneratedPrompt, SynthesisError> {
    let body = strip_code_fence(raw.trim());
    let output: PromptOutput =
        serde_json::from_str(body).map_err(|_| SynthesisError::NoStructuredOutput)?;
    GeneratedPrompt::new(&output.prompt).ok_or(SynthesisError::NoStructuredOutput)
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop an optional language tag on the opening fence line
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}
