//! Gemini `generateContent` client
//!
//! Asks for `application/json` output so the answer can be parsed as the
//! prompt object without scraping free text.

use async_trait::async_trait;
use kcfy_common::config::LlmConfig;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

use super::prompt_synthesizer::{LanguageModel, SynthesisError};
use super::task_schema::text_excerpt;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize, Serialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize, Serialize)]
struct Part {
    text: Option<String>,
}

/// Google Generative Language API client
pub struct GeminiClient {
    http_client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    api_key: String,
}

impl GeminiClient {
    pub fn new(config: &LlmConfig, api_key: Option<String>) -> Result<Self, SynthesisError> {
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or(SynthesisError::MissingCredential)?;

        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SynthesisError::Request(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn complete_json(&self, instructions: &str) -> Result<String, SynthesisError> {
        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": instructions }]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "temperature": self.temperature
            }
        });

        let response = self
            .http_client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SynthesisError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SynthesisError::Api {
                status: status.as_u16(),
                body: text_excerpt(&body),
            });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|_| SynthesisError::NoStructuredOutput)?;

        first_text(parsed).ok_or(SynthesisError::NoStructuredOutput)
    }
}

fn first_text(response: GenerateContentResponse) -> Option<String> {
    response
        .candidates
        .into_iter()
        .filter_map(|c| c.content)
        .flat_map(|c| c.parts)
        .filter_map(|p| p.text)
        .find(|t| !t.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_text_skips_empty_candidates() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [
                {"content": {"parts": [{"text": ""}]}},
                {"content": {"parts": [{"text": "{\"prompt\": \"a gold star\"}"}]}}
            ]
        }))
        .unwrap();

        assert_eq!(first_text(response).as_deref(), Some("{\"prompt\": \"a gold star\"}"));
    }

    #[test]
    fn test_no_candidates() {
        let response: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert!(first_text(response).is_none());
    }

    #[test]
    fn test_missing_key_rejected() {
        assert!(matches!(
            GeminiClient::new(&LlmConfig::default(), None),
            Err(SynthesisError::MissingCredential)
        ));
    }

    #[test]
    fn test_endpoint_uses_model() {
        let client = GeminiClient::new(&LlmConfig::default(), Some("k".to_string())).unwrap();
        assert!(client.endpoint().ends_with("/models/gemini-2.0-flash:generateContent"));
    }
}
