//! User-supplied music description
//!
//! Validation happens before any network call; a rejected input never
//! reaches the language model or the task API.

use serde::Serialize;
use thiserror::Error;

/// Minimum input length in characters (after trim)
pub const MIN_INPUT_CHARS: usize = 10;

/// Maximum input length in characters (after trim)
pub const MAX_INPUT_CHARS: usize = 1000;

/// Field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationError {
    #[error("Please enter at least 10 characters of a song title, URL, or lyrics.")]
    TooShort { length: usize },

    #[error("Input is too long. Please limit to 1000 characters.")]
    TooLong { length: usize },
}

impl ValidationError {
    /// Name of the form field the error belongs to
    pub fn field(&self) -> &'static str {
        "music_info"
    }
}

/// Validated song title, link or lyrics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MusicInput(String);

impl MusicInput {
    /// Trim and length-check raw user text
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        let length = trimmed.chars().count();

        if length < MIN_INPUT_CHARS {
            return Err(ValidationError::TooShort { length });
        }
        if length > MAX_INPUT_CHARS {
            return Err(ValidationError::TooLong { length });
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
