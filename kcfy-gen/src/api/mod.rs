//! HTTP API handlers for kcfy-gen
//!
//! JSON over HTTP plus an SSE event stream.

pub mod generate;
pub mod generations;
pub mod health;
pub mod sse;
pub mod viewer;

use kcfy_common::config::GenerationMode;
use serde::Deserialize;

pub use generate::generate_routes;
pub use generations::generation_routes;
pub use health::health_routes;
pub use sse::{event_routes, event_stream};
pub use viewer::viewer_routes;

/// Body of both generation endpoints
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    /// Song title, link or lyrics
    pub music_info: String,
    /// Overrides the configured generation mode
    #[serde(default)]
    pub mode: Option<GenerationMode>,
}
