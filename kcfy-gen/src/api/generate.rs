//! Synchronous generation
//!
//! POST /api/generate runs the whole pipeline inside the request and
//! answers with the final form state.

use axum::{extract::State, routing::post, Json, Router};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::GenerateRequest;
use crate::error::ApiResult;
use crate::models::{FormState, MusicInput};
use crate::AppState;

/// POST /api/generate
///
/// Input validation failures are 400 responses. Upstream failures are not
/// HTTP errors: they come back as `error` in the form state, next to the
/// prompt when one was produced.
pub async fn generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> ApiResult<Json<FormState>> {
    let input = MusicInput::parse(&request.music_info)?;
    let mode = request.mode.unwrap_or(state.default_mode);

    // Not registered as a session: a dropped request drops the whole run
    let report = state
        .orchestrator
        .generate(Uuid::new_v4(), &input, mode, &CancellationToken::new(), None)
        .await;

    state.present(&report).await;

    Ok(Json(report.form))
}

/// Build synchronous generation routes
pub fn generate_routes() -> Router<AppState> {
    Router::new().route("/api/generate", post(generate))
}
