//! Asynchronous generation sessions
//!
//! POST /api/generations, GET /api/generations/{id},
//! POST /api/generations/{id}/cancel

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use kcfy_common::config::GenerationMode;
use kcfy_common::events::KcfyEvent;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::GenerateRequest;
use crate::error::{ApiError, ApiResult};
use crate::models::{GenerationPhase, GenerationSession, MusicInput};
use crate::services::GenerationReport;
use crate::AppState;

/// POST /api/generations response
#[derive(Debug, Serialize)]
pub struct StartGenerationResponse {
    pub session_id: Uuid,
    pub phase: GenerationPhase,
    pub mode: GenerationMode,
    pub started_at: DateTime<Utc>,
}

/// POST /api/generations/{id}/cancel response
#[derive(Debug, Serialize)]
pub struct CancelGenerationResponse {
    pub session_id: Uuid,
    pub phase: GenerationPhase,
    pub cancelled_at: DateTime<Utc>,
}

/// POST /api/generations
///
/// Validates input, then runs the generation in a background task.
/// Returns 202 Accepted with the session ID.
pub async fn start_generation(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> ApiResult<(StatusCode, Json<StartGenerationResponse>)> {
    let input = MusicInput::parse(&request.music_info)?;
    let mode = request.mode.unwrap_or(state.default_mode);

    let session = GenerationSession::new(mode);
    let session_id = session.session_id;
    let response = StartGenerationResponse {
        session_id,
        phase: session.phase,
        mode,
        started_at: session.started_at,
    };

    let cancel = CancellationToken::new();
    state.sessions.write().await.insert(session_id, session);
    state
        .cancellation_tokens
        .write()
        .await
        .insert(session_id, cancel.clone());

    tracing::info!(session_id = %session_id, ?mode, "Generation session started");

    let state_clone = state.clone();
    tokio::spawn(async move {
        tracing::debug!(session_id = %session_id, "Background generation task started");
        run_session(state_clone, session_id, input, mode, cancel).await;
        tracing::debug!(session_id = %session_id, "Background generation task finished");
    });

    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// Drive one session: the orchestrator reports progress over a channel
/// that is applied to the session record as it arrives.
async fn run_session(
    state: AppState,
    session_id: Uuid,
    input: MusicInput,
    mode: GenerationMode,
    cancel: CancellationToken,
) {
    let (tx, mut rx) = mpsc::unbounded_channel();

    let orchestrator = state.orchestrator.clone();
    let run = async move {
        orchestrator
            .generate(session_id, &input, mode, &cancel, Some(&tx))
            .await
    };

    let apply = async {
        while let Some(event) = rx.recv().await {
            apply_event(&state, &event).await;
        }
    };

    let (report, ()) = tokio::join!(run, apply);
    finish_session(&state, report).await;
}

async fn apply_event(state: &AppState, event: &KcfyEvent) {
    let mut sessions = state.sessions.write().await;
    let Some(session) = sessions.get_mut(&event.session_id()) else {
        return;
    };

    match event {
        KcfyEvent::PromptSynthesized {
            prompt, timestamp, ..
        } => {
            session.form.prompt = Some(prompt.clone());
            session.form.timestamp = Some(timestamp.timestamp_millis());
            if !session.is_terminal() {
                session.transition_to(GenerationPhase::Generating);
            }
        }
        KcfyEvent::TaskCreated { task_id, .. } => {
            session.task_id = Some(task_id.clone());
        }
        KcfyEvent::TaskStatusChanged { status, .. } => {
            session.task_status = status.parse().ok();
        }
        _ => {}
    }
}

async fn finish_session(state: &AppState, report: GenerationReport) {
    state
        .cancellation_tokens
        .write()
        .await
        .remove(&report.session_id);

    let cancelled = {
        let mut sessions = state.sessions.write().await;
        match sessions.get_mut(&report.session_id) {
            Some(session) if session.phase == GenerationPhase::Cancelled || report.cancelled => {
                session.form = report.form.clone();
                session.transition_to(GenerationPhase::Cancelled);
                true
            }
            Some(session) => {
                session.finish(report.form.clone());
                false
            }
            None => report.cancelled,
        }
    };

    if !cancelled {
        state.present(&report).await;
    }
}

/// GET /api/generations/{id}
pub async fn get_generation(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<GenerationSession>> {
    let session = state
        .sessions
        .read()
        .await
        .get(&session_id)
        .cloned()
        .ok_or_else(|| ApiError::NotFound(format!("Generation session not found: {}", session_id)))?;

    tracing::debug!(session_id = %session_id, phase = ?session.phase, "Status query");
    Ok(Json(session))
}

/// POST /api/generations/{id}/cancel
///
/// Signals the background task and marks the session cancelled. A session
/// that already finished is a 409.
pub async fn cancel_generation(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<CancelGenerationResponse>> {
    let mut sessions = state.sessions.write().await;
    let session = sessions
        .get_mut(&session_id)
        .ok_or_else(|| ApiError::NotFound(format!("Generation session not found: {}", session_id)))?;

    if session.is_terminal() {
        return Err(ApiError::Conflict(format!(
            "Generation session already in terminal state: {:?}",
            session.phase
        )));
    }

    if let Some(token) = state.cancellation_tokens.read().await.get(&session_id) {
        token.cancel();
    }
    session.transition_to(GenerationPhase::Cancelled);

    tracing::info!(session_id = %session_id, "Generation session cancelled");

    Ok(Json(CancelGenerationResponse {
        session_id,
        phase: session.phase,
        cancelled_at: session.ended_at.unwrap_or_else(Utc::now),
    }))
}

/// Build generation session routes
pub fn generation_routes() -> Router<AppState> {
    Router::new()
        .route("/api/generations", post(start_generation))
        .route("/api/generations/:session_id", get(get_generation))
        .route("/api/generations/:session_id/cancel", post(cancel_generation))
}
