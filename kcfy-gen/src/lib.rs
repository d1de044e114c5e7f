//! kcfy-gen library interface
//!
//! Exposes the generation pipeline, mesh toolkit, viewer and HTTP router
//! for the binary and for integration tests.

pub mod api;
pub mod config;
pub mod error;
pub mod mesh;
pub mod models;
pub mod services;
pub mod viewer;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use kcfy_common::config::GenerationMode;
use kcfy_common::events::EventBus;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};
use uuid::Uuid;

use crate::models::GenerationSession;
use crate::services::{GenerationOrchestrator, GenerationReport};
use crate::viewer::ModelViewer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Generation pipeline
    pub orchestrator: Arc<GenerationOrchestrator>,
    /// Currently displayed model
    pub viewer: Arc<RwLock<ModelViewer>>,
    /// Asynchronous generation sessions, kept in memory
    pub sessions: Arc<RwLock<HashMap<Uuid, GenerationSession>>>,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Cancellation tokens for running sessions
    pub cancellation_tokens: Arc<RwLock<HashMap<Uuid, CancellationToken>>>,
    /// Mode used when a request does not name one
    pub default_mode: GenerationMode,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        orchestrator: GenerationOrchestrator,
        viewer: ModelViewer,
        default_mode: GenerationMode,
    ) -> Self {
        Self {
            event_bus: orchestrator.event_bus().clone(),
            orchestrator: Arc::new(orchestrator),
            viewer: Arc::new(RwLock::new(viewer)),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            cancellation_tokens: Arc::new(RwLock::new(HashMap::new())),
            default_mode,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Surface a finished generation: record its error or display its model
    ///
    /// Cancelled runs change nothing. A failed run keeps the previous model.
    pub async fn present(&self, report: &GenerationReport) {
        if report.cancelled {
            return;
        }

        if let Some(message) = &report.form.error {
            *self.last_error.write().await = Some(message.clone());
            return;
        }

        let Some(model) = report.form.model_data() else {
            warn!(session_id = %report.session_id, "Generation finished without a model");
            return;
        };

        // Fetch and parse without holding the viewer lock; swap afterwards
        let loader = self.viewer.read().await.loader();
        match ModelViewer::load(loader.as_ref(), Some(&model)).await {
            Ok(displayed) => self.viewer.write().await.replace(displayed),
            Err(e) => {
                error!(session_id = %report.session_id, error = %e, "Viewer failed to display model");
                self.viewer.write().await.clear();
                *self.last_error.write().await = Some(e.to_string());
            }
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::generate_routes())
        .merge(api::generation_routes())
        .merge(api::viewer_routes())
        .merge(api::event_routes())
        .merge(api::health_routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
