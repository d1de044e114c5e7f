//! Viewer endpoints
//!
//! GET /api/viewer, GET /api/viewer/model.stl

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

use crate::viewer::{ViewerSnapshot, STL_FILE_NAME};
use crate::AppState;

/// GET /api/viewer
pub async fn viewer_state(State(state): State<AppState>) -> Json<ViewerSnapshot> {
    Json(state.viewer.read().await.snapshot())
}

/// GET /api/viewer/model.stl
///
/// Binary STL of the displayed model; 204 No Content when nothing is shown.
pub async fn download_stl(State(state): State<AppState>) -> Response {
    let Some(bytes) = state.viewer.read().await.export_stl() else {
        tracing::debug!("STL export requested with no model displayed");
        return StatusCode::NO_CONTENT.into_response();
    };

    tracing::info!(bytes = bytes.len(), "STL exported");
    (
        [
            (header::CONTENT_TYPE, "model/stl".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", STL_FILE_NAME),
            ),
        ],
        bytes,
    )
        .into_response()
}

/// Build viewer routes
pub fn viewer_routes() -> Router<AppState> {
    Router::new()
        .route("/api/viewer", get(viewer_state))
        .route("/api/viewer/model.stl", get(download_stl))
}
