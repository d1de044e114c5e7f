//! Model viewer state
//!
//! Holds the currently displayed mesh: the default knot, a procedural
//! primitive, or a remote GLB asset. Every `show` drops the previous mesh
//! before building the next, so a failed load leaves nothing displayed.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

use crate::mesh::{self, glb, Mesh, MeshError};
use crate::models::{ModelData, ModelSource, Primitive};
use crate::services::shape_heuristic::DEFAULT_COLOR;

/// Download name for exported STL files
pub const STL_FILE_NAME: &str = "keychainify-model.stl";

/// Remote models are normalized into a box of this edge length
pub const FIT_SIZE: f32 = 2.0;

/// Largest asset accepted from a remote URL
pub const MAX_ASSET_BYTES: usize = 64 * 1024 * 1024;

const USER_AGENT: &str = "KeyChainify/0.1.0";
const FETCH_TIMEOUT: Duration = Duration::from_secs(60);
const STL_HEADER: &str = "KeyChainify model";

/// Viewer errors
#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("Failed to fetch model asset: {0}")]
    Fetch(String),

    #[error("Model asset request returned HTTP {status}")]
    Http { status: u16 },

    #[error("Model asset exceeds the size limit")]
    TooLarge,

    #[error(transparent)]
    Mesh(#[from] MeshError),
}

/// Fetches remote model bytes
#[async_trait]
pub trait AssetLoader: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ViewerError>;
}

/// reqwest-backed [`AssetLoader`]
pub struct HttpAssetLoader {
    http_client: reqwest::Client,
}

impl HttpAssetLoader {
    pub fn new() -> Result<Self, ViewerError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| ViewerError::Fetch(e.to_string()))?;
        Ok(Self { http_client })
    }
}

#[async_trait]
impl AssetLoader for HttpAssetLoader {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ViewerError> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| ViewerError::Fetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ViewerError::Http {
                status: status.as_u16(),
            });
        }
        if response
            .content_length()
            .is_some_and(|len| len as usize > MAX_ASSET_BYTES)
        {
            return Err(ViewerError::TooLarge);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ViewerError::Fetch(e.to_string()))?;
        if bytes.len() > MAX_ASSET_BYTES {
            return Err(ViewerError::TooLarge);
        }
        Ok(bytes.to_vec())
    }
}

/// What the displayed mesh was built from
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DisplaySource {
    /// Built-in knot shown before any generation
    Default,
    Procedural { shape: Primitive },
    Remote { url: String },
}

/// The currently displayed model
#[derive(Debug, Clone)]
pub struct DisplayedModel {
    pub source: DisplaySource,
    pub prompt: Option<String>,
    /// Material color; remote assets carry their own
    pub color: Option<String>,
    pub mesh: Mesh,
}

/// Serializable summary of the viewer state
#[derive(Debug, Clone, Serialize)]
pub struct ViewerSnapshot {
    pub displayed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<DisplaySource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub vertex_count: usize,
    pub triangle_count: usize,
}

pub struct ModelViewer {
    loader: Arc<dyn AssetLoader>,
    current: Option<DisplayedModel>,
}

impl ModelViewer {
    /// Viewer with nothing displayed
    pub fn new(loader: Arc<dyn AssetLoader>) -> Self {
        Self {
            loader,
            current: None,
        }
    }

    /// Replace the displayed model
    ///
    /// `None` shows the default knot. On error nothing is displayed.
    pub async fn show(&mut self, model: Option<&ModelData>) -> Result<(), ViewerError> {
        self.clear();
        let displayed = Self::load(self.loader.as_ref(), model).await?;
        self.replace(displayed);
        Ok(())
    }

    /// Build the mesh for `model` without touching the displayed one
    ///
    /// Remote assets are fetched and parsed here, so callers sharing the
    /// viewer behind a lock can load first and swap afterwards.
    pub async fn load(
        loader: &dyn AssetLoader,
        model: Option<&ModelData>,
    ) -> Result<DisplayedModel, ViewerError> {
        let displayed = match model {
            None => DisplayedModel {
                source: DisplaySource::Default,
                prompt: None,
                color: Some(DEFAULT_COLOR.to_string()),
                mesh: mesh::primitives::default_knot(),
            },
            Some(ModelData {
                prompt,
                source: ModelSource::Procedural(spec),
            }) => DisplayedModel {
                source: DisplaySource::Procedural { shape: spec.shape },
                prompt: Some(prompt.to_string()),
                color: Some(spec.color.clone()),
                mesh: mesh::build_primitive(spec.shape),
            },
            Some(ModelData {
                prompt,
                source: ModelSource::Remote { url },
            }) => {
                let mesh = load_remote(loader, url).await.inspect_err(|e| {
                    error!(url = %url, error = %e, "Failed to load model");
                })?;
                DisplayedModel {
                    source: DisplaySource::Remote { url: url.clone() },
                    prompt: Some(prompt.to_string()),
                    color: None,
                    mesh,
                }
            }
        };
        Ok(displayed)
    }

    /// Swap in an already loaded model, dropping the previous one
    pub fn replace(&mut self, displayed: DisplayedModel) {
        info!(
            source = ?displayed.source,
            triangles = displayed.mesh.triangles.len(),
            "Viewer model replaced"
        );
        self.current = Some(displayed);
    }

    /// Drop the displayed model
    pub fn clear(&mut self) {
        self.current = None;
    }

    /// Loader used for remote assets
    pub fn loader(&self) -> Arc<dyn AssetLoader> {
        Arc::clone(&self.loader)
    }

    pub fn current(&self) -> Option<&DisplayedModel> {
        self.current.as_ref()
    }

    pub fn snapshot(&self) -> ViewerSnapshot {
        match &self.current {
            Some(model) => ViewerSnapshot {
                displayed: true,
                source: Some(model.source.clone()),
                prompt: model.prompt.clone(),
                color: model.color.clone(),
                vertex_count: model.mesh.vertices.len(),
                triangle_count: model.mesh.triangles.len(),
            },
            None => ViewerSnapshot {
                displayed: false,
                source: None,
                prompt: None,
                color: None,
                vertex_count: 0,
                triangle_count: 0,
            },
        }
    }

    /// Binary STL of the displayed mesh; `None` when nothing is displayed
    pub fn export_stl(&self) -> Option<Vec<u8>> {
        self.current
            .as_ref()
            .map(|model| mesh::to_binary_stl(&model.mesh, STL_HEADER))
    }

    /// ASCII STL of the displayed mesh
    pub fn export_ascii_stl(&self) -> Option<String> {
        self.current
            .as_ref()
            .map(|model| mesh::to_ascii_stl(&model.mesh, "keychainify"))
    }
}

async fn load_remote(loader: &dyn AssetLoader, url: &str) -> Result<Mesh, ViewerError> {
    let bytes = loader.fetch(url).await?;
    let mut mesh = glb::parse_glb(&bytes)?;
    mesh.fit_to(FIT_SIZE);
    Ok(mesh)
}
