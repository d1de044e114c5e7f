//! Resolved service configuration
//!
//! Wraps the TOML bootstrap config with credentials resolved from the
//! environment. Read-only after startup.

use kcfy_common::config::{load_config, resolve_secret, GenerationMode, TomlConfig};
use std::net::SocketAddr;
use std::path::Path;
use tracing::warn;

/// Environment variable holding the text-to-3D credential
pub const MESHY_API_KEY_ENV: &str = "MESHY_API_KEY";

/// Environment variable holding the language model credential
pub const LLM_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Bootstrap config plus resolved credentials
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub toml: TomlConfig,
    pub meshy_api_key: Option<String>,
    pub llm_api_key: Option<String>,
}

impl GeneratorConfig {
    /// Resolve credentials for an already-loaded TOML config
    pub fn resolve(toml: TomlConfig) -> Self {
        let meshy_api_key = resolve_secret(MESHY_API_KEY_ENV, toml.meshy.api_key.as_deref());
        let llm_api_key = resolve_secret(LLM_API_KEY_ENV, toml.llm.api_key.as_deref());

        if meshy_api_key.is_none() && toml.generation.mode == GenerationMode::Remote {
            warn!("{} is not set; remote generation requests will fail", MESHY_API_KEY_ENV);
        }
        if llm_api_key.is_none() {
            warn!("{} is not set; prompt synthesis will fail", LLM_API_KEY_ENV);
        }

        Self {
            toml,
            meshy_api_key,
            llm_api_key,
        }
    }

    /// Load the TOML file (CLI → ENV → default path) and resolve credentials
    pub fn load(cli_config: Option<&Path>) -> kcfy_common::Result<Self> {
        Ok(Self::resolve(load_config(cli_config)?))
    }

    pub fn default_mode(&self) -> GenerationMode {
        self.toml.generation.mode
    }

    /// Listen address, with an optional port override
    pub fn socket_addr(&self, port_override: Option<u16>) -> kcfy_common::Result<SocketAddr> {
        let port = port_override.unwrap_or(self.toml.port);
        format!("{}:{}", self.toml.bind_address, port)
            .parse()
            .map_err(|e| {
                kcfy_common::Error::Config(format!(
                    "Invalid bind address '{}': {}",
                    self.toml.bind_address, e
                ))
            })
    }
}
