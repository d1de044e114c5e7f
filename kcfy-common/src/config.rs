//! Configuration loading and config file resolution
//!
//! Bootstrap configuration lives in a single TOML file. The file is located
//! in priority order:
//! 1. Command-line argument (highest priority)
//! 2. `KCFY_CONFIG` environment variable
//! 3. Platform config directory (`~/.config/keychainify/config.toml` on Linux)
//! 4. Compiled defaults (no file)
//!
//! A missing file is never fatal: the service logs a warning and starts with
//! built-in defaults. Credentials are resolved separately (environment
//! first, then TOML) by [`resolve_secret`].

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "KCFY_CONFIG";

/// Default HTTP port for kcfy-gen
pub const DEFAULT_PORT: u16 = 5780;

/// Bootstrap configuration loaded from TOML file
///
/// Every section is optional; missing keys fall back to compiled defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Address the HTTP server binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Text-to-3D service settings
    #[serde(default)]
    pub meshy: MeshyConfig,

    /// Language model settings
    #[serde(default)]
    pub llm: LlmConfig,

    /// Generation pipeline settings
    #[serde(default)]
    pub generation: GenerationConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            logging: LoggingConfig::default(),
            meshy: MeshyConfig::default(),
            llm: LlmConfig::default(),
            generation: GenerationConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Text-to-3D (Meshy) service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshyConfig {
    /// API key; `MESHY_API_KEY` in the environment takes precedence
    #[serde(default)]
    pub api_key: Option<String>,

    /// Base URL of the task API (without the `/text-to-3d` suffix)
    #[serde(default = "default_meshy_base_url")]
    pub base_url: String,

    /// Generation mode flag sent with every creation request
    #[serde(default = "default_meshy_mode")]
    pub mode: String,

    /// Optional art style flag
    #[serde(default)]
    pub art_style: Option<String>,

    /// Delay between status polls (seconds)
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Maximum number of status polls before giving up
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,

    /// Wall-clock limit for one task (seconds), 0 disables
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for MeshyConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_meshy_base_url(),
            mode: default_meshy_mode(),
            art_style: None,
            poll_interval_secs: default_poll_interval_secs(),
            max_poll_attempts: default_max_poll_attempts(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Language model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API key; `GEMINI_API_KEY` in the environment takes precedence
    #[serde(default)]
    pub api_key: Option<String>,

    /// Base URL of the generative language API
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            temperature: default_temperature(),
        }
    }
}

/// Generation pipeline settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Which back half of the pipeline runs after prompt synthesis
    #[serde(default)]
    pub mode: GenerationMode,
}

/// How a generated prompt becomes a model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    /// Submit the prompt to the external text-to-3D task API
    #[default]
    Remote,
    /// Derive a procedural primitive from keywords in the prompt
    Procedural,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_meshy_base_url() -> String {
    "https://api.meshy.ai/v1".to_string()
}

fn default_meshy_mode() -> String {
    "preview".to_string()
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_max_poll_attempts() -> u32 {
    120
}

fn default_timeout_secs() -> u64 {
    900
}

fn default_llm_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_llm_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_temperature() -> f32 {
    0.8
}

/// Locate the config file following the documented priority order
///
/// Returns `None` when no file is configured or found.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config directory
    default_config_path().filter(|p| p.exists())
}

/// Platform config file location (`<config_dir>/keychainify/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("keychainify").join("config.toml"))
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Load configuration with graceful degradation
///
/// An explicitly requested file that cannot be read or parsed is an error.
/// A missing default file falls back to compiled defaults with a warning.
pub fn load_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    match resolve_config_path(cli_arg) {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            let config = load_toml_config(&path)?;
            info!("Configuration loaded from {}", path.display());
            Ok(config)
        }
        None => {
            warn!("No config file found, using built-in defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Validate secret value (non-empty, non-whitespace)
pub fn is_valid_secret(value: &str) -> bool {
    !value.trim().is_empty()
}

/// Resolve a credential from environment and TOML
///
/// **Priority:** ENV → TOML. Blank values are ignored. Returns `None` when
/// no source supplies a usable value; callers decide whether that is fatal.
pub fn resolve_secret(env_var: &str, toml_value: Option<&str>) -> Option<String> {
    let env_value = std::env::var(env_var).ok().filter(|v| is_valid_secret(v));
    let toml_value = toml_value.filter(|v| is_valid_secret(v));

    if env_value.is_some() && toml_value.is_some() {
        warn!(
            "{} found in environment and TOML config. Using environment (highest priority).",
            env_var
        );
    }

    if let Some(value) = env_value {
        info!("{} loaded from environment variable", env_var);
        return Some(value.trim().to_string());
    }

    if let Some(value) = toml_value {
        info!("{} loaded from TOML config", env_var);
        return Some(value.trim().to_string());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TomlConfig::default();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.meshy.poll_interval_secs, 5);
        assert_eq!(config.meshy.mode, "preview");
        assert_eq!(config.generation.mode, GenerationMode::Remote);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            port = 6000

            [meshy]
            art_style = "realistic"

            [generation]
            mode = "procedural"
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 6000);
        assert_eq!(config.meshy.art_style.as_deref(), Some("realistic"));
        assert_eq!(config.meshy.max_poll_attempts, 120);
        assert_eq!(config.llm.model, "gemini-2.0-flash");
        assert_eq!(config.generation.mode, GenerationMode::Procedural);
    }

    #[test]
    fn test_is_valid_secret() {
        assert!(is_valid_secret("abc"));
        assert!(!is_valid_secret(""));
        assert!(!is_valid_secret("   \t"));
    }
}
