//! Service configuration tests
//!
//! Credential variables are process-global, so every test here is #[serial].

use kcfy_common::config::{GenerationMode, CONFIG_ENV_VAR};
use kcfy_common::events::EventBus;
use kcfy_gen::config::{GeneratorConfig, LLM_API_KEY_ENV, MESHY_API_KEY_ENV};
use kcfy_gen::services::GenerationOrchestrator;
use serial_test::serial;
use std::env;
use std::io::Write;
use tokio_util::sync::CancellationToken;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn clear_env() {
    env::remove_var(MESHY_API_KEY_ENV);
    env::remove_var(LLM_API_KEY_ENV);
    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_environment_credentials_override_toml() {
    clear_env();
    let file = write_config(
        r#"
        [meshy]
        api_key = "toml-meshy"

        [llm]
        api_key = "toml-llm"
        "#,
    );
    env::set_var(MESHY_API_KEY_ENV, "env-meshy");

    let config = GeneratorConfig::load(Some(file.path())).unwrap();

    assert_eq!(config.meshy_api_key.as_deref(), Some("env-meshy"));
    assert_eq!(config.llm_api_key.as_deref(), Some("toml-llm"));

    clear_env();
}

#[test]
#[serial]
fn test_blank_credentials_are_missing() {
    clear_env();
    let file = write_config(
        r#"
        [meshy]
        api_key = "   "
        "#,
    );
    env::set_var(LLM_API_KEY_ENV, "");

    let config = GeneratorConfig::load(Some(file.path())).unwrap();

    assert!(config.meshy_api_key.is_none());
    assert!(config.llm_api_key.is_none());

    clear_env();
}

#[test]
#[serial]
fn test_toml_sets_mode_and_port() {
    clear_env();
    let file = write_config(
        r#"
        port = 6100
        bind_address = "0.0.0.0"

        [generation]
        mode = "procedural"
        "#,
    );

    let config = GeneratorConfig::load(Some(file.path())).unwrap();

    assert_eq!(config.default_mode(), GenerationMode::Procedural);
    let addr = config.socket_addr(None).unwrap();
    assert_eq!(addr.to_string(), "0.0.0.0:6100");
}

#[tokio::test]
#[serial]
async fn test_missing_credentials_fail_requests_not_startup() {
    // Given: No credentials anywhere
    clear_env();
    let file = write_config("");
    let config = GeneratorConfig::load(Some(file.path())).unwrap();

    // When: The orchestrator is built from it
    let orchestrator = GenerationOrchestrator::from_config(&config, EventBus::new(16));

    // Then: A request fails with a configuration error in the form
    let report = orchestrator
        .run(
            "Bohemian Rhapsody by Queen",
            GenerationMode::Remote,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(
        report.form.error.as_deref(),
        Some("Language model API key is not configured")
    );
}
