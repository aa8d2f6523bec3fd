//! Integration tests for config load/save against real files.

use gateway_chat_client::{config, Config};
use predicates::prelude::*;

#[test]
fn load_existing_yaml_config() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.yaml");
    std::fs::write(
        &config_path,
        r#"
gateway:
  url: "ws://gateway.local:18789"
  token: "test-token"
  session_key: "desk"
client:
  id: "desk-ui"
  platform: "linux"
  locale: "de-DE"
  history_limit: 20
chat:
  model: "anthropic/claude-sonnet-4-5"
"#,
    )
    .unwrap();

    let cfg = config::load(&config_path).expect("load should succeed");
    assert_eq!(cfg.gateway.url.as_deref(), Some("ws://gateway.local:18789"));
    assert_eq!(cfg.gateway.token.as_deref(), Some("test-token"));
    assert_eq!(cfg.gateway.session_key.as_deref(), Some("desk"));
    assert_eq!(cfg.client.id.as_deref(), Some("desk-ui"));
    assert_eq!(cfg.client.history_limit, Some(20));
    assert_eq!(cfg.chat.model.as_deref(), Some("anthropic/claude-sonnet-4-5"));

    let client = cfg.client_config().expect("config should resolve");
    assert_eq!(client.gateway_url, "ws://gateway.local:18789");
    assert_eq!(client.token.as_deref(), Some("test-token"));
    assert_eq!(client.session_key, "desk");
    assert_eq!(client.client.id, "desk-ui");
    assert_eq!(client.client.platform, "linux");
    assert_eq!(client.client.mode, "operator");
    assert_eq!(client.locale, "de-DE");
    assert_eq!(client.history_limit, 20);
}

#[test]
fn partial_config_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.yaml");
    std::fs::write(&config_path, "gateway:\n  token: abc\n").unwrap();

    let client = config::load(&config_path)
        .and_then(|c| c.client_config())
        .expect("partial config should resolve");
    assert_eq!(client.gateway_url, "ws://127.0.0.1:18789");
    assert_eq!(client.token.as_deref(), Some("abc"));
    assert_eq!(client.session_key, "jarvis-ui");
    assert_eq!(client.history_limit, 50);
}

#[test]
fn missing_file_is_an_error_for_load_but_not_for_load_or_default() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("absent.yaml");

    let err = config::load(&config_path).unwrap_err();
    assert!(predicate::str::contains("IO error").eval(&err.to_string()));

    let cfg = config::load_or_default(&config_path).expect("defaults expected");
    assert_eq!(cfg, Config::default());
}

#[test]
fn invalid_yaml_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.yaml");
    std::fs::write(&config_path, "gateway: [unclosed").unwrap();

    let err = config::load(&config_path).unwrap_err();
    assert!(predicate::str::contains("YAML").eval(&err.to_string()));
}

#[test]
fn save_creates_directory_and_file_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let config_dir = dir.path().join("gateway-chat");
    let config_path = config_dir.join("config.yaml");
    assert!(!config_dir.exists(), "config dir should not exist yet");

    let mut config = Config::default();
    config.gateway.url = Some("ws://127.0.0.1:18789".into());
    config.gateway.token = Some("key".into());
    config.chat.model = Some("openai/gpt-4.1".into());

    config::save(&config_path, &config).expect("save should succeed");
    let pred = predicates::path::exists();
    assert!(pred.eval(&config_path), "config file should exist after save");
    assert!(config_dir.exists(), "config directory should be created");

    let contents = std::fs::read_to_string(&config_path).unwrap();
    assert!(predicates::str::contains("gateway:").eval(&contents));
    assert!(
        !predicates::str::contains("session_key").eval(&contents),
        "unset fields should not be written"
    );

    let reloaded = config::load(&config_path).expect("reload should succeed");
    assert_eq!(reloaded, config);
}

/// Config path resolves to `~/.gateway-chat/config.yaml` using the current platform's home dir.
#[test]
fn default_config_path_uses_home_directory() {
    let dir = tempfile::tempdir().unwrap();
    let home = dir.path().to_str().unwrap().to_string();

    let key = if cfg!(windows) { "USERPROFILE" } else { "HOME" };
    let original = std::env::var(key).ok();

    std::env::set_var(key, &home);
    let path = config::default_config_path();
    match original {
        Some(v) => std::env::set_var(key, v),
        None => std::env::remove_var(key),
    }

    let path = path.expect("should resolve a config path");
    let expected = dir.path().join(".gateway-chat").join("config.yaml");
    assert_eq!(path, expected);
}
