//! API key resolution tests
//!
//! These tests mutate process environment and run serially.

use serial_test::serial;
use xuexi_common::config::TomlConfig;
use xuexi_runner::config::{build_oracle, resolve_api_key, API_KEY_ENV_VAR};

fn config_with_key(key: Option<&str>) -> TomlConfig {
    TomlConfig {
        api_key: key.map(str::to_string),
        ..Default::default()
    }
}

#[test]
#[serial]
fn test_env_key_wins_over_toml() {
    std::env::set_var(API_KEY_ENV_VAR, "env-key-1234");

    let key = resolve_api_key(&config_with_key(Some("toml-key-5678")));

    std::env::remove_var(API_KEY_ENV_VAR);
    assert_eq!(key.as_deref(), Some("env-key-1234"));
}

#[test]
#[serial]
fn test_toml_key_used_without_env() {
    std::env::remove_var(API_KEY_ENV_VAR);

    let key = resolve_api_key(&config_with_key(Some("toml-key-5678")));

    assert_eq!(key.as_deref(), Some("toml-key-5678"));
}

#[test]
#[serial]
fn test_blank_keys_are_ignored() {
    std::env::set_var(API_KEY_ENV_VAR, "   ");

    let key = resolve_api_key(&config_with_key(Some("")));

    std::env::remove_var(API_KEY_ENV_VAR);
    assert!(key.is_none());
}

#[test]
#[serial]
fn test_no_key_means_no_oracle() {
    std::env::remove_var(API_KEY_ENV_VAR);
    let config = config_with_key(None);

    assert!(build_oracle(resolve_api_key(&config), &config).is_none());
}

#[test]
fn test_key_builds_oracle() {
    let config = TomlConfig::default();
    assert!(build_oracle(Some("sk-local".to_string()), &config).is_some());
}
