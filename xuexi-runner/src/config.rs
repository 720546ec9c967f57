//! Runner configuration resolution
//!
//! The API key resolves with ENV → TOML priority; everything else comes
//! from the TOML file.

use crate::collaborators::{oracle::ChatOracle, Oracle};
use std::sync::Arc;
use tracing::{info, warn};
use xuexi_common::config::TomlConfig;

/// Environment variable holding the assisted-answering API key
pub const API_KEY_ENV_VAR: &str = "XUEXI_API_KEY";

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Resolve the API key
///
/// **Priority:** ENV → TOML. Returns `None` when neither holds a valid key;
/// quiz questions then escalate instead of consulting the oracle.
pub fn resolve_api_key(toml_config: &TomlConfig) -> Option<String> {
    let env_key = std::env::var(API_KEY_ENV_VAR)
        .ok()
        .filter(|k| is_valid_key(k));
    let toml_key = toml_config.api_key.clone().filter(|k| is_valid_key(k));

    if env_key.is_some() && toml_key.is_some() {
        warn!(
            "API key found in both {} and TOML config. Using environment (highest priority).",
            API_KEY_ENV_VAR
        );
    }

    if let Some(key) = env_key {
        info!("API key loaded from environment variable");
        return Some(key);
    }
    if let Some(key) = toml_key {
        info!("API key loaded from TOML config");
        return Some(key);
    }

    warn!(
        "API key not configured; set {} or api_key in the config file",
        API_KEY_ENV_VAR
    );
    None
}

/// Build the oracle for `api_key` using the endpoint and model from config
pub fn build_oracle(api_key: Option<String>, toml_config: &TomlConfig) -> Option<Arc<dyn Oracle>> {
    let key = api_key?;
    match ChatOracle::new(
        key,
        toml_config.oracle.endpoint.clone(),
        toml_config.oracle.model.clone(),
    ) {
        Ok(oracle) => {
            info!(model = oracle.model(), "Oracle client ready");
            Some(Arc::new(oracle))
        }
        Err(e) => {
            warn!(error = %e, "Failed to build oracle client");
            None
        }
    }
}

/// Mask a key for display: last four characters only
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}
