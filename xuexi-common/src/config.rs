//! Configuration loading and config file resolution
//!
//! Config file resolution follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. OS-dependent default (`~/.config/xuexi/xuexi.toml` on Linux)
//! 4. `./xuexi.toml` when no config directory can be determined
//!
//! A missing config file is not an error: the runner starts with defaults
//! and logs a warning.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "XUEXI_CONFIG";

/// Default HTTP listen address
pub const DEFAULT_LISTEN: &str = "127.0.0.1:8000";

/// Default package launched after a device is bound
pub const DEFAULT_APP_PACKAGE: &str = "cn.xuexi.android";

/// Default length of one stage time unit, in milliseconds
pub const DEFAULT_TIME_UNIT_MS: u64 = 1000;

/// Runner configuration as stored on disk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// HTTP listen address (e.g. "127.0.0.1:8000")
    pub listen: Option<String>,
    /// API key for the assisted-answering service
    pub api_key: Option<String>,
    /// Directory where processed crops are saved; evidence is skipped when unset
    pub evidence_dir: Option<PathBuf>,
    /// Length of one stage time unit in milliseconds
    pub time_unit_ms: Option<u64>,
    /// Path to the adb binary (defaults to `adb` on PATH)
    pub adb_path: Option<PathBuf>,
    /// Android package launched after bind
    pub app_package: Option<String>,
    /// Assisted-answering service settings
    pub oracle: OracleConfig,
    /// Recognition pipeline agent settings
    pub pipeline: PipelineConfig,
    /// Logging settings
    pub logging: LoggingConfig,
}

/// Assisted-answering service settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Chat-completions endpoint URL
    pub endpoint: Option<String>,
    /// Vision model identifier
    pub model: Option<String>,
}

/// Recognition pipeline agent settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Base URL of the pipeline agent (e.g. "http://127.0.0.1:8011")
    pub endpoint: Option<String>,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is not set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl TomlConfig {
    /// Listen address, falling back to [`DEFAULT_LISTEN`]
    pub fn listen_addr(&self) -> &str {
        self.listen.as_deref().unwrap_or(DEFAULT_LISTEN)
    }

    /// App package, falling back to [`DEFAULT_APP_PACKAGE`]
    pub fn app_package(&self) -> &str {
        self.app_package.as_deref().unwrap_or(DEFAULT_APP_PACKAGE)
    }

    /// Time unit in milliseconds; zero is treated as unset
    pub fn time_unit_ms(&self) -> u64 {
        match self.time_unit_ms {
            Some(ms) if ms > 0 => ms,
            _ => DEFAULT_TIME_UNIT_MS,
        }
    }
}

/// Resolve the config file path
///
/// # Arguments
/// * `cli_arg` - Path given on the command line, if any
/// * `env_var_name` - Environment variable consulted second
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3/4: platform default
    default_config_path()
}

/// Get the OS-dependent default config file path
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("xuexi").join("xuexi.toml"))
        .unwrap_or_else(|| PathBuf::from("./xuexi.toml"))
}

/// Load TOML config from `path`
///
/// A missing file yields the default config (with a warning). A file that
/// exists but does not parse is an error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)?;
    debug!("Loaded config from {}", path.display());
    Ok(config)
}

/// Write TOML config atomically (temp file + rename)
///
/// Parent directories are created when missing.
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let content = toml::to_string_pretty(config)?;
    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;

    // The file may hold an API key
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))?;
    }

    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
