use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Default order-delivery API base URL.
pub const DEFAULT_BASE_URL: &str =
    "https://api-metoffice.apiconnect.ibmcloud.com/metoffice/production/1.0.0";

/// Retry parameters for the model-run metadata fetch (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRunsRetryConfig {
    /// Maximum number of attempts per model (including the first).
    pub attempts: u32,
    /// Fixed delay in seconds between attempts.
    pub backoff_secs: u64,
}

impl Default for ModelRunsRetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_secs: 10,
        }
    }
}

/// Stored credentials (optional section in config.toml). Command-line flags win.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// Global configuration loaded from `~/.config/wdo/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WdoConfig {
    /// Base URL of the order-delivery API.
    pub base_url: String,
    /// Number of download workers per order.
    pub workers: usize,
    /// Cooldown in seconds before the bulk retry pass.
    pub retry_period_secs: u64,
    /// Maximum files per run of an order (0 = unlimited).
    pub files_per_order: usize,
    /// Always name downloaded files with a random UUID instead of the file id.
    pub guid_file_names: bool,
    /// Runs requested when the caller does not name any.
    pub default_runs: Vec<String>,
    /// Read buffer size in bytes for file bodies.
    pub chunk_size: usize,
    /// Base folder for downloads, markers and reports (None = current directory).
    #[serde(default)]
    pub location: Option<PathBuf>,
    /// Optional retry policy for model-run metadata; if missing, built-in defaults are used.
    #[serde(default)]
    pub model_runs_retry: Option<ModelRunsRetryConfig>,
    #[serde(default)]
    pub auth: Option<AuthConfig>,
}

impl Default for WdoConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            workers: 4,
            retry_period_secs: 300,
            files_per_order: 0,
            guid_file_names: false,
            default_runs: ["00", "06", "12", "18"].map(String::from).to_vec(),
            chunk_size: 8192,
            location: None,
            model_runs_retry: None,
            auth: None,
        }
    }
}

impl WdoConfig {
    /// Copy with secrets masked, for logging.
    pub fn redacted(&self) -> Self {
        let mask = |v: &Option<String>| v.as_ref().map(|_| "***".to_string());
        let mut cfg = self.clone();
        if let Some(auth) = cfg.auth.as_mut() {
            auth.client_secret = mask(&auth.client_secret);
            auth.api_key = mask(&auth.api_key);
        }
        cfg
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("wdo")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<WdoConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = WdoConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: WdoConfig = toml::from_str(&data)?;
    Ok(cfg)
}
