//! Immutable per-batch settings.
//!
//! Built once from `WdoConfig` plus command-line overrides and handed to every
//! component at construction; nothing reads process-global state.

use std::path::PathBuf;
use std::time::Duration;

use crate::config::WdoConfig;
use crate::retry::RetryPolicy;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("client id and secret, or an API key, must be supplied")]
    MissingCredentials,
    #[error("no orders to download")]
    NoOrders,
    #[error("worker count must be at least 1")]
    InvalidWorkers,
}

/// Authentication mode for the order-delivery API. The two modes are exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    ClientSecret {
        client_id: String,
        client_secret: String,
    },
    ApiKey(String),
}

impl Credentials {
    /// Pick the auth mode from optional inputs. A non-empty API key wins over
    /// the client id/secret pair; the pair needs both halves.
    pub fn resolve(
        client_id: Option<&str>,
        client_secret: Option<&str>,
        api_key: Option<&str>,
    ) -> Result<Self, SettingsError> {
        fn non_empty(v: Option<&str>) -> Option<&str> {
            v.map(str::trim).filter(|s| !s.is_empty())
        }
        if let Some(key) = non_empty(api_key) {
            return Ok(Credentials::ApiKey(key.to_string()));
        }
        match (non_empty(client_id), non_empty(client_secret)) {
            (Some(id), Some(secret)) => Ok(Credentials::ClientSecret {
                client_id: id.to_string(),
                client_secret: secret.to_string(),
            }),
            _ => Err(SettingsError::MissingCredentials),
        }
    }

    /// Request headers carrying these credentials.
    pub fn headers(&self) -> Vec<(&'static str, &str)> {
        match self {
            Credentials::ClientSecret {
                client_id,
                client_secret,
            } => vec![
                ("x-ibm-client-id", client_id.as_str()),
                ("x-ibm-client-secret", client_secret.as_str()),
            ],
            Credentials::ApiKey(key) => vec![("x-api-key", key.as_str())],
        }
    }

    pub fn is_api_key(&self) -> bool {
        matches!(self, Credentials::ApiKey(_))
    }
}

/// How runs are chosen for each order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// Fixed list of two-digit run labels.
    Explicit(Vec<String>),
    /// The model's most recent complete run, deduplicated via the marker file.
    Latest,
}

impl RunMode {
    /// Parse a comma separated run list or the word `latest`. An empty list
    /// falls back to `default_runs`.
    pub fn parse(spec: &str, default_runs: &[String]) -> Self {
        let spec = spec.trim();
        if spec.eq_ignore_ascii_case("latest") {
            return RunMode::Latest;
        }
        let runs: Vec<String> = spec
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(String::from)
            .collect();
        if runs.is_empty() {
            RunMode::Explicit(default_runs.to_vec())
        } else {
            RunMode::Explicit(runs)
        }
    }
}

/// Everything one batch invocation needs.
#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub base_url: String,
    pub credentials: Credentials,
    /// Order ids, lower-cased.
    pub orders: Vec<String>,
    pub run_mode: RunMode,
    pub workers: usize,
    /// Base folder holding `downloaded/`, `latest/`, `results/` and `failures/`.
    pub root: PathBuf,
    /// Prefix run folders with the order's start time (`YYYYMMDDhhmm_RR`).
    pub folder_date: bool,
    /// Concatenate each run's files into one after the order completes.
    pub join_files: bool,
    /// Cooldown before the bulk retry pass; `None` disables retrying.
    pub retry_cooldown: Option<Duration>,
    pub files_per_order: usize,
    pub guid_file_names: bool,
    pub chunk_size: usize,
    pub model_runs_retry: RetryPolicy,
    /// Single-step interactive mode; forces one worker.
    pub debug: bool,
}

impl BatchSettings {
    /// Settings seeded from the config file. Callers override fields afterwards.
    pub fn from_config(
        cfg: &WdoConfig,
        credentials: Credentials,
        orders: &[String],
    ) -> Result<Self, SettingsError> {
        let orders: Vec<String> = orders
            .iter()
            .map(|o| o.trim().to_lowercase())
            .filter(|o| !o.is_empty())
            .collect();
        if orders.is_empty() {
            return Err(SettingsError::NoOrders);
        }
        if cfg.workers == 0 {
            return Err(SettingsError::InvalidWorkers);
        }
        let model_runs_retry = cfg
            .model_runs_retry
            .as_ref()
            .map(|r| RetryPolicy::fixed(r.attempts, Duration::from_secs(r.backoff_secs)))
            .unwrap_or_default();
        Ok(Self {
            base_url: cfg.base_url.clone(),
            credentials,
            orders,
            run_mode: RunMode::Explicit(cfg.default_runs.clone()),
            workers: cfg.workers,
            root: cfg.location.clone().unwrap_or_else(|| PathBuf::from(".")),
            folder_date: false,
            join_files: false,
            retry_cooldown: None,
            files_per_order: cfg.files_per_order,
            guid_file_names: cfg.guid_file_names,
            chunk_size: cfg.chunk_size,
            model_runs_retry,
            debug: false,
        })
    }

    /// Worker count actually used by the pool.
    pub fn effective_workers(&self) -> usize {
        if self.debug {
            1
        } else {
            self.workers.max(1)
        }
    }
}
