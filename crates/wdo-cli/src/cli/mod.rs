//! CLI for the weather order downloader.

mod commands;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use wdo_core::config::{self, WdoConfig};
use wdo_core::settings::Credentials;

use commands::{run_fetch, run_orders, run_runs};

/// Top-level CLI for the weather order downloader.
#[derive(Debug, Parser)]
#[command(name = "wdo")]
#[command(about = "WDO: bulk downloader for weather-model data orders", long_about = None)]
pub struct Cli {
    /// Also print progress to the console.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download the files of one or more orders.
    Fetch(FetchArgs),

    /// List the active orders of this account.
    Orders {
        #[command(flatten)]
        api: ApiArgs,
    },

    /// Show the latest complete run of each model.
    Runs {
        /// Model identifiers, e.g. mo-global.
        #[arg(required = true)]
        models: Vec<String>,

        #[command(flatten)]
        api: ApiArgs,
    },
}

/// Endpoint and credentials. Flags and environment override the config file.
#[derive(Debug, Clone, Args)]
pub struct ApiArgs {
    /// Base URL of the order-delivery API.
    #[arg(short = 'u', long = "url", value_name = "URL")]
    pub base_url: Option<String>,

    /// Client id (paired with --secret).
    #[arg(short = 'c', long = "client", env = "WDO_CLIENT_ID", hide_env_values = true)]
    pub client_id: Option<String>,

    /// Client secret (paired with --client).
    #[arg(short = 's', long = "secret", env = "WDO_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// API key; takes precedence over the client id/secret pair.
    #[arg(short = 'k', long = "apikey", env = "WDO_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
}

impl ApiArgs {
    pub fn base_url(&self, cfg: &WdoConfig) -> String {
        self.base_url.clone().unwrap_or_else(|| cfg.base_url.clone())
    }

    pub fn credentials(&self, cfg: &WdoConfig) -> Result<Credentials> {
        let auth = cfg.auth.clone().unwrap_or_default();
        let pick = |flag: &Option<String>, stored: Option<String>| flag.clone().or(stored);
        let client_id = pick(&self.client_id, auth.client_id);
        let client_secret = pick(&self.client_secret, auth.client_secret);
        let api_key = pick(&self.api_key, auth.api_key);
        Ok(Credentials::resolve(
            client_id.as_deref(),
            client_secret.as_deref(),
            api_key.as_deref(),
        )?)
    }
}

#[derive(Debug, Clone, Args)]
pub struct FetchArgs {
    /// Comma-separated order ids.
    #[arg(short, long, value_delimiter = ',', required = true)]
    pub orders: Vec<String>,

    /// Comma-separated runs (e.g. 00,12), or "latest". Empty means 00,06,12,18.
    #[arg(short, long, default_value = "")]
    pub runs: String,

    /// Number of download workers.
    #[arg(short, long, value_name = "N")]
    pub workers: Option<usize>,

    /// Root folder for downloads and reports.
    #[arg(short, long, value_name = "DIR")]
    pub location: Option<PathBuf>,

    /// Join each run's files into a single file.
    #[arg(short, long)]
    pub join: bool,

    /// Put run folders under a folder named after the processing time.
    #[arg(short = 'd', long = "folderdate")]
    pub folder_date: bool,

    /// Retry failed files once after the batch.
    #[arg(short = 'a', long)]
    pub retry: bool,

    /// Seconds to wait before retrying.
    #[arg(short = 'p', long, value_name = "SECS")]
    pub retry_period: Option<u64>,

    /// Step through files one at a time (single worker).
    #[arg(short = 'z', long)]
    pub debug: bool,

    /// Download at most N files per run (0 = all).
    #[arg(long, value_name = "N")]
    pub files_per_order: Option<usize>,

    /// Name downloaded files with random UUIDs.
    #[arg(long)]
    pub guid_file_names: bool,

    #[command(flatten)]
    pub api: ApiArgs,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg.redacted());

        match self.command {
            CliCommand::Fetch(args) => run_fetch(&cfg, &args)?,
            CliCommand::Orders { api } => run_orders(&cfg, &api)?,
            CliCommand::Runs { models, api } => run_runs(&cfg, &api, &models)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
