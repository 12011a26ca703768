//! `wdo fetch` – download a batch of orders.

use std::time::Duration;

use anyhow::Result;
use wdo_core::batch::{Batch, BatchOutcome, OrderStatus};
use wdo_core::config::WdoConfig;
use wdo_core::settings::{BatchSettings, RunMode, SettingsError};

use crate::cli::FetchArgs;

/// Merge config file defaults with the command line.
pub(crate) fn settings_from_args(cfg: &WdoConfig, args: &FetchArgs) -> Result<BatchSettings> {
    let credentials = args.api.credentials(cfg)?;
    let mut s = BatchSettings::from_config(cfg, credentials, &args.orders)?;
    s.base_url = args.api.base_url(cfg);
    s.run_mode = RunMode::parse(&args.runs, &cfg.default_runs);
    if let Some(workers) = args.workers {
        if workers == 0 {
            return Err(SettingsError::InvalidWorkers.into());
        }
        s.workers = workers;
    }
    if let Some(location) = &args.location {
        s.root = location.clone();
    }
    if let Some(n) = args.files_per_order {
        s.files_per_order = n;
    }
    s.folder_date = args.folder_date;
    s.join_files = args.join;
    s.debug = args.debug;
    s.guid_file_names |= args.guid_file_names;
    s.retry_cooldown = args
        .retry
        .then(|| Duration::from_secs(args.retry_period.unwrap_or(cfg.retry_period_secs)));
    Ok(s)
}

pub fn run_fetch(cfg: &WdoConfig, args: &FetchArgs) -> Result<()> {
    let settings = settings_from_args(cfg, args)?;
    tracing::info!(
        orders = ?settings.orders,
        runs = ?settings.run_mode,
        workers = settings.effective_workers(),
        root = %settings.root.display(),
        "fetch"
    );
    let outcome = Batch::new(settings)?.run()?;
    print_outcome(&outcome);
    Ok(())
}

fn print_outcome(outcome: &BatchOutcome) {
    println!("{:<24} {:<10} {:<8} {}", "ORDER", "STATUS", "FILES", "FAILED");
    for o in &outcome.orders {
        let (status, files, failed) = match &o.status {
            OrderStatus::Downloaded { files, failed } => {
                ("done".to_string(), files.to_string(), failed.to_string())
            }
            OrderStatus::NoFiles => ("no-files".to_string(), "0".into(), "-".into()),
            OrderStatus::NotFound => ("not-found".to_string(), "-".into(), "-".into()),
            OrderStatus::Skipped(reason) => {
                tracing::debug!(order_id = %o.order_id, "skipped: {}", reason);
                ("skipped".to_string(), "-".into(), "-".into())
            }
        };
        println!("{:<24} {:<10} {:<8} {}", o.order_id, status, files, failed);
        if let Some(path) = &o.failures {
            println!("  failures: {}", path.display());
        }
    }
    if let Some(retry) = &outcome.retry {
        println!(
            "Retry: {} recovered, {} still in error",
            retry.recovered.len(),
            retry.still_in_error.len()
        );
        for e in &retry.still_in_error {
            println!("  {}", e.url);
        }
    }
}
