//! `wdo runs <model>...` – latest complete run per model.

use anyhow::Result;
use wdo_core::api::ApiClient;
use wdo_core::config::WdoConfig;

use crate::cli::ApiArgs;

pub fn run_runs(cfg: &WdoConfig, api: &ApiArgs, models: &[String]) -> Result<()> {
    let client = ApiClient::new(&api.base_url(cfg), api.credentials(cfg)?)?;
    println!("{:<20} {:<4} {}", "MODEL", "RUN", "RUN TIME");
    for model in models {
        match client.fetch_latest_run(model) {
            Ok(run) => println!("{:<20} {:<4} {}", model, run.run, run.run_date_time),
            Err(e) => {
                tracing::warn!(model = %model, "latest run unavailable: {}", e);
                println!("{:<20} {:<4} {}", model, "-", e);
            }
        }
    }
    Ok(())
}
