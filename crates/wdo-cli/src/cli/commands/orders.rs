//! `wdo orders` – list the account's active orders.

use anyhow::Result;
use wdo_core::api::ApiClient;
use wdo_core::config::WdoConfig;

use crate::cli::ApiArgs;

pub fn run_orders(cfg: &WdoConfig, api: &ApiArgs) -> Result<()> {
    let client = ApiClient::new(&api.base_url(cfg), api.credentials(cfg)?)?;
    let list = client.fetch_my_orders()?;
    if list.orders.is_empty() {
        println!("No active orders.");
        return Ok(());
    }
    println!("{:<24} {:<20} {}", "ORDER", "MODEL", "RUNS");
    for o in &list.orders {
        println!(
            "{:<24} {:<20} {}",
            o.order_id,
            o.model_id,
            o.required_latest_runs.join(",")
        );
    }
    Ok(())
}
