//! CLI command handlers, one per file.

mod fetch;
mod orders;
mod runs;

pub use fetch::run_fetch;
pub use orders::run_orders;
pub use runs::run_runs;
