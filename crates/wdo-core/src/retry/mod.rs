//! Retry: fixed-backoff retry for metadata calls, and the gated bulk retry
//! pass that runs once after every order of a batch has been downloaded.

mod coordinator;
mod gate;
mod manifest;
mod policy;
mod run;

pub use coordinator::{RecoveredFile, RetryCoordinator, RetryOutcome};
pub use gate::{failure_rate, RetryAborted, RetryGate};
pub use manifest::RetryManifest;
pub use policy::{RetryDecision, RetryPolicy};
pub use run::run_with_retry;
