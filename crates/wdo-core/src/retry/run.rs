//! Retry loop: run a closure until success or policy says stop.

use std::fmt::Display;

use super::policy::{RetryDecision, RetryPolicy};

/// Runs a closure until it succeeds or the retry policy says to stop.
/// On failure, logs and sleeps for the policy delay then tries again.
pub fn run_with_retry<T, E, F>(policy: &RetryPolicy, mut f: F) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Result<T, E>,
{
    let mut attempt = 1u32;
    loop {
        match f() {
            Ok(v) => return Ok(v),
            Err(e) => match policy.decide(attempt) {
                RetryDecision::NoRetry => return Err(e),
                RetryDecision::RetryAfter(d) => {
                    tracing::warn!(attempt, "{}; retrying in {:?}", e, d);
                    std::thread::sleep(d);
                    attempt += 1;
                }
            },
        }
    }
}
