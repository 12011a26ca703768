//! Safety gate in front of the bulk retry pass.
//!
//! A batch with too many failures is not worth retrying: something upstream is
//! broken and hammering it again only makes things worse.

/// Why the retry pass was refused.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RetryAborted {
    #[error("total failures of {failures} is more than the {limit} limit, can't recover")]
    TooManyFailures { failures: usize, limit: usize },
    #[error("everything failed for all {attempted} files")]
    EverythingFailed { attempted: usize },
    #[error("failure rate {rate:.1}% with {failures} failures is above the retry threshold")]
    FailureRateTooHigh { failures: usize, rate: f64 },
}

/// Thresholds checked before any retry attempt.
#[derive(Debug, Clone, Copy)]
pub struct RetryGate {
    /// More failures than this aborts outright.
    pub max_failures: usize,
    /// Failure rate (percent) above which `rate_min_failures` applies.
    pub max_rate_percent: f64,
    /// Failure count that, together with the rate, aborts.
    pub rate_min_failures: usize,
}

impl Default for RetryGate {
    fn default() -> Self {
        Self {
            max_failures: 100,
            max_rate_percent: 50.0,
            rate_min_failures: 50,
        }
    }
}

/// Failure rate in percent; an empty batch counts as total failure.
pub fn failure_rate(failures: usize, attempted: usize) -> f64 {
    if attempted == 0 {
        return 100.0;
    }
    failures as f64 / attempted as f64 * 100.0
}

impl RetryGate {
    pub fn check(&self, failures: usize, attempted: usize) -> Result<(), RetryAborted> {
        if failures > self.max_failures {
            return Err(RetryAborted::TooManyFailures {
                failures,
                limit: self.max_failures,
            });
        }
        if failures >= attempted {
            return Err(RetryAborted::EverythingFailed { attempted });
        }
        let rate = failure_rate(failures, attempted);
        if rate > self.max_rate_percent && failures > self.rate_min_failures {
            return Err(RetryAborted::FailureRateTooHigh { failures, rate });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn over_one_hundred_failures_aborts() {
        let gate = RetryGate::default();
        assert_eq!(
            gate.check(101, 200),
            Err(RetryAborted::TooManyFailures {
                failures: 101,
                limit: 100
            })
        );
        assert!(gate.check(100, 1000).is_ok());
    }

    #[test]
    fn complete_failure_aborts() {
        let gate = RetryGate::default();
        assert_eq!(
            gate.check(4, 4),
            Err(RetryAborted::EverythingFailed { attempted: 4 })
        );
    }

    #[test]
    fn high_rate_with_many_failures_aborts() {
        let gate = RetryGate::default();
        assert!(matches!(
            gate.check(60, 100),
            Err(RetryAborted::FailureRateTooHigh { failures: 60, .. })
        ));
    }

    #[test]
    fn high_rate_with_few_failures_is_allowed() {
        let gate = RetryGate::default();
        // 83% but only 50 failures.
        assert!(gate.check(50, 60).is_ok());
        assert!(gate.check(1, 10).is_ok());
        // 51 failures at exactly 50% is not above the rate.
        assert!(gate.check(51, 102).is_ok());
    }

    #[test]
    fn failure_rate_values() {
        assert_eq!(failure_rate(1, 10), 10.0);
        assert_eq!(failure_rate(0, 0), 100.0);
    }
}
