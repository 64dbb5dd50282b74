//! Retry policy for flaky external commands.
//!
//! Network-facing operations (package index refresh, git fetch) fail
//! transiently on CI hosts. The policy retries with linear backoff and, once
//! the guarded attempts are exhausted, performs one last invocation whose
//! error is surfaced to the caller unchanged.

use anyhow::Result;
use std::time::Duration;
use tracing::warn;

/// Linear-backoff retry policy for external commands.
///
/// After a failed attempt `i` (1-based) the policy sleeps `base_delay * i`
/// before trying again. A command that keeps failing is invoked
/// `max_retries + 1` times in total; the error of the final invocation is the
/// one returned.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Number of guarded attempts before the final unguarded invocation.
    max_retries: u32,
    /// Backoff unit; attempt `i` sleeps `base_delay * i` after failing.
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 10,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with explicit bounds.
    #[must_use]
    pub const fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Backoff delay applied after the given failed attempt (1-based).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }

    /// Run `op` under this policy, sleeping between failed attempts.
    ///
    /// # Errors
    ///
    /// Returns the error of the final invocation after all attempts failed.
    pub fn run<T>(&self, op: impl FnMut() -> Result<T>) -> Result<T> {
        self.run_while(op, |_| true)
    }

    /// Run `op`, retrying only while `should_retry` approves the error.
    ///
    /// Failures the caller knows to be permanent (bad credentials, missing
    /// refs) are returned immediately instead of burning the whole backoff
    /// budget.
    ///
    /// # Errors
    ///
    /// Returns the first non-retryable error, or the error of the final
    /// invocation after all attempts failed.
    pub fn run_while<T>(
        &self,
        op: impl FnMut() -> Result<T>,
        should_retry: impl Fn(&anyhow::Error) -> bool,
    ) -> Result<T> {
        self.run_with_sleeper(op, should_retry, std::thread::sleep)
    }

    /// Like [`Self::run_while`] but with an injectable sleeper so tests can
    /// observe backoff without waiting.
    pub(crate) fn run_with_sleeper<T>(
        &self,
        mut op: impl FnMut() -> Result<T>,
        should_retry: impl Fn(&anyhow::Error) -> bool,
        mut sleep: impl FnMut(Duration),
    ) -> Result<T> {
        for attempt in 1..=self.max_retries {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if should_retry(&e) => {
                    warn!(attempt, "command failed, will retry: {e:#}");
                    sleep(self.backoff(attempt));
                }
                Err(e) => return Err(e),
            }
        }

        // Final attempt runs unguarded so its error reaches the caller.
        op()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(10, Duration::from_secs(1))
    }

    #[test]
    fn test_success_on_first_attempt_never_sleeps() {
        let mut invocations = 0;
        let mut sleeps = Vec::new();

        let result = policy().run_with_sleeper(
            || {
                invocations += 1;
                Ok(42)
            },
            |_| true,
            |d| sleeps.push(d),
        );

        assert_eq!(result.unwrap(), 42);
        assert_eq!(invocations, 1);
        assert!(sleeps.is_empty());
    }

    #[test]
    fn test_k_failures_then_success() {
        let k = 4;
        let mut invocations = 0;
        let mut sleeps = Vec::new();

        let result = policy().run_with_sleeper(
            || {
                invocations += 1;
                if invocations <= k {
                    Err(anyhow!("transient"))
                } else {
                    Ok(())
                }
            },
            |_| true,
            |d| sleeps.push(d),
        );

        assert!(result.is_ok());
        assert_eq!(invocations, k + 1);
        // Linear backoff: 1 + 2 + 3 + 4 seconds slept in total
        let total: Duration = sleeps.iter().sum();
        assert_eq!(total, Duration::from_secs(10));
        assert_eq!(sleeps.len(), k as usize);
    }

    #[test]
    fn test_persistent_failure_runs_eleven_times() {
        let mut invocations = 0u32;
        let mut sleeps = Vec::new();

        let result: Result<()> = policy().run_with_sleeper(
            || {
                invocations += 1;
                Err(anyhow!("broken #{invocations}"))
            },
            |_| true,
            |d| sleeps.push(d),
        );

        // 10 guarded retries plus the final unguarded invocation
        assert_eq!(invocations, 11);
        assert_eq!(sleeps.len(), 10);
        let err = result.unwrap_err();
        assert!(err.to_string().contains("broken #11"));
    }

    #[test]
    fn test_non_retryable_error_short_circuits() {
        let mut invocations = 0u32;
        let mut sleeps = Vec::new();

        let result: Result<()> = policy().run_with_sleeper(
            || {
                invocations += 1;
                Err(anyhow!("bad credentials"))
            },
            |err| !err.to_string().contains("credentials"),
            |d| sleeps.push(d),
        );

        // Permanent failures skip the backoff loop entirely
        assert_eq!(invocations, 1);
        assert!(sleeps.is_empty());
        assert!(result.unwrap_err().to_string().contains("bad credentials"));
    }

    #[test]
    fn test_backoff_is_linear() {
        let p = RetryPolicy::new(3, Duration::from_millis(100));
        assert_eq!(p.backoff(1), Duration::from_millis(100));
        assert_eq!(p.backoff(2), Duration::from_millis(200));
        assert_eq!(p.backoff(3), Duration::from_millis(300));
    }
}
