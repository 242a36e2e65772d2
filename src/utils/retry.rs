use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::config::Config;

/// How often a failed database call is re-attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl From<&Config> for RetryPolicy {
    fn from(config: &Config) -> Self {
        Self {
            attempts: config.db_retry_attempts,
            delay: Duration::from_millis(config.db_retry_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// Same policy without retries, for statements that must not run twice.
    pub fn single_attempt(self) -> Self {
        Self {
            attempts: 1,
            ..self
        }
    }
}

/// Connection-level failures; constraint violations and missing rows are final.
pub fn is_transient(e: &sqlx::Error) -> bool {
    matches!(
        e,
        sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::Protocol(_)
            | sqlx::Error::WorkerCrashed
    )
}

/// Runs `op` until it succeeds, fails permanently, or `policy.attempts` is spent.
pub async fn with_retry<T, F, Fut>(
    policy: RetryPolicy,
    operation: &str,
    mut op: F,
) -> Result<T, sqlx::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts && is_transient(&e) => {
                warn!(operation, attempt, error = %e, "Transient database error, retrying");
                actix_web::rt::time::sleep(policy.delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn instant(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            delay: Duration::ZERO,
        }
    }

    #[actix_web::test]
    async fn retries_transient_failures_until_success() {
        let calls = Cell::new(0);
        let result = with_retry(instant(3), "flaky", || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                if n < 3 {
                    Err(sqlx::Error::PoolTimedOut)
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.get(), 3);
    }

    #[actix_web::test]
    async fn gives_up_after_budget() {
        let calls = Cell::new(0);
        let result: Result<(), _> = with_retry(instant(2), "down", || {
            calls.set(calls.get() + 1);
            async { Err(sqlx::Error::PoolTimedOut) }
        })
        .await;

        assert!(matches!(result, Err(sqlx::Error::PoolTimedOut)));
        assert_eq!(calls.get(), 2);
    }

    #[actix_web::test]
    async fn permanent_errors_are_not_retried() {
        let calls = Cell::new(0);
        let result: Result<(), _> = with_retry(instant(5), "missing", || {
            calls.set(calls.get() + 1);
            async { Err(sqlx::Error::RowNotFound) }
        })
        .await;

        assert!(matches!(result, Err(sqlx::Error::RowNotFound)));
        assert_eq!(calls.get(), 1);
    }

    #[actix_web::test]
    async fn single_attempt_never_replays_writes() {
        let calls = Cell::new(0);
        let result: Result<(), _> = with_retry(instant(5).single_attempt(), "insert", || {
            calls.set(calls.get() + 1);
            async { Err(sqlx::Error::PoolTimedOut) }
        })
        .await;

        assert!(matches!(result, Err(sqlx::Error::PoolTimedOut)));
        assert_eq!(calls.get(), 1);
        assert_eq!(instant(5).single_attempt().delay, Duration::ZERO);
    }

    #[actix_web::test]
    async fn zero_attempts_still_runs_once() {
        let calls = Cell::new(0);
        let _ = with_retry(instant(0), "once", || {
            calls.set(calls.get() + 1);
            async { Ok::<_, sqlx::Error>(()) }
        })
        .await;
        assert_eq!(calls.get(), 1);
    }
}
