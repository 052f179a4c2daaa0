use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

/// Retries an operation with a fixed backoff, giving up after `retries`
/// consecutive failures.
///
/// The failure count lives in one [`run`](RetryPolicy::run) call, so every
/// success starts the next call from zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    retries: u32,
    backoff: Duration,
}

impl RetryPolicy {
    pub const fn new(retries: u32, backoff: Duration) -> Self {
        Self { retries, backoff }
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Runs `op` until it succeeds or fails `retries` times in a row.
    ///
    /// Sleeps `backoff` after every failure but the last, and returns the last
    /// error once the budget is spent. With zero retries the first error is
    /// returned as is.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut failures = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    failures += 1;
                    if failures >= self.retries {
                        warn!(cause = %e, failures, "retry budget exhausted");
                        return Err(e);
                    }
                    warn!(cause = %e, failures, retries = self.retries, "operation failed, retry after backoff");
                    sleep(self.backoff).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use tokio::time::Instant;

    use super::*;

    const BACKOFF: Duration = Duration::from_secs(5);

    fn flaky(failures: u32) -> impl FnMut() -> std::future::Ready<io::Result<u32>> {
        let mut calls = 0;
        move || {
            calls += 1;
            std::future::ready(if calls <= failures { Err(io::Error::other(format!("failure {calls}"))) } else { Ok(calls) })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_within_budget() {
        let policy = RetryPolicy::new(10, BACKOFF);
        let start = Instant::now();

        let calls = policy.run(flaky(3)).await.unwrap();

        assert_eq!(calls, 4);
        assert!(start.elapsed() >= BACKOFF * 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_budget() {
        let policy = RetryPolicy::new(3, BACKOFF);
        let start = Instant::now();

        let e = policy.run(flaky(u32::MAX)).await.unwrap_err();

        assert_eq!(e.to_string(), "failure 3");
        assert_eq!(start.elapsed(), BACKOFF * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retries_fails_fast() {
        let policy = RetryPolicy::new(0, BACKOFF);
        let start = Instant::now();

        let e = policy.run(flaky(1)).await.unwrap_err();

        assert_eq!(e.to_string(), "failure 1");
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn success_resets_the_count() {
        let policy = RetryPolicy::new(3, BACKOFF);
        let mut outcomes = vec![
            Err(io::Error::other("a")),
            Err(io::Error::other("b")),
            Ok(1),
            Err(io::Error::other("c")),
            Err(io::Error::other("d")),
            Ok(2),
        ]
        .into_iter();
        let mut op = move || std::future::ready(outcomes.next().unwrap_or(Ok(0)));

        assert_eq!(policy.run(&mut op).await.unwrap(), 1);
        assert_eq!(policy.run(&mut op).await.unwrap(), 2);
    }
}
