use std::future::Future;
use std::time::Duration;

use tokio::time::error::Elapsed;
use tokio::time::{Instant, timeout_at};

/// An absolute point in time by which a stream operation has to finish.
///
/// Deadlines are computed when an operation starts (see [`Deadline::after`]),
/// so every read or every serialized response gets its own budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deadline {
    /// No bound; the operation may wait forever
    Never,
    At(Instant),
}

impl Deadline {
    /// A deadline `timeout` from now, or [`Deadline::Never`] if that overflows
    pub fn after(timeout: Duration) -> Self {
        Instant::now().checked_add(timeout).map_or(Deadline::Never, Deadline::At)
    }

    pub fn is_expired(&self) -> bool {
        match self {
            Deadline::Never => false,
            Deadline::At(instant) => *instant <= Instant::now(),
        }
    }

    /// Drives `future` to completion unless the deadline passes first
    pub async fn run<F: Future>(self, future: F) -> Result<F::Output, Elapsed> {
        match self {
            Deadline::Never => Ok(future.await),
            Deadline::At(instant) => timeout_at(instant, future).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn elapses_at_instant() {
        let deadline = Deadline::after(Duration::from_millis(100));
        assert!(!deadline.is_expired());

        let result = deadline.run(tokio::time::sleep(Duration::from_secs(1))).await;
        assert!(result.is_err());
        assert!(deadline.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn never_waits() {
        let result = Deadline::Never.run(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            7
        });
        assert_eq!(result.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn overflow_means_never() {
        assert_eq!(Deadline::after(Duration::MAX), Deadline::Never);
    }
}
