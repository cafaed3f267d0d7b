//! Fixed-interval polling of a remote resource towards a terminal state.
//!
//! The remote state machines here move slowly (a volume backup can take
//! minutes), so the poll loop deliberately uses a plain fixed sleep with no
//! backoff or jitter. By default the wait is unbounded, matching the
//! operational expectation that the backend eventually settles; a timeout can
//! be layered on without changing call sites.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{Instant, sleep};

use crate::backend::BackupStatus;

/// How a poll loop ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PollOutcome {
    /// The resource reached a terminal status.
    Settled(BackupStatus),
    /// The resource no longer exists. The deletion path relies on this,
    /// since a successfully deleted backup becomes unfetchable.
    Gone,
}

/// Errors raised while polling.
#[derive(Debug, Error)]
pub enum PollError<E>
where
    E: std::error::Error + 'static,
{
    /// A status fetch failed.
    #[error("status fetch failed: {0}")]
    Backend(#[source] E),
    /// The configured timeout elapsed before a terminal status was observed.
    #[error("resource did not settle within {waited:?}")]
    Timeout {
        /// Configured maximum wait.
        waited: Duration,
    },
}

/// Drives a resource through its remote state machine by repeated status
/// queries at a fixed interval.
#[derive(Clone, Copy, Debug)]
pub struct Poller {
    interval: Duration,
    timeout: Option<Duration>,
}

impl Poller {
    /// Creates an unbounded poller with the given fixed interval.
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            timeout: None,
        }
    }

    /// Bounds the total wait. Loops that exceed it fail with
    /// [`PollError::Timeout`] instead of sleeping again.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Repeatedly invokes `fetch` until the returned status satisfies
    /// `is_terminal`, or the resource disappears (`fetch` returns `None`).
    ///
    /// The terminal check happens before any sleep, so a loop that observes
    /// `k` non-terminal statuses performs exactly `k + 1` fetches. One debug
    /// observation is emitted per non-terminal iteration.
    ///
    /// # Errors
    ///
    /// Returns [`PollError::Backend`] when a fetch fails and
    /// [`PollError::Timeout`] when a configured timeout elapses.
    pub async fn wait<F, Fut, E, P>(
        &self,
        resource_id: &str,
        mut fetch: F,
        is_terminal: P,
    ) -> Result<PollOutcome, PollError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<BackupStatus>, E>>,
        E: std::error::Error + 'static,
        P: Fn(BackupStatus) -> bool,
    {
        let deadline = self.timeout.map(|timeout| Instant::now() + timeout);

        loop {
            match fetch().await.map_err(PollError::Backend)? {
                None => return Ok(PollOutcome::Gone),
                Some(status) if is_terminal(status) => {
                    return Ok(PollOutcome::Settled(status));
                }
                Some(status) => {
                    tracing::debug!(%resource_id, %status, "waiting for terminal status");
                }
            }

            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Err(PollError::Timeout {
                        waited: self.timeout.unwrap_or_default(),
                    });
                }
            }

            sleep(self.interval).await;
        }
    }
}
