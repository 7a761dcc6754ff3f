//! Restart throttling for supervised run loops.
//!
//! A [`RateLimiter`] enforces a minimum interval between the starts of
//! successive run attempts with a burst of one: the first permit is granted
//! immediately, every later permit no sooner than `min_interval` after the
//! previous one was granted. Waiting is cancellable so a supervisor can bail
//! out of the cool-off when shutdown is requested.

use std::time::Duration;

use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("CancellationToken Cancelled")]
    Cancellation,
}

/// Grants permits at most once per `min_interval`, measured from the moment
/// the previous permit was granted (not from when the guarded work finished).
pub struct RateLimiter {
    min_interval: Duration,
    next_permit: Option<Instant>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_permit: None,
        }
    }

    /// Waits until the next permit is due. Returns [`Error::Cancellation`]
    /// if the token fires before the permit is granted, in which case the
    /// permit is not consumed.
    pub async fn wait(&mut self, cancel: &CancellationToken) -> Result<()> {
        if let Some(at) = self.next_permit {
            tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancellation),
                _ = sleep_until(at) => {}
            }
        }
        self.next_permit = Some(Instant::now() + self.min_interval);
        Ok(())
    }
}
