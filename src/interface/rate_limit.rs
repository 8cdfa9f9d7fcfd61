use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::{RateLimitStatus, StdResult};

/// A trait for reading the remote rate limit state.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RateLimitSource: Sync + Send {
    /// Polls the current rate limit status.
    async fn status(&self) -> StdResult<RateLimitStatus>;
}

/// A source of time and suspension.
#[async_trait::async_trait]
pub trait Clock: Sync + Send {
    /// The current time.
    fn now(&self) -> DateTime<Utc>;

    /// Suspends the caller for the given duration.
    async fn sleep(&self, duration: Duration);
}
