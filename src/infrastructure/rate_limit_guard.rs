use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::Deserialize;

use crate::{
    Clock, GitHubSession, RateLimitBucket, RateLimitCategory, RateLimitError, RateLimitSource,
    RateLimitStatus, StdResult,
};

/// How the guard waits for quota.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// The maximum number of status polls before giving up.
    pub max_attempts: u32,

    /// The delay before polling again after a failed poll.
    pub status_retry_delay: Duration,

    /// The margin added to the reset time before polling again.
    pub reset_margin: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            status_retry_delay: Duration::from_secs(5),
            reset_margin: Duration::from_secs(1),
        }
    }
}

impl RateLimitPolicy {
    /// Computes how long to wait for a bucket to reset.
    pub fn wait_duration(&self, reset_at: DateTime<Utc>, now: DateTime<Utc>) -> Option<Duration> {
        let margin = chrono::Duration::from_std(self.reset_margin).unwrap_or(chrono::Duration::zero());

        (reset_at - now + margin)
            .to_std()
            .ok()
            .filter(|wait| !wait.is_zero())
    }
}

/// Guarantees that a rate limit category has quota left before a call is issued.
pub struct RateLimitGuard {
    source: Arc<dyn RateLimitSource>,
    clock: Arc<dyn Clock>,
    policy: RateLimitPolicy,
}

impl RateLimitGuard {
    /// Creates a new `RateLimitGuard` instance.
    pub fn new(
        source: Arc<dyn RateLimitSource>,
        clock: Arc<dyn Clock>,
        policy: RateLimitPolicy,
    ) -> Self {
        Self {
            source,
            clock,
            policy,
        }
    }

    /// Waits until the category has quota left, or fails after the policy's attempts.
    pub async fn ensure_available(&self, category: RateLimitCategory) -> Result<(), RateLimitError> {
        for attempt in 1..=self.policy.max_attempts {
            let bucket = match self.source.status().await {
                Ok(status) => status.bucket(category).cloned(),
                Err(e) => {
                    warn!("Rate limit status poll #{attempt} failed: {e}");
                    None
                }
            };
            let Some(bucket) = bucket else {
                warn!("Unable to fetch {category} rate limit, retrying");
                self.clock.sleep(self.policy.status_retry_delay).await;
                continue;
            };
            if !bucket.is_exhausted() {
                debug!("Rate limit {category}: {bucket}");
                return Ok(());
            }
            if let Some(wait) = self.policy.wait_duration(bucket.reset_at, self.clock.now()) {
                warn!(
                    "{category} rate limit exceeded, waiting {} seconds",
                    wait.as_secs()
                );
                self.clock.sleep(wait).await;
            }
        }

        Err(RateLimitError::Exhausted {
            category,
            attempts: self.policy.max_attempts,
        })
    }
}

#[derive(Deserialize, Debug)]
struct RateLimitPayload {
    resources: HashMap<String, ResourcePayload>,
}

#[derive(Deserialize, Debug)]
struct ResourcePayload {
    limit: u32,
    #[serde(default)]
    used: u32,
    remaining: u32,
    reset: i64,
}

impl TryFrom<ResourcePayload> for RateLimitBucket {
    type Error = anyhow::Error;

    fn try_from(resource: ResourcePayload) -> StdResult<Self> {
        let reset_at = DateTime::from_timestamp(resource.reset, 0)
            .ok_or_else(|| anyhow!("Invalid reset timestamp: {}", resource.reset))?;

        Ok(Self {
            limit: resource.limit,
            used: resource.used,
            remaining: resource.remaining,
            reset_at,
        })
    }
}

/// Reads the GitHub rate limit status endpoint.
pub struct GitHubRateLimitSource {
    session: Arc<GitHubSession>,
}

impl GitHubRateLimitSource {
    /// Creates a new `GitHubRateLimitSource` instance.
    pub fn new(session: Arc<GitHubSession>) -> Self {
        Self { session }
    }
}

#[async_trait::async_trait]
impl RateLimitSource for GitHubRateLimitSource {
    async fn status(&self) -> StdResult<RateLimitStatus> {
        let response = self.session.get("/rate_limit").send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Rate limit status request failed with {status}"));
        }
        let mut payload: RateLimitPayload = response.json().await?;
        let mut buckets = HashMap::new();
        for category in [
            RateLimitCategory::Core,
            RateLimitCategory::Search,
            RateLimitCategory::GraphQl,
        ] {
            if let Some(resource) = payload.resources.remove(category.label()) {
                buckets.insert(category, resource.try_into()?);
            }
        }

        Ok(RateLimitStatus::new(buckets))
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use crate::{FakeClock, MockRateLimitSource};

    use super::*;

    fn guard_with(source: MockRateLimitSource, clock: Arc<FakeClock>) -> RateLimitGuard {
        RateLimitGuard::new(Arc::new(source), clock, RateLimitPolicy::default())
    }

    mod guard {
        use super::*;

        #[tokio::test]
        async fn passes_when_quota_is_left() {
            let clock = Arc::new(FakeClock::default());
            let reset_at = clock.now();
            let source = {
                let mut source = MockRateLimitSource::new();
                source
                    .expect_status()
                    .returning(move || {
                        Ok(RateLimitStatus::single(
                            RateLimitCategory::Search,
                            RateLimitBucket::dummy(10, reset_at),
                        ))
                    })
                    .times(1);

                source
            };

            guard_with(source, clock.clone())
                .ensure_available(RateLimitCategory::Search)
                .await
                .unwrap();

            assert!(clock.sleeps().is_empty());
        }

        #[tokio::test]
        async fn waits_until_reset_plus_margin() {
            let clock = Arc::new(FakeClock::default());
            let reset_at = clock.now() + chrono::Duration::seconds(5);
            let source = {
                let mut source = MockRateLimitSource::new();
                source
                    .expect_status()
                    .returning(move || {
                        Ok(RateLimitStatus::single(
                            RateLimitCategory::Search,
                            RateLimitBucket::dummy(0, reset_at),
                        ))
                    })
                    .times(1);
                source
                    .expect_status()
                    .returning(move || {
                        Ok(RateLimitStatus::single(
                            RateLimitCategory::Search,
                            RateLimitBucket::dummy(30, reset_at),
                        ))
                    })
                    .times(1);

                source
            };

            guard_with(source, clock.clone())
                .ensure_available(RateLimitCategory::Search)
                .await
                .unwrap();

            assert_eq!(vec![Duration::from_secs(6)], clock.sleeps());
        }

        #[tokio::test]
        async fn categories_are_independent() {
            let clock = Arc::new(FakeClock::default());
            let reset_at = clock.now() + chrono::Duration::seconds(60);
            let source = {
                let mut source = MockRateLimitSource::new();
                source
                    .expect_status()
                    .returning(move || {
                        Ok(RateLimitStatus::new(HashMap::from([
                            (RateLimitCategory::Search, RateLimitBucket::dummy(0, reset_at)),
                            (RateLimitCategory::Core, RateLimitBucket::dummy(10, reset_at)),
                        ])))
                    })
                    .times(1);

                source
            };

            guard_with(source, clock.clone())
                .ensure_available(RateLimitCategory::Core)
                .await
                .unwrap();

            assert!(clock.sleeps().is_empty());
        }

        #[tokio::test]
        async fn fails_after_max_attempts_when_status_is_unavailable() {
            let clock = Arc::new(FakeClock::default());
            let source = {
                let mut source = MockRateLimitSource::new();
                source
                    .expect_status()
                    .returning(|| Err(anyhow!("Status endpoint unavailable")))
                    .times(5);

                source
            };

            let error = guard_with(source, clock.clone())
                .ensure_available(RateLimitCategory::Core)
                .await
                .expect_err("Guard should fail after max attempts");

            assert_eq!(
                RateLimitError::Exhausted {
                    category: RateLimitCategory::Core,
                    attempts: 5
                },
                error
            );
            assert_eq!(vec![Duration::from_secs(5); 5], clock.sleeps());
        }

        #[tokio::test]
        async fn fails_when_quota_never_comes_back() {
            let clock = Arc::new(FakeClock::default());
            let source = {
                let mut source = MockRateLimitSource::new();
                source
                    .expect_status()
                    .returning(|| {
                        Ok(RateLimitStatus::single(
                            RateLimitCategory::Search,
                            RateLimitBucket::dummy(0, Utc::now() - chrono::Duration::seconds(1)),
                        ))
                    })
                    .times(5);

                source
            };

            guard_with(source, clock)
                .ensure_available(RateLimitCategory::Search)
                .await
                .expect_err("Guard should fail when quota never resets");
        }
    }

    mod policy {
        use super::*;

        #[test]
        fn wait_duration_adds_margin() {
            let policy = RateLimitPolicy::default();
            let now = Utc::now();

            assert_eq!(
                Some(Duration::from_secs(6)),
                policy.wait_duration(now + chrono::Duration::seconds(5), now)
            );
            assert_eq!(Some(Duration::from_secs(1)), policy.wait_duration(now, now));
            assert_eq!(
                None,
                policy.wait_duration(now - chrono::Duration::seconds(5), now)
            );
        }
    }

    mod github_source {
        use super::*;

        fn rate_limit_json() -> serde_json::Value {
            json!({
                "resources": {
                    "core": { "limit": 5000, "used": 1, "remaining": 4999, "reset": 1735689600 },
                    "search": { "limit": 30, "used": 30, "remaining": 0, "reset": 1735689660 },
                    "graphql": { "limit": 5000, "used": 0, "remaining": 5000, "reset": 1735689600 },
                    "integration_manifest": { "limit": 5000, "used": 0, "remaining": 5000, "reset": 1735689600 }
                },
                "rate": { "limit": 5000, "used": 1, "remaining": 4999, "reset": 1735689600 }
            })
        }

        #[tokio::test]
        async fn reads_every_category() {
            let server = MockServer::start_async().await;
            let mock = server
                .mock_async(|when, then| {
                    when.method(GET).path("/rate_limit");
                    then.status(200).json_body(rate_limit_json());
                })
                .await;
            let session = Arc::new(GitHubSession::try_new(&server.base_url(), None).unwrap());
            let source = GitHubRateLimitSource::new(session);

            let status = source.status().await.unwrap();

            mock.assert_async().await;
            let search = status.bucket(RateLimitCategory::Search).unwrap();
            assert!(search.is_exhausted());
            assert_eq!(
                DateTime::from_timestamp(1735689660, 0).unwrap(),
                search.reset_at
            );
            assert_eq!(
                4999,
                status.bucket(RateLimitCategory::Core).unwrap().remaining
            );
            assert!(status.bucket(RateLimitCategory::GraphQl).is_some());
        }

        #[tokio::test]
        async fn fails_on_server_error() {
            let server = MockServer::start_async().await;
            server
                .mock_async(|when, then| {
                    when.method(GET).path("/rate_limit");
                    then.status(500).body("boom");
                })
                .await;
            let session = Arc::new(GitHubSession::try_new(&server.base_url(), None).unwrap());
            let source = GitHubRateLimitSource::new(session);

            source
                .status()
                .await
                .expect_err("Status should fail on server error");
        }

        #[tokio::test]
        async fn guard_raises_after_five_failed_polls() {
            let server = MockServer::start_async().await;
            let mock = server
                .mock_async(|when, then| {
                    when.method(GET).path("/rate_limit");
                    then.status(500);
                })
                .await;
            let session = Arc::new(GitHubSession::try_new(&server.base_url(), None).unwrap());
            let clock = Arc::new(FakeClock::default());
            let guard = RateLimitGuard::new(
                Arc::new(GitHubRateLimitSource::new(session)),
                clock,
                RateLimitPolicy::default(),
            );

            guard
                .ensure_available(RateLimitCategory::Search)
                .await
                .expect_err("Guard should fail after five failed polls");

            mock.assert_hits_async(5).await;
        }
    }
}
