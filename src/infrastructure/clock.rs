use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::Clock;

/// A clock backed by the system time and the Tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

#[async_trait::async_trait]
impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
pub use fake::FakeClock;


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tokio_clock_sleeps() {
        let clock = TokioClock;
        let before = clock.now();

        clock.sleep(Duration::from_millis(20)).await;

        assert!(clock.now() - before >= chrono::Duration::milliseconds(20));
    }

    #[tokio::test]
    async fn fake_clock_advances_on_sleep() {
        let start = Utc::now();
        let clock = FakeClock::new(start);

        clock.sleep(Duration::from_secs(6)).await;

        assert_eq!(start + chrono::Duration::seconds(6), clock.now());
        assert_eq!(vec![Duration::from_secs(6)], clock.sleeps());
    }
}
