//! Bounded retry with jittered delays.
//!
//! Each stage owns its own [`RetryPolicy`] so aggressiveness can be tuned per
//! endpoint. A policy never retries more than `max_attempts` times and never
//! retries a not-found answer.

use log::{debug, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use super::ServiceError;

/// Result of running a call under a retry policy
#[derive(Debug)]
pub enum Outcome<T> {
    Done(T),
    /// The service answered that nothing exists for this input
    NotFound,
    /// Every attempt failed, or the failure was not retryable
    Failed(ServiceError),
}

impl<T> Outcome<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            Outcome::Done(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay_min_ms: u64,
    pub delay_max_ms: u64,
    /// Wait a jittered delay before the first attempt too
    pub pace_first_attempt: bool,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay_min: Duration, delay_max: Duration) -> Self {
        Self {
            max_attempts,
            delay_min_ms: delay_min.as_millis() as u64,
            delay_max_ms: delay_max.as_millis() as u64,
            pace_first_attempt: false,
        }
    }

    /// No delays at all; used by tests and by stages paced elsewhere
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, Duration::ZERO)
    }

    pub fn paced(mut self) -> Self {
        self.pace_first_attempt = true;
        self
    }

    /// Publication metadata fetches (burst-sensitive profile endpoint)
    pub fn publication_metadata() -> Self {
        Self::new(3, Duration::from_secs(10), Duration::from_secs(15)).paced()
    }

    /// Citing-paper listings per citation group
    pub fn citation_listing() -> Self {
        Self::new(3, Duration::from_secs(10), Duration::from_secs(15))
    }

    /// Per-author profile lookups
    pub fn author_lookup() -> Self {
        Self::new(3, Duration::from_secs(5), Duration::from_secs(10)).paced()
    }

    /// Name-to-id lookups during reconciliation
    pub fn reconciliation() -> Self {
        Self::new(3, Duration::from_secs(1), Duration::from_secs(3)).paced()
    }

    /// Geocoding; request spacing is enforced by the geocoder itself
    pub fn geocoding() -> Self {
        Self::immediate(3)
    }

    /// Pick a delay uniformly from the configured range
    pub fn jitter(&self) -> Duration {
        if self.delay_max_ms == 0 {
            return Duration::ZERO;
        }
        let low = self.delay_min_ms.min(self.delay_max_ms);
        let millis = rand::thread_rng().gen_range(low..=self.delay_max_ms);
        Duration::from_millis(millis)
    }

    /// Run `op` until it succeeds, reports not-found, fails permanently,
    /// or the attempt budget is spent.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Outcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            if attempt > 1 || self.pace_first_attempt {
                let delay = self.jitter();
                if !delay.is_zero() {
                    sleep(delay).await;
                }
            }

            match op().await {
                Ok(value) => return Outcome::Done(value),
                Err(e) if e.is_not_found() => {
                    debug!("{}: {}", label, e);
                    return Outcome::NotFound;
                }
                Err(e) if !e.is_retryable() || attempt >= attempts => {
                    warn!("{}: giving up after {} attempt(s): {}", label, attempt, e);
                    return Outcome::Failed(e);
                }
                Err(e) => {
                    warn!("{}: attempt {}/{} failed: {}", label, attempt, attempts, e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let outcome = RetryPolicy::immediate(3)
            .run("flaky", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ServiceError::transient("quota"))
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(outcome.ok(), Some(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_attempts_are_bounded() {
        let calls = AtomicU32::new(0);
        let outcome: Outcome<()> = RetryPolicy::immediate(3)
            .run("down", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ServiceError::transient("timeout"))
            })
            .await;

        assert!(matches!(outcome, Outcome::Failed(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let calls = AtomicU32::new(0);
        let outcome: Outcome<()> = RetryPolicy::immediate(5)
            .run("missing", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ServiceError::not_found("author"))
            })
            .await;

        assert!(matches!(outcome, Outcome::NotFound));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_paced_policy_waits_before_first_attempt() {
        let policy = RetryPolicy::new(1, Duration::from_secs(5), Duration::from_secs(10)).paced();
        let start = tokio::time::Instant::now();
        let outcome = policy.run("paced", || async { Ok::<_, ServiceError>(()) }).await;

        assert!(matches!(outcome, Outcome::Done(())));
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let policy = RetryPolicy::new(3, Duration::from_millis(10), Duration::from_millis(20));
        for _ in 0..100 {
            let delay = policy.jitter();
            assert!(delay >= Duration::from_millis(10) && delay <= Duration::from_millis(20));
        }
        assert_eq!(RetryPolicy::immediate(1).jitter(), Duration::ZERO);
    }
}
