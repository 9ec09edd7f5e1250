//! Shared backoff policy.
//!
//! Every retrying call site (HTTP transport, GraphQL, creator-sell polling) describes
//! its schedule with a [`BackoffPolicy`] and runs through [`retry_if`], which drives
//! `tokio-retry` and only retries errors the caller's predicate admits.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_retry::strategy::jitter;
use tokio_retry::RetryIf;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    /// Delay before the first retry
    pub base: Duration,
    /// Growth factor between consecutive delays (1.0 = fixed delay)
    pub multiplier: f64,
    /// Upper bound for any single delay
    pub cap: Duration,
    /// Retries after the initial attempt
    pub max_retries: usize,
    /// Randomize each delay within [0, delay)
    pub jitter: bool,
}

impl BackoffPolicy {
    pub fn fixed(delay: Duration, max_retries: usize) -> Self {
        Self {
            base: delay,
            multiplier: 1.0,
            cap: delay,
            max_retries,
            jitter: false,
        }
    }

    /// HTTP transport: 1s, 2s, 4s (capped at 5s).
    pub fn transport() -> Self {
        Self {
            base: Duration::from_secs(1),
            multiplier: 2.0,
            cap: Duration::from_secs(5),
            max_retries: 3,
            jitter: false,
        }
    }

    /// GraphQL: three attempts, 2s apart.
    pub fn graphql() -> Self {
        Self::fixed(Duration::from_secs(2), 2)
    }

    /// Creator-sell polling: up to three re-queries, 1s apart.
    pub fn creator_poll() -> Self {
        Self::fixed(Duration::from_secs(1), 3)
    }

    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        let policy = self.clone();
        (0..self.max_retries).map(move |i| {
            let factor = policy.multiplier.powi(i as i32);
            let raw = policy.base.mul_f64(factor.max(0.0));
            let capped = raw.min(policy.cap);
            if policy.jitter {
                jitter(capped)
            } else {
                capped
            }
        })
    }
}

/// Run `action` under `policy`, retrying only while `retryable` holds for the error.
pub async fn retry_if<T, E, Fut, A, P>(
    policy: &BackoffPolicy,
    label: &str,
    mut action: A,
    mut retryable: P,
) -> Result<T, E>
where
    A: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: FnMut(&E) -> bool,
    E: std::fmt::Display,
{
    let attempts = AtomicUsize::new(0);
    let max_retries = policy.max_retries;

    RetryIf::start(
        policy.delays(),
        || {
            attempts.fetch_add(1, Ordering::SeqCst);
            action()
        },
        |err: &E| {
            let should_retry = retryable(err);
            let attempt = attempts.load(Ordering::SeqCst);
            if should_retry && attempt <= max_retries {
                warn!(
                    "{} failed (attempt {}/{}): {}. Retrying...",
                    label, attempt, max_retries, err
                );
            }
            should_retry
        },
    )
    .await
}
