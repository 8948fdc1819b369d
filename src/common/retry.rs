// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Bounded exponential backoff. `retries` counts attempts after the first one.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub retries: usize,
    pub initial_delay: Duration,
}

impl RetryPolicy {
    pub const fn new(retries: usize, initial_delay: Duration) -> Self {
        Self {
            retries,
            initial_delay,
        }
    }

    pub const fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn attempts(&self) -> usize {
        self.retries.saturating_add(1)
    }
}

/// Retry an async operation with exponential backoff.
pub async fn retry_async<F, Fut, T, E>(op: F, policy: RetryPolicy) -> Result<T, E>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    retry_async_if(op, policy, |_| true).await
}

/// Like [`retry_async`], but gives up immediately on errors `transient` rejects.
pub async fn retry_async_if<F, Fut, T, E, P>(
    mut op: F,
    policy: RetryPolicy,
    transient: P,
) -> Result<T, E>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let attempts = policy.attempts();
    let mut delay = policy.initial_delay;
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(v) => return Ok(v),
            Err(e) if attempt < attempts && transient(&e) => {
                tracing::debug!(target: "retry", attempt, "Transient failure; backing off");
                sleep(delay).await;
                delay = delay.saturating_mul(2);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn retries_until_success() {
        let counter = AtomicUsize::new(0);
        let res: Result<u32, ()> = retry_async(
            |_| {
                let current = counter.fetch_add(1, Ordering::Relaxed);
                async move { if current < 2 { Err(()) } else { Ok(7) } }
            },
            RetryPolicy::new(2, Duration::from_millis(1)),
        )
        .await;

        assert_eq!(res, Ok(7));
        assert_eq!(counter.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn gives_up_after_bounded_retries() {
        let counter = AtomicUsize::new(0);
        let res: Result<u32, &str> = retry_async(
            |_| {
                counter.fetch_add(1, Ordering::Relaxed);
                async { Err("down") }
            },
            RetryPolicy::new(2, Duration::from_millis(1)),
        )
        .await;

        assert_eq!(res, Err("down"));
        assert_eq!(counter.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let counter = AtomicUsize::new(0);
        let res: Result<u32, u16> = retry_async_if(
            |_| {
                counter.fetch_add(1, Ordering::Relaxed);
                async { Err(400) }
            },
            RetryPolicy::new(2, Duration::from_millis(1)),
            |status| *status >= 500,
        )
        .await;

        assert_eq!(res, Err(400));
        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }
}
