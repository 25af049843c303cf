//! Bounded polling for transient failures.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};

/// Retry `attempt` every `interval` until it succeeds or `budget` elapses,
/// waiting one interval before the first attempt.
///
/// Returns the first success, or the last error once the budget runs out.
pub(crate) async fn poll<T, E, F, Fut>(
    interval: Duration,
    budget: Duration,
    mut attempt: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let deadline = Instant::now() + budget;
    loop {
        sleep(interval).await;
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) if Instant::now() >= deadline => return Err(err),
            Err(_) => {}
        }
    }
}

/// Like [`poll`], but makes the first attempt immediately.
pub(crate) async fn poll_immediate<T, E, F, Fut>(
    interval: Duration,
    budget: Duration,
    mut attempt: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let deadline = Instant::now() + budget;
    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) if Instant::now() + interval >= deadline => return Err(err),
            Err(_) => {}
        }
        sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test]
    async fn test_poll_stops_on_first_success() {
        let attempts = AtomicU32::new(0);

        let result: Result<u32, &str> =
            poll(Duration::from_millis(5), Duration::from_secs(1), || async {
                let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err("not yet")
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result, Ok(3));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_poll_surfaces_last_error_on_exhaustion() {
        let attempts = AtomicU32::new(0);

        let result: Result<(), u32> = poll(
            Duration::from_millis(10),
            Duration::from_millis(50),
            || async { Err(attempts.fetch_add(1, Ordering::SeqCst) + 1) },
        )
        .await;

        let last = result.unwrap_err();
        assert!(last >= 2, "expected more than one attempt, got {last}");
        assert_eq!(last, attempts.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_poll_immediate_tries_before_sleeping() {
        let started = Instant::now();

        let result: Result<(), &str> = poll_immediate(
            Duration::from_secs(5),
            Duration::from_secs(1),
            || async { Err("down") },
        )
        .await;

        // First attempt failed and the next interval would overshoot the
        // budget, so no sleep happened at all.
        assert_eq!(result, Err("down"));
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
