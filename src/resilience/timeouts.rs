//! Timeout enforcement.
//!
//! # Responsibilities
//! - Race a guarded call against its deadline
//! - Drop (cancel) the call when the deadline wins
//!
//! # Design Decisions
//! - Uses Tokio's timer facilities
//! - The deadline is polled first, so a call that completes in the same instant the
//!   deadline fires is still a timeout
//! - Timeout errors are distinct from operation errors

use std::future::Future;
use std::time::Duration;

/// The deadline fired before the call completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elapsed {
    pub after: Duration,
}

/// Run `call`, bounded by `limit` when one is set.
pub async fn with_timeout<F>(limit: Option<Duration>, call: F) -> Result<F::Output, Elapsed>
where
    F: Future,
{
    let Some(limit) = limit else {
        return Ok(call.await);
    };

    tokio::select! {
        biased;
        _ = tokio::time::sleep(limit) => Err(Elapsed { after: limit }),
        output = call => Ok(output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_no_limit_waits_for_completion() {
        let result = with_timeout(None, async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            7
        })
        .await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test]
    async fn test_fast_call_wins() {
        let result = with_timeout(Some(Duration::from_millis(200)), async { "done" }).await;
        assert_eq!(result, Ok("done"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_wins_a_tie() {
        let limit = Duration::from_millis(50);
        let result = with_timeout(Some(limit), async move {
            tokio::time::sleep(limit).await;
            "done"
        })
        .await;
        assert_eq!(result, Err(Elapsed { after: limit }));
    }

    #[tokio::test]
    async fn test_slow_call_times_out() {
        let start = Instant::now();
        let result = with_timeout(Some(Duration::from_millis(30)), async {
            tokio::time::sleep(Duration::from_millis(500)).await;
        })
        .await;
        assert_eq!(result, Err(Elapsed { after: Duration::from_millis(30) }));
        assert!(start.elapsed() < Duration::from_millis(400));
    }
}
