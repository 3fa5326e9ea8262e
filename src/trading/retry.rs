use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_retry::{
    strategy::{jitter, ExponentialBackoff},
    RetryIf,
};

use super::account::AccountError;

/// Re-run a whole read-modify-write while it keeps losing the version race.
/// Any other error is returned immediately.
pub async fn retry_on_conflict<F, Fut, T>(
    account_id: &str,
    operation: F,
    max_attempts: usize,
) -> Result<T, AccountError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, AccountError>>,
{
    let max_attempts = max_attempts.max(1);

    // `take` counts retries, the first attempt is free
    let retry_strategy = ExponentialBackoff::from_millis(5)
        .max_delay(Duration::from_millis(200))
        .map(jitter)
        .take(max_attempts - 1);

    let operation = &operation;
    let attempts = &AtomicUsize::new(0);
    let result = RetryIf::spawn(
        retry_strategy,
        move || async move {
            let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
            let outcome = operation().await;
            if let Err(e) = &outcome {
                if e.is_conflict() {
                    tracing::warn!(
                        "Version conflict on account {} (attempt {}/{})",
                        account_id,
                        attempt,
                        max_attempts
                    );
                }
            }
            outcome
        },
        |e: &AccountError| e.is_conflict(),
    )
    .await;

    match result {
        Err(e) if e.is_conflict() => {
            tracing::warn!(
                "Giving up on account {} after {} conflicting attempts",
                account_id,
                max_attempts
            );
            Err(AccountError::RetriesExhausted {
                account_id: account_id.to_string(),
                attempts: max_attempts,
            })
        }
        other => other,
    }
}
