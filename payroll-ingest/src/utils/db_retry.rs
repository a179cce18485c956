//! Ledger write retries
//!
//! Concurrent batches share one SQLite writer lock. A write that hits
//! `database is locked` is retried with doubling sleeps until
//! `ingest.max_lock_wait_ms` is spent; any other error returns at once.

use payroll_common::{Error, Result};
use std::future::Future;
use std::time::{Duration, Instant};

const FIRST_BACKOFF: Duration = Duration::from_millis(10);
const MAX_BACKOFF: Duration = Duration::from_secs(1);

/// Run `operation` until it succeeds, fails for a non-lock reason, or the lock wait budget runs out
///
/// Sleeps never extend past the budget.
pub async fn retry_on_lock<F, Fut, T>(what: &str, max_wait_ms: u64, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let deadline = Instant::now() + Duration::from_millis(max_wait_ms);
    let mut backoff = FIRST_BACKOFF;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let err = match operation().await {
            Ok(value) => {
                if attempts > 1 {
                    tracing::debug!(what, attempts, "Ledger write went through after lock contention");
                }
                return Ok(value);
            }
            Err(err) if err.is_database_locked() => err,
            Err(err) => return Err(err),
        };

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            tracing::error!(what, attempts, max_wait_ms, "Ledger still locked, giving up: {}", err);
            return Err(Error::Internal(format!(
                "{}: database locked for {} ms ({} attempts)",
                what, max_wait_ms, attempts
            )));
        }

        let pause = backoff.min(remaining);
        tracing::warn!(what, attempts, pause_ms = pause.as_millis() as u64, "Ledger locked, retrying");
        tokio::time::sleep(pause).await;
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}
