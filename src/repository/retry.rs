//! Bounded retry for transient store failures.
//!
//! A dropped connection or a busy database retries the whole unit of work.
//! The error is logged once on the first failure rather than once per
//! attempt, and retry exhaustion surfaces the last error to the caller.
//! Logical errors (NotFound, InvalidTransition, ...) are never retried.

use std::future::Future;
use std::time::Duration;

use diesel::result::DatabaseErrorKind;

use super::{DieselError, QueueError, Result};

/// Delay between retry attempts.
const RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// Run `op` up to `attempts` times, retrying transient store failures.
pub async fn with_retry<T, F, Fut>(attempts: u32, what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut logged = false;
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(QueueError::Store(e)) if is_transient(&e) && attempt < attempts => {
                if !logged {
                    tracing::warn!("{what}: transient store failure, retrying: {e}");
                    logged = true;
                }
                tokio::time::sleep(RETRY_BACKOFF).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Whether a store error is worth retrying.
fn is_transient(e: &DieselError) -> bool {
    match e {
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => true,
        DieselError::DatabaseError(_, info) => {
            let msg = info.message();
            msg.contains("database is locked")
                || msg.contains("database table is locked")
                || msg.contains("unable to open database")
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::pool::to_diesel_error;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn transient() -> QueueError {
        QueueError::Store(to_diesel_error("database is locked"))
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = with_retry(3, "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(transient())
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_surfaces_error() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(2, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(transient()) }
        })
        .await;
        assert!(matches!(result, Err(QueueError::Store(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_logical_errors_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(5, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(QueueError::NotFound("file 9".to_string())) }
        })
        .await;
        assert!(matches!(result, Err(QueueError::NotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_transient_classification() {
        assert!(is_transient(&to_diesel_error("database is locked")));
        assert!(!is_transient(&to_diesel_error("syntax error")));
        assert!(!is_transient(&DieselError::NotFound));
    }
}
