use std::{future::Future, time::Duration};

use sea_orm::DbErr;

const MAX_RETRIES: usize = 3;
const INITIAL_BACKOFF_MS: u64 = 50;
const MAX_BACKOFF_MS: u64 = 1_000;

/// Reruns `op` while SQLite reports the database as locked or busy.
///
/// `op` must be safe to repeat from the start, which in practice means it
/// opens and commits its own transaction.
pub(crate) async fn retry_on_sqlite_busy<T, E, F, Fut>(mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: BusyError,
{
    let mut backoff = Duration::from_millis(INITIAL_BACKOFF_MS);
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_sqlite_busy() && attempt < MAX_RETRIES => {
                attempt += 1;
                tracing::debug!(attempt, backoff_ms = backoff.as_millis() as u64, "sqlite busy, retrying");
                tokio::time::sleep(backoff).await;
                let next_ms = (backoff.as_millis() as u64)
                    .saturating_mul(2)
                    .min(MAX_BACKOFF_MS);
                backoff = Duration::from_millis(next_ms);
            }
            Err(err) => return Err(err),
        }
    }
}

pub(crate) trait BusyError {
    fn is_sqlite_busy(&self) -> bool;
}

impl BusyError for DbErr {
    fn is_sqlite_busy(&self) -> bool {
        let message = self.to_string();
        message.contains("database is locked")
            || message.contains("database is busy")
            || message.contains("(code: 5)")
            || message.contains("(code: 6)")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use sea_orm::{DbErr, RuntimeErr};

    use super::retry_on_sqlite_busy;

    fn locked() -> DbErr {
        DbErr::Exec(RuntimeErr::Internal("database is locked".to_string()))
    }

    #[tokio::test]
    async fn retries_until_lock_clears() {
        let attempts = AtomicUsize::new(0);
        let value = retry_on_sqlite_busy(|| {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(locked())
                } else {
                    Ok(attempt)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let attempts = AtomicUsize::new(0);
        let result: Result<(), DbErr> = retry_on_sqlite_busy(|| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(locked()) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let attempts = AtomicUsize::new(0);
        let result: Result<(), DbErr> = retry_on_sqlite_busy(|| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(DbErr::RecordNotFound("Task not found".to_string())) }
        })
        .await;

        assert!(matches!(result, Err(DbErr::RecordNotFound(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
