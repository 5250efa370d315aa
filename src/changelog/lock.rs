//! Changelog lock based on the single row of `databasechangeloglock`

use crate::changelog::ChangelogError;
use crate::executor::SqlExecutor;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Lock guard that releases the changelog lock when dropped
pub struct ChangelogLockGuard<'a> {
    executor: &'a dyn SqlExecutor,
}

impl<'a> ChangelogLockGuard<'a> {
    /// Acquire the lock, polling until `timeout` elapses
    ///
    /// The tracking tables must already exist.
    ///
    /// # Errors
    ///
    /// Returns `ChangelogError::LockTimeout` if another process keeps the lock.
    pub fn acquire(executor: &'a dyn SqlExecutor, timeout: Duration) -> Result<Self, ChangelogError> {
        acquire_changelog_lock(executor, timeout)?;
        Ok(Self { executor })
    }

    pub fn executor(&self) -> &'a dyn SqlExecutor {
        self.executor
    }
}

impl Drop for ChangelogLockGuard<'_> {
    fn drop(&mut self) {
        // Errors can't be propagated from drop
        if let Err(e) = release_changelog_lock(self.executor) {
            log::warn!("Failed to release changelog lock: {}", e);
        }
    }
}

fn locked_by() -> String {
    let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
    format!("{} (pid {})", host, std::process::id())
}

/// Try to flip `locked` from FALSE to TRUE until it succeeds or `timeout` elapses
pub fn acquire_changelog_lock(executor: &dyn SqlExecutor, timeout: Duration) -> Result<(), ChangelogError> {
    let start = Instant::now();
    let owner = locked_by();

    loop {
        let rows_affected = executor.execute(
            "UPDATE databasechangeloglock SET locked = TRUE, lockgranted = NOW(), lockedby = $1 \
             WHERE id = 1 AND locked = FALSE",
            &[&owner],
        )?;

        if rows_affected > 0 {
            log::debug!("Acquired changelog lock as {}", owner);
            return Ok(());
        }

        if start.elapsed() >= timeout {
            return Err(ChangelogError::LockTimeout(format!(
                "failed to acquire the changelog lock within {} seconds",
                timeout.as_secs()
            )));
        }

        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Release the changelog lock
pub fn release_changelog_lock(executor: &dyn SqlExecutor) -> Result<(), ChangelogError> {
    executor.execute(
        "UPDATE databasechangeloglock SET locked = FALSE, lockgranted = NULL, lockedby = NULL WHERE id = 1",
        &[],
    )?;
    Ok(())
}
