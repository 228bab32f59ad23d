//! Single-run pipeline lock
//!
//! The lock is a file created with `create_new`; its existence means a run
//! is in progress. The holder writes its pid, a per-acquisition token and
//! its start time into it, and a heartbeat task keeps the file's mtime fresh
//! while the lock is held. A lock whose mtime is older than the stale
//! threshold is assumed abandoned and taken over.

use crate::storage::traits::{StorageError, StorageResult};
use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};
use tokio::task::JoinHandle;

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const MIN_HEARTBEAT: Duration = Duration::from_millis(10);

/// Held pipeline lock; the lock file is removed on drop if it is still ours
#[derive(Debug)]
pub struct PipelineLock {
    path: PathBuf,
    token: String,
    heartbeat: Option<JoinHandle<()>>,
}

impl PipelineLock {
    /// Acquires the lock, waiting up to `wait` for another holder to finish
    ///
    /// Must be called inside a tokio runtime: the heartbeat runs as a task
    /// and refreshes the lock every quarter of `stale_after`.
    ///
    /// # Arguments
    ///
    /// * `path` - Lock file location
    /// * `wait` - How long to poll before giving up
    /// * `stale_after` - Age beyond which an unrefreshed lock is taken over
    ///
    /// # Returns
    ///
    /// * `Ok(PipelineLock)` - The lock is held
    /// * `Err(StorageError::LockHeld)` - Another run still holds it
    pub async fn acquire(path: &Path, wait: Duration, stale_after: Duration) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let deadline = Instant::now() + wait;
        loop {
            match Self::try_create(path) {
                Ok(mut lock) => {
                    let every = (stale_after / 4).max(MIN_HEARTBEAT);
                    lock.heartbeat = Some(spawn_heartbeat(
                        lock.path.clone(),
                        lock.token.clone(),
                        every,
                    ));
                    return Ok(lock);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e.into()),
            }

            if is_stale(path, stale_after) {
                tracing::warn!("Removing stale pipeline lock {}", path.display());
                match fs::remove_file(path) {
                    Ok(()) => continue,
                    Err(e) if e.kind() == ErrorKind::NotFound => continue,
                    Err(e) => return Err(e.into()),
                }
            }

            if Instant::now() >= deadline {
                let holder = fs::read_to_string(path).unwrap_or_default();
                return Err(StorageError::LockHeld(format!(
                    "{} ({})",
                    path.display(),
                    holder.trim()
                )));
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    fn try_create(path: &Path) -> std::io::Result<Self> {
        let token = format!("{}-{:016x}", std::process::id(), fastrand::u64(..));
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        writeln!(
            file,
            "pid={} token={} started_at={}",
            std::process::id(),
            token,
            Utc::now().to_rfc3339()
        )?;
        file.sync_all()?;

        tracing::debug!("Acquired pipeline lock {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            token,
            heartbeat: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PipelineLock {
    fn drop(&mut self) {
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.abort();
        }

        if !holds_token(&self.path, &self.token) {
            tracing::warn!(
                "Pipeline lock {} is no longer ours, leaving it in place",
                self.path.display()
            );
            return;
        }
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!("Failed to release pipeline lock {}: {}", self.path.display(), e);
        }
    }
}

/// Refreshes the lock's mtime until the task is aborted or the lock changes hands
fn spawn_heartbeat(path: PathBuf, token: String, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if !holds_token(&path, &token) {
                tracing::warn!("Pipeline lock {} was taken over", path.display());
                return;
            }
            if let Err(e) = touch(&path) {
                tracing::warn!("Failed to refresh pipeline lock {}: {}", path.display(), e);
            }
        }
    })
}

fn holds_token(path: &Path, token: &str) -> bool {
    let expected = format!("token={}", token);
    fs::read_to_string(path)
        .map(|content| content.split_whitespace().any(|field| field == expected))
        .unwrap_or(false)
}

fn touch(path: &Path) -> std::io::Result<()> {
    OpenOptions::new()
        .write(true)
        .open(path)?
        .set_modified(SystemTime::now())
}

fn is_stale(path: &Path, stale_after: Duration) -> bool {
    let Ok(modified) = fs::metadata(path).and_then(|m| m.modified()) else {
        return false;
    };
    SystemTime::now()
        .duration_since(modified)
        .map(|age| age > stale_after)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const LONG: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn test_acquire_and_release() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("output/.pipeline.lock");

        let lock = PipelineLock::acquire(&path, Duration::ZERO, LONG).await.unwrap();
        assert!(path.exists());
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains(&format!("pid={}", std::process::id())));

        drop(lock);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_second_acquire_times_out() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".pipeline.lock");

        let _held = PipelineLock::acquire(&path, Duration::ZERO, LONG).await.unwrap();
        let second = PipelineLock::acquire(&path, Duration::from_millis(300), LONG).await;
        assert!(matches!(second, Err(StorageError::LockHeld(_))));
    }

    #[tokio::test]
    async fn test_stale_lock_is_taken_over() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".pipeline.lock");
        fs::write(&path, "pid=1").unwrap();

        std::thread::sleep(Duration::from_millis(20));
        let lock = PipelineLock::acquire(&path, Duration::ZERO, Duration::from_millis(1)).await;
        assert!(lock.is_ok());
    }

    #[tokio::test]
    async fn test_long_run_keeps_its_lock() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".pipeline.lock");
        let stale_after = Duration::from_millis(200);

        let held = PipelineLock::acquire(&path, Duration::ZERO, stale_after)
            .await
            .unwrap();
        // Outlive the stale threshold several times over
        tokio::time::sleep(Duration::from_millis(700)).await;

        let second = PipelineLock::acquire(&path, Duration::ZERO, stale_after).await;
        assert!(matches!(second, Err(StorageError::LockHeld(_))));

        drop(held);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_release_leaves_a_lock_taken_over_by_another_run() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".pipeline.lock");

        let held = PipelineLock::acquire(&path, Duration::ZERO, LONG).await.unwrap();
        fs::write(&path, "pid=1 token=1-00000000000000ff started_at=now\n").unwrap();

        drop(held);
        assert!(path.exists());
        assert!(fs::read_to_string(&path).unwrap().contains("token=1-00000000000000ff"));
    }
}
