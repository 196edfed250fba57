//! Locking and atomic writes for the list file
//!
//! - [`ListGuard`]: the process-wide lock every request takes before touching
//!   the list file. The whole load → mutate → save cycle runs under it.
//! - [`FileLock`]: advisory `flock` on `<file>.lock` (via fs2), so that several
//!   server processes pointed at the same file also serialize.
//! - [`write_atomic`]: temp file + rename.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use fs2::FileExt;
use tempfile::NamedTempFile;
use tokio::sync::Mutex;

use crate::error::{Error, Result};

/// Retry interval when waiting for a contended file lock
const LOCK_RETRY_INTERVAL_MS: u64 = 20;

fn is_lock_contended(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::WouldBlock {
        return true;
    }

    // On Windows, fs2/libc can surface lock/sharing violations as "Other".
    #[cfg(windows)]
    {
        matches!(err.raw_os_error(), Some(32) | Some(33))
    }
    #[cfg(not(windows))]
    {
        false
    }
}

/// Sidecar lock file for a list file: `todo.json` -> `todo.json.lock`
pub fn lock_path_for(path: &Path) -> PathBuf {
    PathBuf::from(format!("{}.lock", path.display()))
}

fn open_lock_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    Ok(file)
}

/// A file lock guard that releases the lock when dropped
#[derive(Debug)]
pub struct FileLock {
    file: File,
}

impl FileLock {
    /// Acquire an exclusive lock, giving up after `timeout`
    pub fn acquire(path: impl AsRef<Path>, timeout: Duration) -> Result<Self> {
        let path = path.as_ref();
        let file = open_lock_file(path)?;

        let start = Instant::now();
        let retry_interval = Duration::from_millis(LOCK_RETRY_INTERVAL_MS);

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    return Ok(FileLock { file });
                }
                Err(e) if is_lock_contended(&e) => {
                    if start.elapsed() >= timeout {
                        return Err(Error::LockFailed(path.to_path_buf()));
                    }
                    std::thread::sleep(retry_interval);
                }
                Err(e) => return Err(Error::Io(e)),
            }
        }
    }

    /// Acquire an exclusive lock, waiting as long as it takes
    pub fn acquire_blocking(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = open_lock_file(path)?;
        file.lock_exclusive()?;
        Ok(FileLock { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Atomically replace `path` with `data`
///
/// Writes a temp file in the target's directory, syncs it and renames it over
/// the target, so readers see either the old document or the new one.
pub fn write_atomic(path: impl AsRef<Path>, data: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(data)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| Error::Io(e.error))?;

    Ok(())
}

/// Process-wide mutual exclusion for one list file
///
/// Cheap to clone; all clones share the same lock. Waiters are admitted in
/// the order they asked (tokio's mutex is fair).
#[derive(Debug, Clone)]
pub struct ListGuard {
    path: Arc<PathBuf>,
    mutex: Arc<Mutex<()>>,
    timeout: Option<Duration>,
    file_lock: bool,
}

impl ListGuard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Arc::new(path.into()),
            mutex: Arc::new(Mutex::new(())),
            timeout: None,
            file_lock: false,
        }
    }

    /// Give up waiting for the lock after `timeout` (none by default)
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Also hold an advisory lock on `<file>.lock` during the critical section
    pub fn with_file_lock(mut self, enabled: bool) -> Self {
        self.file_lock = enabled;
        self
    }

    /// Run `critical` with exclusive access to the list file
    ///
    /// The closure runs on the blocking pool; the lock is held until it
    /// returns, whatever the outcome.
    pub async fn run<F, T>(&self, critical: F) -> Result<T>
    where
        F: FnOnce(&Path) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let start = Instant::now();
        let permit = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.mutex.clone().lock_owned())
                .await
                .map_err(|_| Error::LockTimeout(timeout))?,
            None => self.mutex.clone().lock_owned().await,
        };
        tracing::trace!(waited = ?start.elapsed(), path = %self.path.display(), "list lock acquired");

        let path = Arc::clone(&self.path);
        let file_lock = self.file_lock;
        let budget = self
            .timeout
            .map(|t| (t, t.saturating_sub(start.elapsed())));

        let joined = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let _file_lock = if file_lock {
                let lock_path = lock_path_for(path.as_path());
                Some(match budget {
                    // Same budget as the mutex wait, same answer when it runs out
                    Some((timeout, remaining)) => FileLock::acquire(&lock_path, remaining)
                        .map_err(|e| match e {
                            Error::LockFailed(_) => Error::LockTimeout(timeout),
                            other => other,
                        })?,
                    None => FileLock::acquire_blocking(&lock_path)?,
                })
            } else {
                None
            };
            critical(path.as_path())
        })
        .await;

        joined.map_err(|e| Error::Persistence(format!("critical section aborted: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use tempfile::TempDir;

    #[test]
    fn file_lock_acquire_release() {
        let temp_dir = TempDir::new().unwrap();
        let lock_path = temp_dir.path().join("todo.json.lock");

        let lock = FileLock::acquire(&lock_path, Duration::from_secs(1)).unwrap();
        assert!(lock_path.exists());

        let contended = FileLock::acquire(&lock_path, Duration::from_millis(30));
        assert!(matches!(contended, Err(Error::LockFailed(_))));

        drop(lock);
        assert!(FileLock::acquire(&lock_path, Duration::from_millis(30)).is_ok());
    }

    #[test]
    fn file_lock_timeout_returns_lock_failed() {
        let temp_dir = TempDir::new().unwrap();
        let lock_path = temp_dir.path().join("timeout.lock");

        let _lock = FileLock::acquire_blocking(&lock_path).unwrap();
        let result = FileLock::acquire(&lock_path, Duration::from_millis(50));
        assert!(matches!(result, Err(Error::LockFailed(_))));
    }

    #[test]
    fn lock_path_appends_suffix() {
        assert_eq!(
            lock_path_for(Path::new("/tmp/todo.json")),
            PathBuf::from("/tmp/todo.json.lock")
        );
    }

    #[test]
    fn atomic_write_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("todo.json");

        write_atomic(&file_path, b"[1, 2, 3]").unwrap();
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "[1, 2, 3]");

        write_atomic(&file_path, b"[]").unwrap();
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "[]");

        let leftovers: Vec<_> = fs::read_dir(temp_dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn atomic_write_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("a").join("b").join("todo.json");

        write_atomic(&file_path, b"[]").unwrap();
        assert!(file_path.exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn stress_single_holder() {
        let temp_dir = TempDir::new().unwrap();
        let guard = ListGuard::new(temp_dir.path().join("todo.json")).with_file_lock(true);

        let tasks = 12;
        let in_lock = Arc::new(AtomicUsize::new(0));
        let max_concurrent = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::with_capacity(tasks);
        for _ in 0..tasks {
            let guard = guard.clone();
            let in_lock = Arc::clone(&in_lock);
            let max_concurrent = Arc::clone(&max_concurrent);

            handles.push(tokio::spawn(async move {
                guard
                    .run(move |_| {
                        let current = in_lock.fetch_add(1, Ordering::SeqCst) + 1;
                        max_concurrent.fetch_max(current, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(5));
                        in_lock.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    })
                    .await
            }));
        }

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(max_concurrent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn run_times_out_while_held() {
        let temp_dir = TempDir::new().unwrap();
        let guard = ListGuard::new(temp_dir.path().join("todo.json"))
            .with_timeout(Some(Duration::from_millis(50)));

        let held = guard.mutex.clone().lock_owned().await;
        let result = guard.run(|_| Ok(())).await;
        assert!(matches!(result, Err(Error::LockTimeout(_))));

        drop(held);
        assert!(guard.run(|_| Ok(())).await.is_ok());
    }

    #[tokio::test]
    async fn run_file_lock_wait_times_out_as_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("todo.json");
        let guard = ListGuard::new(&file)
            .with_timeout(Some(Duration::from_millis(100)))
            .with_file_lock(true);

        // Another process holding the sidecar lock
        let held = FileLock::acquire_blocking(lock_path_for(&file)).unwrap();
        let err = guard.run(|_| Ok(())).await.unwrap_err();
        assert!(matches!(err, Error::LockTimeout(_)));
        assert_eq!(err.status_code(), axum::http::StatusCode::SERVICE_UNAVAILABLE);

        drop(held);
        assert!(guard.run(|_| Ok(())).await.is_ok());
    }

    #[tokio::test]
    async fn run_propagates_closure_error() {
        let guard = ListGuard::new("unused.json");
        let result: Result<()> = guard
            .run(|_| Err(Error::NotFound("ID 3 not found".to_string())))
            .await;
        assert!(matches!(result, Err(Error::NotFound(_))));

        // Lock is released after an error
        assert!(guard.run(|_| Ok(())).await.is_ok());
    }
}
