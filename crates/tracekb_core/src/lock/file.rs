//! OS-backed lock manager using marker files.

use super::{LockManager, LockName, LockTimeout};
use crate::error::{CoreError, CoreResult};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

/// Locks visible to every process sharing a lock directory.
///
/// A lock is held while its marker file exists. Creation uses
/// `create_new`, which the OS performs atomically, so at most one acquirer
/// wins. A process that dies while holding a lock leaves the marker behind;
/// the lock stays held until it is force-unlocked by a sweep.
///
/// The marker of lock `/http:--host-base1-` is `<dir>/http:--host-base1-`
/// and contains the holder's process id.
#[derive(Debug)]
pub struct FileLockManager {
    dir: PathBuf,
    poll_interval: Duration,
}

impl FileLockManager {
    /// Default delay between two acquisition attempts.
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

    /// Opens (creating if needed) a lock directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: &Path) -> CoreResult<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
        })
    }

    /// Sets the delay between two acquisition attempts.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Returns the lock directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn marker(&self, name: &LockName) -> PathBuf {
        self.dir.join(name.as_str().trim_start_matches('/'))
    }

    fn try_create(&self, name: &LockName) -> CoreResult<bool> {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.marker(name))
        {
            Ok(mut file) => {
                // Holder pid is informational only.
                if let Err(e) = writeln!(file, "{}", std::process::id()) {
                    tracing::debug!(lock = %name, error = %e, "could not record lock holder");
                }
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn remove(&self, name: &LockName) -> CoreResult<bool> {
        match fs::remove_file(self.marker(name)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

impl LockManager for FileLockManager {
    fn acquire(&self, name: &LockName, timeout: LockTimeout) -> CoreResult<()> {
        let deadline = timeout.deadline();
        loop {
            if self.try_create(name)? {
                tracing::debug!(lock = %name, "lock acquired");
                return Ok(());
            }
            let now = Instant::now();
            let pause = match deadline {
                None => self.poll_interval,
                Some(deadline) if now >= deadline => {
                    return Err(CoreError::Busy {
                        lock: name.clone(),
                        timeout: timeout.waited(),
                    });
                }
                Some(deadline) => self.poll_interval.min(deadline - now),
            };
            thread::sleep(pause);
        }
    }

    fn release(&self, name: &LockName) -> CoreResult<()> {
        if self.remove(name)? {
            tracing::debug!(lock = %name, "lock released");
        }
        Ok(())
    }

    fn is_held(&self, name: &LockName) -> CoreResult<bool> {
        Ok(self.marker(name).exists())
    }

    fn force_unlock(&self, name: &LockName) -> CoreResult<bool> {
        self.remove(name)
    }
}
