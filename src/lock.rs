use anyhow::{bail, Context, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Exclusive advisory lock held for the lifetime of the value.
/// Only the holder may run time-triggered regeneration.
#[derive(Debug)]
pub struct SchedulerLock {
    file: File,
    path: PathBuf,
}

impl SchedulerLock {
    /// Fails immediately if another process holds the lock.
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating lock dir {}", parent.display()))?;
            }
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("opening lock file {}", path.display()))?;

        if file.try_lock_exclusive().is_err() {
            bail!("another planner instance holds {}", path.display());
        }
        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        file.flush()?;

        info!("Scheduler lock acquired - path={}", path.display());
        Ok(Self { file, path: path.to_path_buf() })
    }
}

impl Drop for SchedulerLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        debug!("Scheduler lock released - path={}", self.path.display());
    }
}
