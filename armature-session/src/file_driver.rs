//! Local filesystem session driver.

use crate::driver::{Clock, Driver, SystemClock};
use crate::error::{SessionError, SessionResult};
use parking_lot::Mutex;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

/// Directory created under the system temp dir when no root is configured.
pub const DEFAULT_DIRECTORY: &str = "armature-sessions";

/// File-backed session driver.
///
/// Each record is a single file named after the session ID directly under
/// the root directory. Freshness is the file's modification time, which is
/// stamped from the driver's [`Clock`] on every write. One mutex serializes
/// every operation against the root, so operations on different IDs also
/// wait for each other.
///
/// # Examples
///
/// ```no_run
/// use armature_session::{Driver, FileDriver};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let driver = FileDriver::new("/var/lib/myapp/sessions", 120)?;
/// driver.write("0123456789abcdefABCDEF0123456789", "payload")?;
/// let data = driver.read("0123456789abcdefABCDEF0123456789")?;
/// # Ok(())
/// # }
/// ```
pub struct FileDriver {
    root: PathBuf,
    lifetime: Duration,
    clock: Arc<dyn Clock>,
    lock: Mutex<()>,
}

impl FileDriver {
    /// Create a driver rooted at `root`, creating the directory if needed.
    ///
    /// Records older than `lifetime_minutes` are treated as missing.
    pub fn new(root: impl Into<PathBuf>, lifetime_minutes: u64) -> SessionResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            SessionError::Config(format!(
                "Failed to create session directory {:?}: {}",
                root, e
            ))
        })?;

        info!(path = ?root, lifetime_minutes, "Initialized file session driver");

        Ok(Self {
            root,
            lifetime: Duration::from_secs(lifetime_minutes.saturating_mul(60)),
            clock: Arc::new(SystemClock),
            lock: Mutex::new(()),
        })
    }

    /// Create a driver rooted at `<temp_dir>/armature-sessions`.
    pub fn in_temp_dir(lifetime_minutes: u64) -> SessionResult<Self> {
        Self::new(Self::default_root(), lifetime_minutes)
    }

    /// Default root directory.
    pub fn default_root() -> PathBuf {
        std::env::temp_dir().join(DEFAULT_DIRECTORY)
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Root directory holding the records.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Remove stale records and report how many were deleted.
    ///
    /// Subdirectories are skipped. A record that disappears between listing
    /// and removal is ignored; any other I/O error aborts the sweep.
    pub fn sweep(&self, max_lifetime_secs: u64) -> SessionResult<usize> {
        let _guard = self.lock.lock();

        let cutoff = cutoff(self.clock.now(), Duration::from_secs(max_lifetime_secs));

        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        for entry in entries {
            let entry = entry?;
            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            if !metadata.is_file() {
                continue;
            }

            if metadata.modified()? < cutoff {
                match fs::remove_file(entry.path()) {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }

        Ok(removed)
    }

    fn record_path(&self, id: &str) -> SessionResult<PathBuf> {
        let mut components = Path::new(id).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) if !id.contains(['/', '\\', '\0']) => {
                Ok(self.root.join(id))
            }
            _ => Err(SessionError::InvalidSessionId(id.to_string())),
        }
    }
}

fn cutoff(now: SystemTime, age: Duration) -> SystemTime {
    now.checked_sub(age).unwrap_or(SystemTime::UNIX_EPOCH)
}

impl Driver for FileDriver {
    fn read(&self, id: &str) -> SessionResult<String> {
        let path = self.record_path(id)?;
        let _guard = self.lock.lock();

        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SessionError::NotFound(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        if metadata.modified()? <= cutoff(self.clock.now(), self.lifetime) {
            debug!(session_id = %id, "Session record expired");
            return Err(SessionError::NotFound(id.to_string()));
        }

        fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => SessionError::NotFound(id.to_string()),
            _ => e.into(),
        })
    }

    fn write(&self, id: &str, data: &str) -> SessionResult<()> {
        let path = self.record_path(id)?;
        let _guard = self.lock.lock();

        let mut file = fs::File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        file.write_all(data.as_bytes())?;
        file.set_modified(self.clock.now())?;

        debug!(session_id = %id, size = data.len(), "Stored session record");
        Ok(())
    }

    fn destroy(&self, id: &str) -> SessionResult<()> {
        let path = self.record_path(id)?;
        let _guard = self.lock.lock();

        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn gc(&self, max_lifetime_secs: u64) -> SessionResult<()> {
        let removed = self.sweep(max_lifetime_secs)?;
        debug!(path = ?self.root, removed, "Session GC sweep finished");
        Ok(())
    }

    fn close(&self) -> SessionResult<()> {
        Ok(())
    }
}

impl std::fmt::Debug for FileDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileDriver")
            .field("root", &self.root)
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::ManualClock;
    use crate::id::generate_session_id;

    fn driver_with_clock(lifetime_minutes: u64) -> (tempfile::TempDir, FileDriver, Arc<ManualClock>) {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new());
        let driver = FileDriver::new(dir.path(), lifetime_minutes)
            .unwrap()
            .with_clock(clock.clone());
        (dir, driver, clock)
    }

    #[test]
    fn test_write_then_read() {
        let (_dir, driver, _clock) = driver_with_clock(120);
        let id = generate_session_id();

        driver.write(&id, "payload").unwrap();
        assert_eq!(driver.read(&id).unwrap(), "payload");
    }

    #[test]
    fn test_last_write_wins() {
        let (_dir, driver, _clock) = driver_with_clock(120);
        let id = generate_session_id();

        driver.write(&id, "first, and longer").unwrap();
        driver.write(&id, "second").unwrap();
        assert_eq!(driver.read(&id).unwrap(), "second");
    }

    #[test]
    fn test_read_missing_is_not_found() {
        let (_dir, driver, _clock) = driver_with_clock(120);
        assert!(matches!(
            driver.read(&generate_session_id()),
            Err(SessionError::NotFound(_))
        ));
    }

    #[test]
    fn test_read_expired_is_not_found_but_kept() {
        let (dir, driver, clock) = driver_with_clock(120);
        let id = generate_session_id();

        driver.write(&id, "payload").unwrap();
        clock.advance(Duration::from_secs(121 * 60));

        assert!(matches!(driver.read(&id), Err(SessionError::NotFound(_))));
        assert!(dir.path().join(&id).exists());
    }

    #[test]
    fn test_write_refreshes_freshness() {
        let (_dir, driver, clock) = driver_with_clock(120);
        let id = generate_session_id();

        driver.write(&id, "payload").unwrap();
        clock.advance(Duration::from_secs(100 * 60));
        driver.write(&id, "payload").unwrap();
        clock.advance(Duration::from_secs(100 * 60));

        assert_eq!(driver.read(&id).unwrap(), "payload");
    }

    #[test]
    fn test_destroy() {
        let (_dir, driver, _clock) = driver_with_clock(120);
        let id = generate_session_id();

        driver.write(&id, "payload").unwrap();
        driver.destroy(&id).unwrap();
        assert!(matches!(driver.read(&id), Err(SessionError::NotFound(_))));
    }

    #[test]
    fn test_destroy_missing_is_ok() {
        let (_dir, driver, _clock) = driver_with_clock(120);
        assert!(driver.destroy(&generate_session_id()).is_ok());
    }

    #[test]
    fn test_path_traversal_rejected() {
        let (_dir, driver, _clock) = driver_with_clock(120);

        for id in ["", ".", "..", "../escape", "a/b", "a\\b", "/etc/passwd"] {
            assert!(
                matches!(driver.write(id, "x"), Err(SessionError::InvalidSessionId(_))),
                "id {:?} should be rejected",
                id
            );
        }
    }

    #[test]
    fn test_sweep_removes_only_stale_records() {
        let (dir, driver, clock) = driver_with_clock(120);

        let old = generate_session_id();
        let middle = generate_session_id();
        let fresh = generate_session_id();

        driver.write(&old, "old").unwrap();
        clock.advance(Duration::from_secs(60 * 60));
        driver.write(&middle, "middle").unwrap();
        clock.advance(Duration::from_secs(60 * 60));
        driver.write(&fresh, "fresh").unwrap();
        clock.advance(Duration::from_secs(30 * 60));

        // old: 150 min, middle: 90 min, fresh: 30 min
        let removed = driver.sweep(100 * 60).unwrap();
        assert_eq!(removed, 1);
        assert!(!dir.path().join(&old).exists());
        assert!(dir.path().join(&middle).exists());
        assert!(dir.path().join(&fresh).exists());

        let removed = driver.sweep(60 * 60).unwrap();
        assert_eq!(removed, 1);
        assert!(!dir.path().join(&middle).exists());
        assert!(dir.path().join(&fresh).exists());
    }

    #[test]
    fn test_sweep_skips_directories() {
        let (dir, driver, clock) = driver_with_clock(120);
        fs::create_dir(dir.path().join("nested")).unwrap();
        clock.advance(Duration::from_secs(24 * 60 * 60));

        assert_eq!(driver.sweep(60).unwrap(), 0);
        assert!(dir.path().join("nested").is_dir());
    }

    #[test]
    fn test_sweep_missing_root_is_ok() {
        let (dir, driver, _clock) = driver_with_clock(120);
        fs::remove_dir_all(dir.path()).unwrap();
        assert!(driver.gc(60).is_ok());
    }

    #[test]
    fn test_close_is_noop() {
        let (_dir, driver, _clock) = driver_with_clock(120);
        assert!(driver.close().is_ok());
        assert!(driver.close().is_ok());
    }

    #[test]
    fn test_huge_lifetime_never_expires() {
        let (_dir, driver, clock) = driver_with_clock(u64::MAX);
        let id = generate_session_id();
        driver.write(&id, "payload").unwrap();

        clock.advance(Duration::from_secs(10 * 365 * 24 * 60 * 60));
        assert_eq!(driver.read(&id).unwrap(), "payload");
    }
}
