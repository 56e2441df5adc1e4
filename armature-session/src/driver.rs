//! Storage driver contract.

use crate::error::SessionResult;
use parking_lot::Mutex;
use std::time::{Duration, SystemTime};

/// Storage backend for encoded session payloads.
///
/// Every backend registered with the [`SessionManager`](crate::SessionManager)
/// implements this trait. Operations are synchronous and must not block
/// indefinitely; failures are reported as [`SessionError`](crate::SessionError)
/// values.
///
/// # Examples
///
/// ```
/// use armature_session::{Driver, SessionError, SessionResult};
/// use parking_lot::Mutex;
/// use std::collections::HashMap;
///
/// #[derive(Default)]
/// struct MemoryDriver {
///     records: Mutex<HashMap<String, String>>,
/// }
///
/// impl Driver for MemoryDriver {
///     fn read(&self, id: &str) -> SessionResult<String> {
///         self.records
///             .lock()
///             .get(id)
///             .cloned()
///             .ok_or_else(|| SessionError::NotFound(id.to_string()))
///     }
///
///     fn write(&self, id: &str, data: &str) -> SessionResult<()> {
///         self.records.lock().insert(id.to_string(), data.to_string());
///         Ok(())
///     }
///
///     fn destroy(&self, id: &str) -> SessionResult<()> {
///         self.records.lock().remove(id);
///         Ok(())
///     }
///
///     fn gc(&self, _max_lifetime_secs: u64) -> SessionResult<()> {
///         Ok(())
///     }
///
///     fn close(&self) -> SessionResult<()> {
///         Ok(())
///     }
/// }
/// ```
pub trait Driver: Send + Sync {
    /// Read the payload stored under `id`.
    ///
    /// Returns [`SessionError::NotFound`](crate::SessionError::NotFound) when
    /// the record is missing or older than the driver's lifetime. Stale data
    /// is never returned.
    fn read(&self, id: &str) -> SessionResult<String>;

    /// Store `data` under `id`, replacing any previous record and refreshing
    /// its freshness timestamp.
    fn write(&self, id: &str, data: &str) -> SessionResult<()>;

    /// Remove the record stored under `id`.
    ///
    /// Destroying a record that does not exist succeeds.
    fn destroy(&self, id: &str) -> SessionResult<()>;

    /// Remove every record last modified more than `max_lifetime_secs` ago.
    ///
    /// Must be safe to run concurrently with reads and writes, and must not
    /// remove a record written after the sweep started.
    fn gc(&self, max_lifetime_secs: u64) -> SessionResult<()>;

    /// Release backend resources. Called once at shutdown.
    fn close(&self) -> SessionResult<()>;
}

/// Time source used for expiry decisions.
pub trait Clock: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> SystemTime;
}

/// Clock backed by [`SystemTime::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Manually driven clock for tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<SystemTime>,
}

impl ManualClock {
    /// Start the clock at the current system time.
    pub fn new() -> Self {
        Self::starting_at(SystemTime::now())
    }

    /// Start the clock at a fixed instant.
    pub fn starting_at(now: SystemTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    /// Set the clock to a fixed instant.
    pub fn set(&self, to: SystemTime) {
        *self.now.lock() = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let clock = ManualClock::starting_at(start);
        assert_eq!(clock.now(), start);

        clock.advance(Duration::from_secs(60));
        assert_eq!(clock.now(), start + Duration::from_secs(60));

        clock.set(start);
        assert_eq!(clock.now(), start);
    }
}
