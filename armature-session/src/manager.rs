//! Session manager: driver registry, session construction and GC scheduling.

use crate::codec::{Codec, SecureCodec};
use crate::config::SessionConfig;
use crate::cookie::SessionCookie;
use crate::driver::Driver;
use crate::error::{SessionError, SessionResult};
use crate::file_driver::FileDriver;
use crate::gc::GcTask;
use crate::pool::SessionPool;
use crate::session::Session;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info};

/// Name under which the default file driver is registered.
pub const DEFAULT_DRIVER: &str = "default";

/// Builds sessions and owns the drivers they are stored in.
///
/// Drivers are registered during setup with [`SessionManager::extend`]. The
/// first [`SessionManager::build_session`] call seals the registry; later
/// registrations are refused. Every registered driver is swept on the
/// configured GC interval until [`SessionManager::shutdown`] is called or the
/// manager is dropped.
///
/// Construction and registration spawn background tasks and must happen
/// inside a Tokio runtime.
///
/// # Examples
///
/// ```no_run
/// use armature_session::{SessionConfig, SessionManager};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), armature_session::SessionError> {
/// let config = SessionConfig::new("0123456789abcdef0123456789abcdef")?
///     .with_lifetime(120)
///     .with_gc_interval(30);
/// let manager = SessionManager::new(config)?;
///
/// let mut session = manager.build_session("session", None, None)?;
/// session.start()?;
/// session.put("user_id", 42)?;
/// session.save()?;
/// manager.release_session(session);
///
/// manager.shutdown().await?;
/// # Ok(())
/// # }
/// ```
pub struct SessionManager {
    config: SessionConfig,
    codec: Arc<dyn Codec>,
    drivers: RwLock<HashMap<String, Arc<dyn Driver>>>,
    gc_tasks: Mutex<Vec<GcTask>>,
    sealed: AtomicBool,
    closed: AtomicBool,
    pool: SessionPool,
}

impl SessionManager {
    /// Create a manager using [`SecureCodec`] keyed by `config.key`.
    ///
    /// Unless disabled, a [`FileDriver`] is registered as `"default"`.
    pub fn new(config: SessionConfig) -> SessionResult<Self> {
        config.validate()?;
        let codec = Arc::new(SecureCodec::new(&config.key, config.lifetime_secs())?);
        Self::with_codec(config, codec)
    }

    /// Create a manager with a custom codec.
    pub fn with_codec(config: SessionConfig, codec: Arc<dyn Codec>) -> SessionResult<Self> {
        config.validate()?;

        let manager = Self {
            pool: SessionPool::new(config.pool_capacity),
            config,
            codec,
            drivers: RwLock::new(HashMap::new()),
            gc_tasks: Mutex::new(Vec::new()),
            sealed: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        };

        if !manager.config.disable_default_driver {
            manager.create_default_driver()?;
        }

        info!(
            lifetime_minutes = manager.config.lifetime,
            gc_interval_minutes = manager.config.gc_interval,
            "Session manager initialized"
        );

        Ok(manager)
    }

    fn create_default_driver(&self) -> SessionResult<()> {
        let root = self
            .config
            .files_path
            .clone()
            .unwrap_or_else(FileDriver::default_root);
        let driver = FileDriver::new(root, self.config.lifetime)?;
        self.extend(DEFAULT_DRIVER, Arc::new(driver))
    }

    /// Register a driver and schedule its GC sweep.
    pub fn extend(&self, name: impl Into<String>, driver: Arc<dyn Driver>) -> SessionResult<()> {
        let name = name.into();

        let mut drivers = self.drivers.write();
        if self.is_sealed() {
            return Err(SessionError::RegistrySealed);
        }
        if drivers.contains_key(&name) {
            return Err(SessionError::DriverExists(name));
        }

        let task = GcTask::spawn(
            name.clone(),
            driver.clone(),
            self.config.gc_period(),
            self.config.lifetime_secs(),
            self.config.gc_timeout,
        )?;

        drivers.insert(name.clone(), driver);
        self.gc_tasks.lock().push(task);

        info!(driver = %name, "Registered session driver");
        Ok(())
    }

    /// Refuse further driver registrations.
    ///
    /// Waits for an in-progress [`SessionManager::extend`] to finish.
    pub fn seal(&self) {
        let _drivers = self.drivers.write();
        if !self.sealed.swap(true, Ordering::SeqCst) {
            debug!("Session driver registry sealed");
        }
    }

    /// Whether the registry is sealed.
    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::SeqCst)
    }

    /// Build a session on the named driver (`"default"` when `None`).
    ///
    /// `id` is used only if well formed; otherwise a new ID is generated.
    pub fn build_session(
        &self,
        name: &str,
        driver: Option<&str>,
        id: Option<&str>,
    ) -> SessionResult<Session> {
        let handler = self.driver(driver.unwrap_or(DEFAULT_DRIVER))?;
        self.seal();

        let mut session = self.acquire_session();
        session.bind(name, handler, self.codec.clone(), id);
        Ok(session)
    }

    /// Look up a registered driver.
    pub fn driver(&self, name: &str) -> SessionResult<Arc<dyn Driver>> {
        if name.is_empty() {
            return Err(SessionError::DriverNotSet);
        }

        self.drivers
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| SessionError::DriverNotSupported(name.to_string()))
    }

    /// Names of all registered drivers, sorted.
    pub fn drivers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.drivers.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Take an unbound session shell from the pool.
    pub fn acquire_session(&self) -> Session {
        self.pool.acquire()
    }

    /// Reset a session and return it to the pool.
    pub fn release_session(&self, session: Session) {
        self.pool.release(session);
    }

    /// Session shell pool.
    pub fn pool(&self) -> &SessionPool {
        &self.pool
    }

    /// Session lifetime in minutes.
    pub fn lifetime(&self) -> u64 {
        self.config.lifetime
    }

    /// GC interval in minutes.
    pub fn gc_interval(&self) -> u64 {
        self.config.gc_interval
    }

    /// Manager configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Cookie a web layer should set for `session`.
    pub fn cookie(&self, session: &Session) -> SessionCookie {
        SessionCookie {
            name: session.name().to_string(),
            value: session.id().to_string(),
            path: "/".to_string(),
            max_age: self.config.lifetime_secs(),
            secure: self.config.cookie_secure,
            http_only: true,
            same_site: self.config.cookie_same_site,
        }
    }

    /// Stop every GC task and close every driver.
    ///
    /// All drivers are closed even if one fails; the first error is
    /// returned. Calling this more than once is a no-op.
    pub async fn shutdown(&self) -> SessionResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.seal();

        let tasks = std::mem::take(&mut *self.gc_tasks.lock());
        for task in tasks {
            task.stop().await;
        }

        let drivers: Vec<(String, Arc<dyn Driver>)> = self
            .drivers
            .read()
            .iter()
            .map(|(name, driver)| (name.clone(), driver.clone()))
            .collect();

        let mut first_error = None;
        for (name, driver) in drivers {
            if let Err(e) = driver.close() {
                error!(driver = %name, error = %e, "Failed to close session driver");
                first_error.get_or_insert(e);
            }
        }

        info!("Session manager shut down");
        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        for task in self.gc_tasks.get_mut().iter() {
            task.cancel();
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("drivers", &self.drivers())
            .field("lifetime", &self.config.lifetime)
            .field("gc_interval", &self.config.gc_interval)
            .field("sealed", &self.is_sealed())
            .finish_non_exhaustive()
    }
}
