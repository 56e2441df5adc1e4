//! Session manager configuration.

use crate::codec::KEY_LENGTH;
use crate::cookie::SameSite;
use crate::error::{SessionError, SessionResult};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default session lifetime in minutes.
pub const DEFAULT_LIFETIME_MINUTES: u64 = 120;

/// Default garbage collection interval in minutes.
pub const DEFAULT_GC_INTERVAL_MINUTES: u64 = 30;

/// Upper bound for lifetime and GC interval (about 100 years).
pub const MAX_MINUTES: u64 = 100 * 366 * 24 * 60;

/// Default number of idle session shells kept for reuse.
pub const DEFAULT_POOL_CAPACITY: usize = 1024;

/// Session manager configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// 32-byte key used to encrypt session payloads
    pub key: Vec<u8>,
    /// Session lifetime in minutes (record expiry, codec max age, cookie max age)
    pub lifetime: u64,
    /// Garbage collection interval in minutes
    pub gc_interval: u64,
    /// Skip registering the file driver under `"default"`
    pub disable_default_driver: bool,
    /// Root directory for the default file driver
    pub files_path: Option<PathBuf>,
    /// Maximum idle shells held by the session pool
    pub pool_capacity: usize,
    /// Upper bound on a single GC sweep
    pub gc_timeout: Option<Duration>,
    /// Cookie Secure flag
    pub cookie_secure: bool,
    /// Cookie SameSite policy
    pub cookie_same_site: SameSite,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            key: Vec::new(),
            lifetime: DEFAULT_LIFETIME_MINUTES,
            gc_interval: DEFAULT_GC_INTERVAL_MINUTES,
            disable_default_driver: false,
            files_path: None,
            pool_capacity: DEFAULT_POOL_CAPACITY,
            gc_timeout: None,
            cookie_secure: true,
            cookie_same_site: SameSite::Lax,
        }
    }
}

impl SessionConfig {
    /// Create a configuration with the given encoding key.
    ///
    /// # Examples
    ///
    /// ```
    /// use armature_session::SessionConfig;
    ///
    /// let config = SessionConfig::new("0123456789abcdef0123456789abcdef").unwrap();
    /// assert_eq!(config.lifetime, 120);
    /// ```
    pub fn new(key: impl AsRef<[u8]>) -> SessionResult<Self> {
        let config = Self {
            key: key.as_ref().to_vec(),
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Create configuration from environment variables.
    ///
    /// - `ARMATURE_SESSION_KEY` - encoding key (required, 32 bytes)
    /// - `ARMATURE_SESSION_LIFETIME` - lifetime in minutes
    /// - `ARMATURE_SESSION_GC_INTERVAL` - GC interval in minutes
    /// - `ARMATURE_SESSION_PATH` - root directory of the default file driver
    /// - `ARMATURE_SESSION_DISABLE_DEFAULT_DRIVER=1|true`
    pub fn from_env() -> SessionResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> SessionResult<Self> {
        let key = lookup("ARMATURE_SESSION_KEY")
            .ok_or_else(|| SessionError::Config("ARMATURE_SESSION_KEY is not set".to_string()))?;

        let mut config = Self {
            key: key.into_bytes(),
            ..Default::default()
        };

        if let Some(lifetime) = parse_u64(&lookup, "ARMATURE_SESSION_LIFETIME")? {
            config.lifetime = lifetime;
        }

        if let Some(interval) = parse_u64(&lookup, "ARMATURE_SESSION_GC_INTERVAL")? {
            config.gc_interval = interval;
        }

        config.files_path = lookup("ARMATURE_SESSION_PATH").map(PathBuf::from);

        config.disable_default_driver = lookup("ARMATURE_SESSION_DISABLE_DEFAULT_DRIVER")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(false);

        config.validate()?;
        Ok(config)
    }

    /// Set the session lifetime in minutes.
    pub fn with_lifetime(mut self, minutes: u64) -> Self {
        self.lifetime = minutes;
        self
    }

    /// Set the GC interval in minutes.
    pub fn with_gc_interval(mut self, minutes: u64) -> Self {
        self.gc_interval = minutes;
        self
    }

    /// Do not register the default file driver.
    pub fn without_default_driver(mut self) -> Self {
        self.disable_default_driver = true;
        self
    }

    /// Set the root directory of the default file driver.
    pub fn with_files_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.files_path = Some(path.into());
        self
    }

    /// Set the session pool capacity.
    pub fn with_pool_capacity(mut self, capacity: usize) -> Self {
        self.pool_capacity = capacity;
        self
    }

    /// Bound every GC sweep by a timeout.
    pub fn with_gc_timeout(mut self, timeout: Duration) -> Self {
        self.gc_timeout = Some(timeout);
        self
    }

    /// Set cookie Secure flag and SameSite policy.
    pub fn with_cookie_policy(mut self, secure: bool, same_site: SameSite) -> Self {
        self.cookie_secure = secure;
        self.cookie_same_site = same_site;
        self
    }

    /// Lifetime as seconds.
    pub fn lifetime_secs(&self) -> u64 {
        self.lifetime.saturating_mul(60)
    }

    /// GC interval as a duration.
    pub fn gc_period(&self) -> Duration {
        Duration::from_secs(self.gc_interval.saturating_mul(60))
    }

    /// Check the configuration for setup errors.
    pub fn validate(&self) -> SessionResult<()> {
        if self.key.len() != KEY_LENGTH {
            return Err(SessionError::InvalidKeyLength {
                expected: KEY_LENGTH,
                actual: self.key.len(),
            });
        }

        if self.lifetime == 0 {
            return Err(SessionError::Config(
                "Session lifetime must be at least one minute".to_string(),
            ));
        }

        if self.lifetime > MAX_MINUTES {
            return Err(SessionError::Config(format!(
                "Session lifetime must not exceed {} minutes",
                MAX_MINUTES
            )));
        }

        if self.gc_interval == 0 {
            return Err(SessionError::Config(
                "GC interval must be at least one minute".to_string(),
            ));
        }

        if self.gc_interval > MAX_MINUTES {
            return Err(SessionError::Config(format!(
                "GC interval must not exceed {} minutes",
                MAX_MINUTES
            )));
        }

        Ok(())
    }
}

fn parse_u64(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> SessionResult<Option<u64>> {
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| SessionError::Config(format!("{} must be a whole number", name))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const KEY: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_defaults() {
        let config = SessionConfig::new(KEY).unwrap();
        assert_eq!(config.lifetime, 120);
        assert_eq!(config.gc_interval, 30);
        assert!(!config.disable_default_driver);
        assert_eq!(config.lifetime_secs(), 7200);
        assert_eq!(config.gc_period(), Duration::from_secs(1800));
    }

    #[test]
    fn test_bad_key_length() {
        let err = SessionConfig::new("short").unwrap_err();
        assert!(matches!(
            err,
            SessionError::InvalidKeyLength {
                expected: 32,
                actual: 5
            }
        ));
    }

    #[test]
    fn test_zero_lifetime_rejected() {
        let config = SessionConfig::new(KEY).unwrap().with_lifetime(0);
        assert!(matches!(config.validate(), Err(SessionError::Config(_))));
    }

    #[test]
    fn test_zero_gc_interval_rejected() {
        let config = SessionConfig::new(KEY).unwrap().with_gc_interval(0);
        assert!(matches!(config.validate(), Err(SessionError::Config(_))));
    }

    #[test]
    fn test_builder() {
        let config = SessionConfig::new(KEY)
            .unwrap()
            .with_lifetime(15)
            .with_gc_interval(5)
            .without_default_driver()
            .with_files_path("/var/lib/sessions")
            .with_pool_capacity(8)
            .with_gc_timeout(Duration::from_secs(10));

        assert_eq!(config.lifetime, 15);
        assert_eq!(config.gc_interval, 5);
        assert!(config.disable_default_driver);
        assert_eq!(config.files_path, Some(PathBuf::from("/var/lib/sessions")));
        assert_eq!(config.pool_capacity, 8);
        assert_eq!(config.gc_timeout, Some(Duration::from_secs(10)));
        assert!(config.validate().is_ok());
    }

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_from_lookup() {
        let config = SessionConfig::from_lookup(lookup_from(&[
            ("ARMATURE_SESSION_KEY", KEY),
            ("ARMATURE_SESSION_LIFETIME", "60"),
            ("ARMATURE_SESSION_GC_INTERVAL", " 5 "),
            ("ARMATURE_SESSION_PATH", "/tmp/app-sessions"),
            ("ARMATURE_SESSION_DISABLE_DEFAULT_DRIVER", "TRUE"),
        ]))
        .unwrap();

        assert_eq!(config.key, KEY.as_bytes());
        assert_eq!(config.lifetime, 60);
        assert_eq!(config.gc_interval, 5);
        assert_eq!(config.files_path, Some(PathBuf::from("/tmp/app-sessions")));
        assert!(config.disable_default_driver);
    }

    #[test]
    fn test_from_lookup_defaults() {
        let config = SessionConfig::from_lookup(lookup_from(&[("ARMATURE_SESSION_KEY", KEY)])).unwrap();
        assert_eq!(config.lifetime, DEFAULT_LIFETIME_MINUTES);
        assert_eq!(config.gc_interval, DEFAULT_GC_INTERVAL_MINUTES);
        assert_eq!(config.files_path, None);
        assert!(!config.disable_default_driver);
    }

    #[test]
    fn test_from_lookup_errors() {
        assert!(matches!(
            SessionConfig::from_lookup(lookup_from(&[])),
            Err(SessionError::Config(_))
        ));

        assert!(matches!(
            SessionConfig::from_lookup(lookup_from(&[
                ("ARMATURE_SESSION_KEY", KEY),
                ("ARMATURE_SESSION_LIFETIME", "two hours"),
            ])),
            Err(SessionError::Config(_))
        ));

        let huge = u64::MAX.to_string();
        assert!(matches!(
            SessionConfig::from_lookup(lookup_from(&[
                ("ARMATURE_SESSION_KEY", KEY),
                ("ARMATURE_SESSION_GC_INTERVAL", huge.as_str()),
            ])),
            Err(SessionError::Config(_))
        ));
    }

    #[test]
    fn test_huge_durations_rejected() {
        let config = SessionConfig::new(KEY).unwrap().with_lifetime(u64::MAX / 2);
        assert!(matches!(config.validate(), Err(SessionError::Config(_))));
        assert_eq!(config.lifetime_secs(), u64::MAX);

        let config = SessionConfig::new(KEY).unwrap().with_gc_interval(u64::MAX);
        assert!(matches!(config.validate(), Err(SessionError::Config(_))));

        let config = SessionConfig::new(KEY)
            .unwrap()
            .with_lifetime(MAX_MINUTES)
            .with_gc_interval(MAX_MINUTES);
        assert!(config.validate().is_ok());
        assert_eq!(config.lifetime_secs(), MAX_MINUTES * 60);
    }
}
