//! Per-request session state.
//!
//! A [`Session`] is an attribute bag bound to a storage driver and a codec.
//! It is loaded with [`Session::start`], mutated while a request is handled,
//! and persisted with [`Session::save`].
//!
//! # Flash data
//!
//! Flashed values live for exactly one following save cycle. Two reserved
//! attributes track them:
//!
//! - `_flash.new` lists keys flashed during the current cycle,
//! - `_flash.old` lists keys that are removed at the next save.
//!
//! Every save first forgets the keys in `_flash.old`, then moves
//! `_flash.new` into `_flash.old`. A value flashed in request N is therefore
//! still present when request N+1 starts and is gone once request N+1 saves.
//!
//! ```
//! use armature_session::{FileDriver, SecureCodec, Session};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let dir = tempfile::tempdir()?;
//! let driver = Arc::new(FileDriver::new(dir.path(), 120)?);
//! let codec = Arc::new(SecureCodec::new(b"0123456789abcdef0123456789abcdef", 7200)?);
//!
//! let mut session = Session::new("session", driver.clone(), codec.clone(), None);
//! session.start()?;
//! session.flash("status", "Profile updated")?;
//! session.save()?;
//!
//! let mut next = Session::new("session", driver, codec, Some(session.id()));
//! next.start()?;
//! assert_eq!(next.get::<String>("status").as_deref(), Some("Profile updated"));
//! # Ok(())
//! # }
//! ```

use crate::codec::Codec;
use crate::driver::Driver;
use crate::error::{SessionError, SessionResult};
use crate::id::{generate_session_id, is_valid_session_id};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Session attribute bag.
pub type Attributes = HashMap<String, Value>;

/// Attribute holding the per-session CSRF token.
pub const TOKEN_KEY: &str = "_token";

/// Attribute listing keys removed at the next save.
pub const FLASH_OLD_KEY: &str = "_flash.old";

/// Attribute listing keys flashed during the current cycle.
pub const FLASH_NEW_KEY: &str = "_flash.new";

/// Session bound to a driver and codec.
///
/// A session belongs to a single request; every mutator takes `&mut self`.
pub struct Session {
    id: String,
    name: String,
    attributes: Attributes,
    driver: Option<Arc<dyn Driver>>,
    codec: Option<Arc<dyn Codec>>,
    started: bool,
}

impl Session {
    /// Create a session bound to `driver` and `codec`.
    ///
    /// `id` is accepted only if it is a well-formed session ID; otherwise a
    /// new ID is generated.
    pub fn new(
        name: impl Into<String>,
        driver: Arc<dyn Driver>,
        codec: Arc<dyn Codec>,
        id: Option<&str>,
    ) -> Self {
        let mut session = Self::empty();
        session.bind(name, driver, codec, id);
        session
    }

    /// Unbound shell, as handed out by the pool.
    pub(crate) fn empty() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            attributes: Attributes::new(),
            driver: None,
            codec: None,
            started: false,
        }
    }

    pub(crate) fn bind(
        &mut self,
        name: impl Into<String>,
        driver: Arc<dyn Driver>,
        codec: Arc<dyn Codec>,
        id: Option<&str>,
    ) {
        self.name = name.into();
        self.driver = Some(driver);
        self.codec = Some(codec);
        self.set_id(id.unwrap_or_default());
    }

    /// Drop every trace of the previous request.
    pub(crate) fn reset(&mut self) {
        self.id.clear();
        self.name.clear();
        self.attributes.clear();
        self.driver = None;
        self.codec = None;
        self.started = false;
    }

    /// Whether the session is bound to a driver and codec.
    pub fn is_bound(&self) -> bool {
        self.driver.is_some() && self.codec.is_some()
    }

    // ========== Identity ==========

    /// Session ID.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Use `id` if it is well formed, otherwise generate a fresh one.
    pub fn set_id(&mut self, id: &str) -> &mut Self {
        if is_valid_session_id(id) {
            self.id.clear();
            self.id.push_str(id);
        } else {
            self.id = generate_session_id();
        }
        self
    }

    /// Session name (namespace and cookie name).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Change the session name.
    pub fn set_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = name.into();
        self
    }

    /// Whether the session has been started and not yet saved.
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// CSRF token, present once the session has been started.
    pub fn token(&self) -> Option<&str> {
        self.attributes.get(TOKEN_KEY).and_then(Value::as_str)
    }

    /// Replace the CSRF token.
    pub fn regenerate_token(&mut self) -> &mut Self {
        self.put_value(TOKEN_KEY, Value::String(generate_session_id()))
    }

    // ========== Attributes ==========

    /// All attributes, including the reserved ones.
    pub fn all(&self) -> &Attributes {
        &self.attributes
    }

    /// Whether the key is present, even if its value is `null`.
    pub fn exists(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    /// Whether the key is absent.
    pub fn missing(&self, key: &str) -> bool {
        !self.exists(key)
    }

    /// Whether the key is present with a non-null value.
    pub fn has(&self, key: &str) -> bool {
        matches!(self.attributes.get(key), Some(value) if !value.is_null())
    }

    /// Raw attribute value.
    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Attribute converted to `T`; `None` when absent or of another shape.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Attribute converted to `T`, or `default`.
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// Set an attribute from any serializable value.
    pub fn put<T: Serialize>(&mut self, key: impl Into<String>, value: T) -> SessionResult<()> {
        let value =
            serde_json::to_value(value).map_err(|e| SessionError::Serialization(e.to_string()))?;
        self.put_value(key, value);
        Ok(())
    }

    /// Set an attribute.
    pub fn put_value(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Remove the given keys.
    pub fn forget<I>(&mut self, keys: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        for key in keys {
            self.attributes.remove(key.as_ref());
        }
        self
    }

    /// Copy of the attributes whose keys are listed.
    pub fn only<I>(&self, keys: I) -> Attributes
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        keys.into_iter()
            .filter_map(|key| {
                let key = key.as_ref();
                self.attributes
                    .get(key)
                    .map(|value| (key.to_string(), value.clone()))
            })
            .collect()
    }

    /// Remove an attribute and return it.
    pub fn pull(&mut self, key: &str) -> Option<Value> {
        self.attributes.remove(key)
    }

    /// Remove an attribute and return it, or `default` if it was absent.
    pub fn pull_or(&mut self, key: &str, default: Value) -> Value {
        self.pull(key).unwrap_or(default)
    }

    /// Alias of [`Session::pull`].
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.pull(key)
    }

    /// Remove every attribute.
    pub fn flush(&mut self) -> &mut Self {
        self.attributes.clear();
        self
    }

    // ========== Flash data ==========

    /// Set a value that survives the next save cycle only.
    pub fn flash<T: Serialize>(&mut self, key: impl Into<String>, value: T) -> SessionResult<()> {
        let key = key.into();
        self.put(key.clone(), value)?;

        let mut new = self.flash_keys(FLASH_NEW_KEY);
        if !new.contains(&key) {
            new.push(key.clone());
        }
        self.set_flash_keys(FLASH_NEW_KEY, new);

        self.remove_from_old_flash_data(&[key]);
        Ok(())
    }

    /// Set a value that is removed when the current cycle saves.
    pub fn now<T: Serialize>(&mut self, key: impl Into<String>, value: T) -> SessionResult<()> {
        let key = key.into();
        self.put(key.clone(), value)?;

        let mut old = self.flash_keys(FLASH_OLD_KEY);
        if !old.contains(&key) {
            old.push(key);
        }
        self.set_flash_keys(FLASH_OLD_KEY, old);
        Ok(())
    }

    /// Keep already flashed keys for one more cycle.
    pub fn keep<I>(&mut self, keys: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let keys: Vec<String> = keys.into_iter().map(|k| k.as_ref().to_string()).collect();
        self.merge_new_flashes(&keys);
        self.remove_from_old_flash_data(&keys);
        self
    }

    /// Keep every flashed key of the previous cycle for one more cycle.
    pub fn reflash(&mut self) -> &mut Self {
        let old = self.flash_keys(FLASH_OLD_KEY);
        self.merge_new_flashes(&old);
        self.set_flash_keys(FLASH_OLD_KEY, Vec::new());
        self
    }

    fn age_flash_data(&mut self) {
        let old = self.flash_keys(FLASH_OLD_KEY);
        self.forget(&old);

        let new = self.flash_keys(FLASH_NEW_KEY);
        self.set_flash_keys(FLASH_OLD_KEY, new);
        self.set_flash_keys(FLASH_NEW_KEY, Vec::new());
    }

    fn merge_new_flashes(&mut self, keys: &[String]) {
        let mut new = self.flash_keys(FLASH_NEW_KEY);
        for key in keys {
            if !new.contains(key) {
                new.push(key.clone());
            }
        }
        self.set_flash_keys(FLASH_NEW_KEY, new);
    }

    fn remove_from_old_flash_data(&mut self, keys: &[String]) {
        let mut old = self.flash_keys(FLASH_OLD_KEY);
        old.retain(|key| !keys.contains(key));
        self.set_flash_keys(FLASH_OLD_KEY, old);
    }

    fn flash_keys(&self, list: &str) -> Vec<String> {
        match self.attributes.get(list) {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(key) => key.clone(),
                    other => other.to_string(),
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    fn set_flash_keys(&mut self, list: &str, keys: Vec<String>) {
        self.attributes.insert(list.to_string(), Value::from(keys));
    }

    // ========== Lifecycle ==========

    /// Load persisted attributes and mark the session started.
    ///
    /// A missing, expired, unreadable or undecodable record counts as an
    /// empty session. A CSRF token is generated if none was loaded.
    pub fn start(&mut self) -> SessionResult<()> {
        let (driver, codec) = self.handles()?;
        self.load_session(driver.as_ref(), codec.as_ref());

        if !self.has(TOKEN_KEY) {
            self.regenerate_token();
        }

        self.started = true;
        Ok(())
    }

    /// Age flash data, encode the attributes and write them to the driver.
    pub fn save(&mut self) -> SessionResult<()> {
        let (driver, codec) = self.handles()?;
        self.age_flash_data();

        let data = codec.encode(&self.name, &self.attributes)?;
        driver.write(&self.id, &data)?;

        debug!(session = %self.name, "Session saved");
        self.started = false;
        Ok(())
    }

    /// Move the session to a new ID and CSRF token, keeping its attributes.
    ///
    /// With `destroy` the record under the old ID is removed first.
    pub fn regenerate(&mut self, destroy: bool) -> SessionResult<()> {
        self.migrate(destroy)?;
        self.regenerate_token();
        Ok(())
    }

    /// Remove every attribute, destroy the stored record and move to a new ID.
    pub fn invalidate(&mut self) -> SessionResult<()> {
        self.handles()?;
        self.flush();
        self.migrate(true)
    }

    fn migrate(&mut self, destroy: bool) -> SessionResult<()> {
        if destroy {
            let (driver, _) = self.handles()?;
            driver.destroy(&self.id)?;
        }

        self.id = generate_session_id();
        debug!(session = %self.name, destroyed = destroy, "Session ID regenerated");
        Ok(())
    }

    fn load_session(&mut self, driver: &dyn Driver, codec: &dyn Codec) {
        let blob = match driver.read(&self.id) {
            Ok(blob) => blob,
            Err(e) if e.is_not_found() => return,
            Err(e) => {
                warn!(session = %self.name, error = %e, "Failed to read session; starting empty");
                return;
            }
        };

        match codec.decode(&self.name, &blob) {
            Ok(data) => self.attributes.extend(data),
            Err(e) => debug!(session = %self.name, error = %e, "Discarding undecodable session"),
        }
    }

    fn handles(&self) -> SessionResult<(Arc<dyn Driver>, Arc<dyn Codec>)> {
        match (&self.driver, &self.codec) {
            (Some(driver), Some(codec)) => Ok((driver.clone(), codec.clone())),
            _ => Err(SessionError::Unbound),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("attributes", &self.attributes.len())
            .field("started", &self.started)
            .field("bound", &self.is_bound())
            .finish()
    }
}
