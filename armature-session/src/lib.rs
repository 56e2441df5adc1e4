//! Server-side session storage for Armature applications.
//!
//! A [`SessionManager`] owns a registry of storage [`Driver`]s and builds
//! [`Session`]s bound to one of them. Each request starts its session, reads
//! and mutates attributes, then saves it. Payloads are sealed with a
//! [`Codec`] before they reach a driver, and every registered driver is swept
//! for stale records on a fixed interval in the background.
//!
//! # Features
//!
//! - **Flash data** - values that live for exactly one following request
//! - **ID rotation** - [`Session::regenerate`] and [`Session::invalidate`]
//! - **File driver** - [`FileDriver`], registered as `"default"`
//! - **Pluggable drivers** - implement [`Driver`] and register it with
//!   [`SessionManager::extend`]
//! - **Pooling** - released sessions are reset and reused
//! - `subscriber` - [`logging::init`] installs a `tracing` subscriber
//!   (enabled by default)
//!
//! # Examples
//!
//! ```no_run
//! use armature_session::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), SessionError> {
//!     let config = SessionConfig::new("0123456789abcdef0123456789abcdef")?
//!         .with_files_path("/var/lib/myapp/sessions");
//!     let manager = SessionManager::new(config)?;
//!
//!     // Request 1: sign in and leave a message for the next page
//!     let mut session = manager.build_session("session", None, None)?;
//!     session.start()?;
//!     session.put("user_id", 123)?;
//!     session.flash("status", "Welcome back!")?;
//!     session.regenerate(true)?;
//!     let cookie = manager.cookie(&session);
//!     session.save()?;
//!     manager.release_session(session);
//!
//!     // Request 2: the browser sends the cookie back
//!     let mut session = manager.build_session("session", None, Some(cookie.value.as_str()))?;
//!     session.start()?;
//!     let user_id: Option<i64> = session.get("user_id");
//!     let status: Option<String> = session.get("status");
//!     println!("user {:?}: {:?}", user_id, status);
//!     session.save()?;
//!     manager.release_session(session);
//!
//!     manager.shutdown().await
//! }
//! ```

pub mod codec;
pub mod config;
pub mod cookie;
pub mod driver;
pub mod error;
pub mod file_driver;
pub mod gc;
pub mod id;
pub mod manager;
pub mod pool;
pub mod session;

#[cfg(feature = "subscriber")]
pub mod logging;

#[cfg(test)]
mod test_support;

pub use codec::{Codec, KEY_LENGTH, SecureCodec};
pub use config::SessionConfig;
pub use cookie::{SameSite, SessionCookie};
pub use driver::{Clock, Driver, ManualClock, SystemClock};
pub use error::{SessionError, SessionResult};
pub use file_driver::FileDriver;
pub use gc::GcTask;
pub use id::{SESSION_ID_LENGTH, generate_session_id, is_valid_session_id};
pub use manager::{DEFAULT_DRIVER, SessionManager};
pub use pool::SessionPool;
pub use session::{Attributes, FLASH_NEW_KEY, FLASH_OLD_KEY, Session, TOKEN_KEY};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::codec::{Codec, SecureCodec};
    pub use crate::config::SessionConfig;
    pub use crate::driver::Driver;
    pub use crate::error::{SessionError, SessionResult};
    pub use crate::file_driver::FileDriver;
    pub use crate::manager::SessionManager;
    pub use crate::session::{Attributes, Session};
}
