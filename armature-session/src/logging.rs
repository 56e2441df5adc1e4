//! Tracing subscriber setup.
//!
//! The crate emits `tracing` events only. Applications that do not install
//! their own subscriber can call [`init`].

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable holding the session log filter.
pub const LOG_ENV: &str = "ARMATURE_SESSION_LOG";

/// Filter from `ARMATURE_SESSION_LOG`, then `RUST_LOG`, defaulting to `info`.
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install a formatting subscriber as the global default.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init() -> bool {
    let color = std::env::var("NO_COLOR").is_err();

    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_ansi(color).with_target(true))
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_refused() {
        let _ = init();
        assert!(!init());
    }

    #[test]
    fn test_env_filter_builds() {
        let _filter = env_filter();
    }
}
