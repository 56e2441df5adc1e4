// Armature Sessions - server-side session storage for Armature applications
//
// This library re-exports the session manager, the storage drivers and the
// supporting codec and configuration types.

// Re-export session functionality
pub use armature_session::*;

// Serialization types used in session attributes
pub use serde_json::{Value, json};

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        Attributes,
        Codec,
        Driver,
        FileDriver,
        SameSite,
        SecureCodec,
        Session,
        SessionConfig,
        SessionCookie,
        SessionError,
        SessionManager,
        SessionResult,
        // Flash and token keys
        FLASH_NEW_KEY,
        FLASH_OLD_KEY,
        TOKEN_KEY,
    };
    pub use serde_json::json;
}
