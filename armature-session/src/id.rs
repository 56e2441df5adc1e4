//! Session ID generation and validation.

use rand::Rng;
use rand::distr::Alphanumeric;

/// Length of every session ID and CSRF token.
pub const SESSION_ID_LENGTH: usize = 32;

/// Generate a new unpredictable session ID.
///
/// IDs are 32 characters drawn from `[0-9A-Za-z]` using the thread-local
/// CSPRNG.
pub fn generate_session_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_ID_LENGTH)
        .map(char::from)
        .collect()
}

/// Check whether a string has the shape of a generated session ID.
pub fn is_valid_session_id(id: &str) -> bool {
    id.len() == SESSION_ID_LENGTH && id.bytes().all(|b| b.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_valid() {
        for _ in 0..100 {
            let id = generate_session_id();
            assert_eq!(id.len(), SESSION_ID_LENGTH);
            assert!(is_valid_session_id(&id));
        }
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = generate_session_id();
        let b = generate_session_id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_invalid_ids() {
        assert!(!is_valid_session_id(""));
        assert!(!is_valid_session_id("abc"));
        assert!(!is_valid_session_id(&"a".repeat(33)));
        assert!(!is_valid_session_id("../../../../../../../etc/passwd"));
        assert!(!is_valid_session_id("0123456789abcdef0123456789abcde-"));
        assert!(!is_valid_session_id("0123456789abcdef0123456789abcdé"));
        assert!(is_valid_session_id("0123456789abcdefABCDEF0123456789"));
    }
}
