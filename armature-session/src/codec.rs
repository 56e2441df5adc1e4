//! Authenticated encoding of session payloads.
//!
//! Session attributes never reach a driver in plain form. The manager holds a
//! single [`Codec`] and every session it builds encodes on save and decodes
//! on start. The session name is bound into the ciphertext, so a payload
//! produced for one namespace is rejected under any other.

use crate::error::{SessionError, SessionResult};
use crate::session::Attributes;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Required encoding key length in bytes (AES-256).
pub const KEY_LENGTH: usize = 32;

const NONCE_LENGTH: usize = 12;

/// Encode/decode boundary between session attributes and stored blobs.
pub trait Codec: Send + Sync {
    /// Seal `attributes` for the namespace `name`.
    fn encode(&self, name: &str, attributes: &Attributes) -> SessionResult<String>;

    /// Open a blob previously produced by [`Codec::encode`] for `name`.
    fn decode(&self, name: &str, token: &str) -> SessionResult<Attributes>;
}

#[derive(Serialize)]
struct SealedRef<'a> {
    iat: i64,
    data: &'a Attributes,
}

#[derive(Deserialize)]
struct Sealed {
    iat: i64,
    data: Attributes,
}

/// AES-256-GCM codec with an issued-at maximum age.
///
/// Output is base64url (unpadded) of `nonce || ciphertext`. The session name
/// is passed as associated data.
pub struct SecureCodec {
    cipher: Aes256Gcm,
    max_age: i64,
}

impl SecureCodec {
    /// Create a codec from a 32-byte key.
    ///
    /// `max_age_secs` of zero disables the age check.
    pub fn new(key: &[u8], max_age_secs: u64) -> SessionResult<Self> {
        if key.len() != KEY_LENGTH {
            return Err(SessionError::InvalidKeyLength {
                expected: KEY_LENGTH,
                actual: key.len(),
            });
        }

        let cipher =
            Aes256Gcm::new_from_slice(key).map_err(|e| SessionError::Config(e.to_string()))?;

        Ok(Self {
            cipher,
            max_age: i64::try_from(max_age_secs).unwrap_or(i64::MAX),
        })
    }

    fn seal(&self, name: &str, plaintext: &[u8]) -> SessionResult<String> {
        let mut nonce_bytes = [0u8; NONCE_LENGTH];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from(nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(
                &nonce,
                Payload {
                    msg: plaintext,
                    aad: name.as_bytes(),
                },
            )
            .map_err(|e| SessionError::Serialization(e.to_string()))?;

        let mut sealed = nonce_bytes.to_vec();
        sealed.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(sealed))
    }

    fn open(&self, name: &str, token: &str) -> SessionResult<Vec<u8>> {
        let raw = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|e| SessionError::Decode(e.to_string()))?;

        if raw.len() <= NONCE_LENGTH {
            return Err(SessionError::Decode("payload too short".to_string()));
        }

        let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LENGTH);
        let nonce = Nonce::from_slice(nonce_bytes);

        self.cipher
            .decrypt(
                nonce,
                Payload {
                    msg: ciphertext,
                    aad: name.as_bytes(),
                },
            )
            .map_err(|_| SessionError::Decode("authentication failed".to_string()))
    }
}

impl Codec for SecureCodec {
    fn encode(&self, name: &str, attributes: &Attributes) -> SessionResult<String> {
        let payload = serde_json::to_vec(&SealedRef {
            iat: Utc::now().timestamp(),
            data: attributes,
        })
        .map_err(|e| SessionError::Serialization(e.to_string()))?;

        self.seal(name, &payload)
    }

    fn decode(&self, name: &str, token: &str) -> SessionResult<Attributes> {
        let plaintext = self.open(name, token)?;

        let sealed: Sealed = serde_json::from_slice(&plaintext)
            .map_err(|e| SessionError::Deserialization(e.to_string()))?;

        if self.max_age > 0 && Utc::now().timestamp() - sealed.iat > self.max_age {
            return Err(SessionError::Expired(format!(
                "payload issued at {} exceeds max age of {}s",
                sealed.iat, self.max_age
            )));
        }

        Ok(sealed.data)
    }
}

impl std::fmt::Debug for SecureCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureCodec")
            .field("max_age", &self.max_age)
            .finish_non_exhaustive()
    }
}
