//! Shared-secret key material for HMAC signatures.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::digest::KeyInit;
use hmac::Hmac;
use serde::Deserialize;
use sha2::Sha256;
use std::fmt;

use crate::domain::foundation::ValidationError;

/// How a configured secret string becomes HMAC key bytes.
///
/// Providers disagree on this and the wrong choice fails every signature,
/// so it is always configured, never guessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretEncoding {
    /// The secret's ASCII bytes are the key.
    Raw,
    /// The secret is standard base64; the decoded bytes are the key.
    Base64,
}

/// HMAC key bytes with a pre-keyed HMAC-SHA256 state. Debug output is redacted.
#[derive(Clone)]
pub struct SigningKey {
    bytes: Vec<u8>,
    keyed: Hmac<Sha256>,
}

impl SigningKey {
    pub fn from_secret(secret: &str, encoding: SecretEncoding) -> Result<Self, ValidationError> {
        if secret.is_empty() {
            return Err(ValidationError::empty_field("secret"));
        }
        let bytes = match encoding {
            SecretEncoding::Raw => secret.as_bytes().to_vec(),
            SecretEncoding::Base64 => BASE64.decode(secret.trim()).map_err(|e| {
                ValidationError::invalid_format("secret", format!("not valid base64: {}", e))
            })?,
        };
        let keyed = <Hmac<Sha256> as KeyInit>::new_from_slice(&bytes)
            .map_err(|e| ValidationError::invalid_format("secret", e.to_string()))?;
        Ok(Self { bytes, keyed })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Fresh HMAC-SHA256 state keyed with this secret.
    pub fn hmac(&self) -> Hmac<Sha256> {
        self.keyed.clone()
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningKey([REDACTED; {} bytes])", self.bytes.len())
    }
}
