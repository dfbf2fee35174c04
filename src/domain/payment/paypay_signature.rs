//! PayPay `OPA-Auth` HMAC scheme.
//!
//! Both directions sign the same canonical string:
//!
//! ```text
//! <path>\n<method>\n<nonce>\n<timestamp>\n<content-type>\n<content-hash>
//! ```
//!
//! `content-hash` is base64(MD5(content-type ‖ body)); an empty body uses the
//! literal `empty` for both content type and hash. The MAC is base64 of
//! HMAC-SHA256 over the canonical string.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::Mac;
use md5::{Digest, Md5};

use super::signing_key::SigningKey;
use super::webhook_errors::WebhookError;

pub const OPA_AUTH_PREFIX: &str = "hmac OPA-Auth:";
pub const MERCHANT_HEADER: &str = "X-ASSUME-MERCHANT";
pub const JSON_CONTENT_TYPE: &str = "application/json";
const EMPTY: &str = "empty";

/// Content type and content hash for a body.
pub fn content_digest(body: &[u8]) -> (&'static str, String) {
    if body.is_empty() {
        return (EMPTY, EMPTY.to_string());
    }
    let mut hasher = Md5::new();
    hasher.update(JSON_CONTENT_TYPE.as_bytes());
    hasher.update(body);
    (JSON_CONTENT_TYPE, BASE64.encode(hasher.finalize()))
}

/// Inputs to the canonical string.
#[derive(Debug, Clone, Copy)]
pub struct SignedRequest<'a> {
    pub path: &'a str,
    pub method: &'a str,
    pub nonce: &'a str,
    pub timestamp: i64,
    pub content_type: &'a str,
    pub content_hash: &'a str,
}

impl SignedRequest<'_> {
    pub fn canonical_string(&self) -> String {
        [
            self.path,
            self.method,
            self.nonce,
            &self.timestamp.to_string(),
            self.content_type,
            self.content_hash,
        ]
        .join("\n")
    }

    pub fn mac(&self, key: &SigningKey) -> Vec<u8> {
        let mut mac = key.hmac();
        mac.update(self.canonical_string().as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

/// Parsed inbound `Authorization` value.
///
/// Layout: `hmac OPA-Auth:<keyId>:<mac-base64>:<contentHash>:<timestamp>:<nonce-or-empty>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpaAuthHeader {
    pub key_id: String,
    pub mac: Vec<u8>,
    pub content_hash: String,
    pub timestamp: i64,
    pub nonce: String,
}

impl OpaAuthHeader {
    pub fn parse(value: &str) -> Result<Self, WebhookError> {
        let rest = value
            .trim()
            .strip_prefix(OPA_AUTH_PREFIX)
            .ok_or_else(|| WebhookError::MalformedHeader("missing OPA-Auth prefix".to_string()))?;

        let fields: Vec<&str> = rest.split(':').collect();
        let [key_id, mac, content_hash, timestamp, nonce] = fields.as_slice() else {
            return Err(WebhookError::MalformedHeader(format!(
                "expected 5 OPA-Auth fields, got {}",
                fields.len()
            )));
        };

        if key_id.is_empty() {
            return Err(WebhookError::MalformedHeader("empty key id".to_string()));
        }
        let mac = BASE64
            .decode(mac)
            .map_err(|_| WebhookError::MalformedHeader("invalid mac base64".to_string()))?;
        let timestamp = timestamp
            .parse()
            .map_err(|_| WebhookError::MalformedHeader("invalid timestamp".to_string()))?;

        Ok(Self {
            key_id: key_id.to_string(),
            mac,
            content_hash: content_hash.to_string(),
            timestamp,
            nonce: nonce.to_string(),
        })
    }

    /// Renders the inbound layout.
    pub fn to_header_value(&self) -> String {
        format!(
            "{}{}:{}:{}:{}:{}",
            OPA_AUTH_PREFIX,
            self.key_id,
            BASE64.encode(&self.mac),
            self.content_hash,
            self.timestamp,
            self.nonce
        )
    }
}

/// Signs requests with one API key.
#[derive(Debug, Clone)]
pub struct OpaAuthSigner {
    key_id: String,
    key: SigningKey,
}

impl OpaAuthSigner {
    pub fn new(key_id: impl Into<String>, key: SigningKey) -> Self {
        Self {
            key_id: key_id.into(),
            key,
        }
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn key(&self) -> &SigningKey {
        &self.key
    }

    /// Builds a parsed header for an inbound-style request.
    pub fn sign(
        &self,
        method: &str,
        path: &str,
        body: &[u8],
        timestamp: i64,
        nonce: &str,
    ) -> OpaAuthHeader {
        let (content_type, content_hash) = content_digest(body);
        let mac = SignedRequest {
            path,
            method,
            nonce,
            timestamp,
            content_type,
            content_hash: &content_hash,
        }
        .mac(&self.key);

        OpaAuthHeader {
            key_id: self.key_id.clone(),
            mac,
            content_hash,
            timestamp,
            nonce: nonce.to_string(),
        }
    }

    /// `Authorization` value for calls to the PayPay API.
    ///
    /// The API expects `<keyId>:<mac>:<nonce>:<timestamp>:<contentHash>`.
    pub fn api_authorization(
        &self,
        method: &str,
        path: &str,
        body: &[u8],
        timestamp: i64,
        nonce: &str,
    ) -> String {
        let header = self.sign(method, path, body, timestamp, nonce);
        format!(
            "{}{}:{}:{}:{}:{}",
            OPA_AUTH_PREFIX,
            header.key_id,
            BASE64.encode(&header.mac),
            header.nonce,
            header.timestamp,
            header.content_hash
        )
    }
}
