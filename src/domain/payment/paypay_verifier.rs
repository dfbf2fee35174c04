//! PayPay webhook authentication.

use crate::domain::foundation::Timestamp;

use super::paypay_signature::{content_digest, OpaAuthHeader, SignedRequest, OpaAuthSigner};
use super::webhook_errors::WebhookError;
use super::webhook_verifier::{check_freshness, constant_time_compare};

/// Verifies `Authorization: hmac OPA-Auth:...` plus the merchant header.
#[derive(Debug, Clone)]
pub struct PayPayVerifier {
    signer: OpaAuthSigner,
    merchant_id: String,
    webhook_path: String,
    tolerance_secs: i64,
}

impl PayPayVerifier {
    pub fn new(
        signer: OpaAuthSigner,
        merchant_id: impl Into<String>,
        webhook_path: impl Into<String>,
        tolerance_secs: i64,
    ) -> Self {
        Self {
            signer,
            merchant_id: merchant_id.into(),
            webhook_path: webhook_path.into(),
            tolerance_secs,
        }
    }

    pub fn webhook_path(&self) -> &str {
        &self.webhook_path
    }

    /// Checks identity, freshness, body hash and MAC, in that order.
    ///
    /// Credential mismatches are reported before any MAC work so that an
    /// unknown key id never reaches the comparison.
    pub fn verify(
        &self,
        payload: &[u8],
        authorization: &str,
        merchant: Option<&str>,
        now: Timestamp,
    ) -> Result<serde_json::Value, WebhookError> {
        let header = OpaAuthHeader::parse(authorization)?;

        if !constant_time_compare(header.key_id.as_bytes(), self.signer.key_id().as_bytes()) {
            return Err(WebhookError::UnknownCredential("key id".to_string()));
        }
        match merchant {
            Some(m) if constant_time_compare(m.trim().as_bytes(), self.merchant_id.as_bytes()) => {}
            Some(_) => return Err(WebhookError::UnknownCredential("merchant".to_string())),
            None => return Err(WebhookError::MissingHeader("X-ASSUME-MERCHANT")),
        }

        check_freshness(header.timestamp, now, self.tolerance_secs)?;

        let (content_type, content_hash) = content_digest(payload);
        if !constant_time_compare(content_hash.as_bytes(), header.content_hash.as_bytes()) {
            return Err(WebhookError::InvalidSignature);
        }

        let expected = SignedRequest {
            path: &self.webhook_path,
            method: "POST",
            nonce: &header.nonce,
            timestamp: header.timestamp,
            content_type,
            content_hash: &content_hash,
        }
        .mac(self.signer.key());
        if !constant_time_compare(&expected, &header.mac) {
            return Err(WebhookError::InvalidSignature);
        }

        serde_json::from_slice(payload).map_err(|e| WebhookError::ParseError(e.to_string()))
    }

    /// Header value a correctly configured sender would produce.
    pub fn sign(&self, payload: &[u8], timestamp: i64, nonce: &str) -> String {
        self.signer
            .sign("POST", &self.webhook_path, payload, timestamp, nonce)
            .to_header_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::{SecretEncoding, SigningKey};

    const SECRET: &str = "WAMx1E1jkd+cEVBFVfdMgJXhlZCSxITSn3YrqGZTz9o=";
    const NOW: i64 = 1_700_000_000;
    const BODY: &[u8] = br#"{"merchant_order_id":"mp_1","state":"COMPLETED"}"#;

    fn verifier(encoding: SecretEncoding) -> PayPayVerifier {
        let signer = OpaAuthSigner::new("a_key", SigningKey::from_secret(SECRET, encoding).unwrap());
        PayPayVerifier::new(signer, "958667152543465472", "/webhooks/paypay", 300)
    }

    fn now() -> Timestamp {
        Timestamp::from_unix_secs(NOW).unwrap()
    }

    #[test]
    fn fixed_vector_verifies_with_raw_secret() {
        let header = "hmac OPA-Auth:a_key:i3Y4gYhPG2NcGYzfpn7GfR6Q0SqyExdoZy+FuhAUaZo=:UCDPdFpdN2SzOJaMFmZYjw==:1700000000:nonce-1";
        let value = verifier(SecretEncoding::Raw)
            .verify(BODY, header, Some("958667152543465472"), now())
            .unwrap();
        assert_eq!(value["state"], "COMPLETED");
    }

    #[test]
    fn raw_signed_header_fails_under_base64_configuration() {
        let header = "hmac OPA-Auth:a_key:i3Y4gYhPG2NcGYzfpn7GfR6Q0SqyExdoZy+FuhAUaZo=:UCDPdFpdN2SzOJaMFmZYjw==:1700000000:nonce-1";
        let result = verifier(SecretEncoding::Base64).verify(
            BODY,
            header,
            Some("958667152543465472"),
            now(),
        );
        assert!(matches!(result, Err(WebhookError::InvalidSignature)));
    }

    #[test]
    fn own_signature_verifies_with_empty_nonce() {
        let v = verifier(SecretEncoding::Base64);
        let header = v.sign(BODY, NOW, "");
        assert!(v.verify(BODY, &header, Some("958667152543465472"), now()).is_ok());
    }

    #[test]
    fn unknown_key_id_is_rejected() {
        let v = verifier(SecretEncoding::Raw);
        let header = v.sign(BODY, NOW, "n").replace("a_key", "b_key");
        let result = v.verify(BODY, &header, Some("958667152543465472"), now());
        assert!(matches!(result, Err(WebhookError::UnknownCredential(_))));
    }

    #[test]
    fn merchant_mismatch_is_rejected() {
        let v = verifier(SecretEncoding::Raw);
        let header = v.sign(BODY, NOW, "n");
        let result = v.verify(BODY, &header, Some("1"), now());
        assert!(matches!(result, Err(WebhookError::UnknownCredential(_))));
    }

    #[test]
    fn missing_merchant_header_is_rejected() {
        let v = verifier(SecretEncoding::Raw);
        let header = v.sign(BODY, NOW, "n");
        let result = v.verify(BODY, &header, None, now());
        assert!(matches!(result, Err(WebhookError::MissingHeader(_))));
    }

    #[test]
    fn tampered_body_fails_content_hash() {
        let v = verifier(SecretEncoding::Raw);
        let header = v.sign(BODY, NOW, "n");
        let tampered = br#"{"merchant_order_id":"mp_2","state":"COMPLETED"}"#;
        let result = v.verify(tampered, &header, Some("958667152543465472"), now());
        assert!(matches!(result, Err(WebhookError::InvalidSignature)));
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let v = verifier(SecretEncoding::Raw);
        let header = v.sign(BODY, NOW - 301, "n");
        let result = v.verify(BODY, &header, Some("958667152543465472"), now());
        assert!(matches!(result, Err(WebhookError::TimestampOutOfRange)));
    }

    #[test]
    fn signature_for_other_path_is_rejected() {
        let v = verifier(SecretEncoding::Raw);
        let header = OpaAuthSigner::new(
            "a_key",
            SigningKey::from_secret(SECRET, SecretEncoding::Raw).unwrap(),
        )
        .sign("POST", "/elsewhere", BODY, NOW, "n")
        .to_header_value();
        let result = v.verify(BODY, &header, Some("958667152543465472"), now());
        assert!(matches!(result, Err(WebhookError::InvalidSignature)));
    }
}
