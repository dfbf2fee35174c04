//! Error types for the inbound payment pipeline.
//!
//! Every failure maps to an HTTP status the provider understands: `2xx`
//! stops redelivery, anything else asks for another attempt.

use axum::http::StatusCode;
use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode};

/// Errors that occur while verifying, normalizing or settling a delivery.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Signature did not match the configured secret.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Signed timestamp older than the replay tolerance.
    #[error("Timestamp out of range")]
    TimestampOutOfRange,

    /// Signed timestamp further in the future than the tolerance.
    #[error("Invalid timestamp")]
    InvalidTimestamp,

    /// Authentication header absent.
    #[error("Missing header: {0}")]
    MissingHeader(&'static str),

    /// Authentication header present but unparsable.
    #[error("Malformed header: {0}")]
    MalformedHeader(String),

    /// Key id or merchant id does not belong to this deployment.
    #[error("Unknown credential: {0}")]
    UnknownCredential(String),

    /// Body is not the JSON we expect.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Required field missing from the payload.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// Required attribution metadata missing from the payload.
    #[error("Missing metadata: {0}")]
    MissingMetadata(&'static str),

    /// Acknowledged without any state change.
    #[error("Event ignored: {0}")]
    Ignored(String),

    /// Event contradicts stored state, or would grant a non-existent resource.
    #[error("State integrity violation: {0}")]
    StateIntegrity(String),

    /// Storage failure; the provider should redeliver.
    #[error("Database error: {0}")]
    Database(String),
}

impl WebhookError {
    /// True for failures of origin or freshness.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            WebhookError::InvalidSignature
                | WebhookError::TimestampOutOfRange
                | WebhookError::InvalidTimestamp
                | WebhookError::MissingHeader(_)
                | WebhookError::MalformedHeader(_)
                | WebhookError::UnknownCredential(_)
        )
    }

    /// Returns true if a redelivery could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WebhookError::Database(_))
    }

    /// Maps the error to the HTTP status returned to the provider.
    pub fn status_code(&self) -> StatusCode {
        match self {
            // Auth failures - don't retry
            WebhookError::InvalidSignature
            | WebhookError::TimestampOutOfRange
            | WebhookError::MissingHeader(_)
            | WebhookError::MalformedHeader(_)
            | WebhookError::UnknownCredential(_) => StatusCode::UNAUTHORIZED,

            // Future timestamp - don't retry
            WebhookError::InvalidTimestamp => StatusCode::BAD_REQUEST,

            // Bad request - don't retry
            WebhookError::ParseError(_)
            | WebhookError::MissingField(_)
            | WebhookError::MissingMetadata(_) => StatusCode::BAD_REQUEST,

            // Ignored events are acknowledged as success
            WebhookError::Ignored(_) => StatusCode::OK,

            // Server errors - will retry
            WebhookError::StateIntegrity(_) | WebhookError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable code for response bodies.
    pub fn code(&self) -> &'static str {
        match self {
            WebhookError::InvalidSignature => "INVALID_SIGNATURE",
            WebhookError::TimestampOutOfRange => "TIMESTAMP_OUT_OF_RANGE",
            WebhookError::InvalidTimestamp => "INVALID_TIMESTAMP",
            WebhookError::MissingHeader(_) => "MISSING_HEADER",
            WebhookError::MalformedHeader(_) => "MALFORMED_HEADER",
            WebhookError::UnknownCredential(_) => "UNKNOWN_CREDENTIAL",
            WebhookError::ParseError(_) => "MALFORMED_PAYLOAD",
            WebhookError::MissingField(_) => "MISSING_FIELD",
            WebhookError::MissingMetadata(_) => "MISSING_METADATA",
            WebhookError::Ignored(_) => "IGNORED",
            WebhookError::StateIntegrity(_) => "STATE_INTEGRITY",
            WebhookError::Database(_) => "DATABASE_ERROR",
        }
    }
}

/// Converts repository errors into pipeline errors.
impl From<DomainError> for WebhookError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::InvalidStateTransition
            | ErrorCode::DiagnosisNotFound
            | ErrorCode::ConflictingPurchase => WebhookError::StateIntegrity(err.message),
            ErrorCode::ValidationFailed
            | ErrorCode::EmptyField
            | ErrorCode::OutOfRange
            | ErrorCode::InvalidFormat => WebhookError::ParseError(err.message),
            _ => WebhookError::Database(err.to_string()),
        }
    }
}
