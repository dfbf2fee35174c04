//! Error types for the domain layer.
//!
//! `ValidationError` is raised while constructing value objects.
//! `DomainError` carries a stable [`ErrorCode`] through handlers and ports;
//! transports map it by [`ErrorKind`] rather than by individual code.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use thiserror::Error;

/// Errors that occur during value object construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Field '{field}' cannot be empty")]
    EmptyField { field: String },

    #[error("Field '{field}' must be between {min} and {max}, got {actual}")]
    OutOfRange {
        field: String,
        min: i64,
        max: i64,
        actual: i64,
    },

    #[error("Field '{field}' has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    pub fn empty_field(field: impl Into<String>) -> Self {
        ValidationError::EmptyField { field: field.into() }
    }

    pub fn out_of_range(field: impl Into<String>, min: i64, max: i64, actual: i64) -> Self {
        ValidationError::OutOfRange {
            field: field.into(),
            min,
            max,
            actual,
        }
    }

    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Name of the offending field.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::EmptyField { field }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::InvalidFormat { field, .. } => field,
        }
    }
}

/// Broad class of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller sent something malformed.
    Invalid,
    /// Referenced purchase or diagnosis does not exist.
    Missing,
    /// Request contradicts recorded state.
    Conflict,
    Denied,
    /// Storage or internal failure. The caller may retry.
    Infrastructure,
}

/// Stable error codes. The string form appears in HTTP error bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ValidationFailed,
    EmptyField,
    OutOfRange,
    InvalidFormat,

    PurchaseNotFound,
    DiagnosisNotFound,

    /// Event would move a purchase backwards or sideways.
    InvalidStateTransition,
    /// Same provider event seen with different attribution or amount.
    ConflictingPurchase,

    Unauthorized,

    DatabaseError,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::EmptyField => "EMPTY_FIELD",
            ErrorCode::OutOfRange => "OUT_OF_RANGE",
            ErrorCode::InvalidFormat => "INVALID_FORMAT",
            ErrorCode::PurchaseNotFound => "PURCHASE_NOT_FOUND",
            ErrorCode::DiagnosisNotFound => "DIAGNOSIS_NOT_FOUND",
            ErrorCode::InvalidStateTransition => "INVALID_STATE_TRANSITION",
            ErrorCode::ConflictingPurchase => "CONFLICTING_PURCHASE",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ErrorCode::ValidationFailed
            | ErrorCode::EmptyField
            | ErrorCode::OutOfRange
            | ErrorCode::InvalidFormat => ErrorKind::Invalid,
            ErrorCode::PurchaseNotFound | ErrorCode::DiagnosisNotFound => ErrorKind::Missing,
            ErrorCode::InvalidStateTransition | ErrorCode::ConflictingPurchase => {
                ErrorKind::Conflict
            }
            ErrorCode::Unauthorized => ErrorKind::Denied,
            ErrorCode::DatabaseError | ErrorCode::InternalError => ErrorKind::Infrastructure,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by ports and handlers.
#[derive(Debug, Clone)]
pub struct DomainError {
    pub code: ErrorCode,
    pub message: String,
    /// Structured context (`purchase_key`, `from`, `to`, ...) for logs.
    pub details: HashMap<String, String>,
}

impl DomainError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: HashMap::new(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message).with_detail("field", field)
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.code.kind()
    }

    /// True if repeating the same request may succeed. Webhook deliveries
    /// failing this way are answered with 5xx so the provider redelivers.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Infrastructure
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl Error for DomainError {}

impl From<ValidationError> for DomainError {
    fn from(err: ValidationError) -> Self {
        let code = match &err {
            ValidationError::EmptyField { .. } => ErrorCode::EmptyField,
            ValidationError::OutOfRange { .. } => ErrorCode::OutOfRange,
            ValidationError::InvalidFormat { .. } => ErrorCode::InvalidFormat,
        };
        let field = err.field().to_string();
        DomainError::new(code, err.to_string()).with_detail("field", field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_message_names_bounds() {
        let err = ValidationError::out_of_range("amount_minor_units", 0, i64::MAX, -5);
        assert_eq!(err.field(), "amount_minor_units");
        assert!(err.to_string().ends_with("got -5"));
    }

    #[test]
    fn display_prefixes_code() {
        let err = DomainError::new(ErrorCode::PurchaseNotFound, "purchase p1 not found");
        assert_eq!(err.to_string(), "[PURCHASE_NOT_FOUND] purchase p1 not found");
    }

    #[test]
    fn codes_fall_into_kinds() {
        assert_eq!(ErrorCode::EmptyField.kind(), ErrorKind::Invalid);
        assert_eq!(ErrorCode::DiagnosisNotFound.kind(), ErrorKind::Missing);
        assert_eq!(ErrorCode::InvalidStateTransition.kind(), ErrorKind::Conflict);
        assert_eq!(ErrorCode::ConflictingPurchase.kind(), ErrorKind::Conflict);
        assert_eq!(ErrorCode::Unauthorized.kind(), ErrorKind::Denied);
        assert_eq!(ErrorCode::DatabaseError.kind(), ErrorKind::Infrastructure);
    }

    #[test]
    fn only_infrastructure_errors_are_retryable() {
        assert!(DomainError::database("connection reset").is_retryable());
        assert!(DomainError::internal("join error").is_retryable());
        assert!(!DomainError::validation("user_id", "missing").is_retryable());
        assert!(!DomainError::new(ErrorCode::InvalidStateTransition, "failed -> completed")
            .is_retryable());
    }

    #[test]
    fn validation_error_keeps_field_detail() {
        let err: DomainError = ValidationError::invalid_format("currency", "not ISO-4217").into();
        assert_eq!(err.code, ErrorCode::InvalidFormat);
        assert_eq!(err.details.get("field"), Some(&"currency".to_string()));
    }
}
