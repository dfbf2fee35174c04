//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Request timeout must be between 1 and 60 seconds")]
    InvalidTimeout,

    #[error("Request body limit must be between 1 byte and 4 MiB")]
    InvalidBodyLimit,

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Invalid database pool setting: {0}")]
    InvalidPoolSetting(&'static str),

    #[error("Memory storage is not allowed in production")]
    MemoryStorageInProduction,

    #[error("No payment provider configured")]
    NoProviderConfigured,

    #[error("Invalid Stripe API key format")]
    InvalidStripeKey,

    #[error("Invalid Stripe webhook secret format")]
    InvalidStripeWebhookSecret,

    #[error("Secret {field} does not match its declared encoding: {reason}")]
    SecretEncodingMismatch { field: &'static str, reason: String },

    #[error("Webhook path must start with '/'")]
    InvalidWebhookPath,

    #[error("Signature tolerance must be between 1 and 3600 seconds")]
    InvalidTolerance,

    #[error("Invalid reconciler setting: {0}")]
    InvalidReconcilerSetting(&'static str),

    #[error("Admin token must be at least {0} characters")]
    AdminTokenTooShort(usize),
}
