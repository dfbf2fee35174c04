//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables with the
//! `config` and `dotenvy` crates. Variables use the `ENTITLEMENT_LEDGER`
//! prefix and `__` between nested keys.
//!
//! # Example
//!
//! ```no_run
//! use entitlement_ledger::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod admin;
mod database;
mod error;
mod notification;
mod paypay;
mod reconciler;
mod server;
mod stripe;

pub use admin::{AdminConfig, MIN_ADMIN_TOKEN_LEN};
pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use notification::NotificationConfig;
pub use paypay::PayPayConfig;
pub use reconciler::ReconcilerSettings;
pub use server::{Environment, LogFormat, ServerConfig};
pub use stripe::StripeConfig;

use serde::Deserialize;

/// Where ledger rows and access rights live.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    #[default]
    Postgres,
    /// Process-local maps; for development and tests only.
    Memory,
}

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageMode,

    /// Required when `storage` is `postgres`
    pub database: Option<DatabaseConfig>,

    pub stripe: Option<StripeConfig>,

    pub paypay: Option<PayPayConfig>,

    #[serde(default)]
    pub reconciler: ReconcilerSettings,

    #[serde(default)]
    pub notification: NotificationConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// - `ENTITLEMENT_LEDGER__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `ENTITLEMENT_LEDGER__STRIPE__WEBHOOK_SECRET=...` -> `stripe.webhook_secret = ...`
    ///
    /// A `.env` file is read first when present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("ENTITLEMENT_LEDGER")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns the first `ValidationError` found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;

        match (self.storage, &self.database) {
            (StorageMode::Postgres, Some(database)) => database.validate()?,
            (StorageMode::Postgres, None) => {
                return Err(ValidationError::MissingRequired("DATABASE__URL"))
            }
            (StorageMode::Memory, _) if self.is_production() => {
                return Err(ValidationError::MemoryStorageInProduction)
            }
            (StorageMode::Memory, _) => {}
        }

        if self.stripe.is_none() && self.paypay.is_none() {
            return Err(ValidationError::NoProviderConfigured);
        }
        if let Some(stripe) = &self.stripe {
            stripe.validate()?;
        }
        if let Some(paypay) = &self.paypay {
            paypay.validate()?;
        }

        self.reconciler.validate()?;
        self.admin.validate()?;
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}
