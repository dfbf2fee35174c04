//! Operator API configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;

pub const MIN_ADMIN_TOKEN_LEN: usize = 24;

/// Admin routes are mounted only when a token is configured.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminConfig {
    pub token: Option<SecretString>,
}

impl AdminConfig {
    pub fn enabled(&self) -> bool {
        self.token.is_some()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match &self.token {
            Some(token) if token.expose_secret().len() < MIN_ADMIN_TOKEN_LEN => {
                Err(ValidationError::AdminTokenTooShort(MIN_ADMIN_TOKEN_LEN))
            }
            _ => Ok(()),
        }
    }
}
