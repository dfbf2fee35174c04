//! Notification configuration

use secrecy::SecretString;
use serde::Deserialize;

/// Purchase-completed notifications. Disabled when no token is set.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    /// LINE Messaging API channel access token
    pub line_channel_access_token: Option<SecretString>,

    #[serde(default = "default_line_push_url")]
    pub line_push_url: String,
}

impl NotificationConfig {
    pub fn line_enabled(&self) -> bool {
        self.line_channel_access_token.is_some()
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            line_channel_access_token: None,
            line_push_url: default_line_push_url(),
        }
    }
}

fn default_line_push_url() -> String {
    crate::adapters::notify::DEFAULT_LINE_PUSH_URL.to_string()
}
