//! LINE Messaging API push notifier.
//!
//! Purchasers are LINE users; their user id doubles as the push target.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use crate::domain::foundation::DomainError;
use crate::domain::payment::Purchase;
use crate::ports::PaymentNotifier;

pub const DEFAULT_LINE_PUSH_URL: &str = "https://api.line.me/v2/bot/message/push";

#[derive(Debug, Serialize)]
struct PushRequest<'a> {
    to: &'a str,
    messages: Vec<TextMessage>,
}

#[derive(Debug, Serialize)]
struct TextMessage {
    #[serde(rename = "type")]
    kind: &'static str,
    text: String,
}

pub struct LineNotifier {
    channel_access_token: SecretString,
    push_url: String,
    http_client: reqwest::Client,
}

impl LineNotifier {
    pub fn new(channel_access_token: SecretString) -> Self {
        Self {
            channel_access_token,
            push_url: DEFAULT_LINE_PUSH_URL.to_string(),
            http_client: reqwest::Client::new(),
        }
    }

    pub fn with_push_url(mut self, url: impl Into<String>) -> Self {
        self.push_url = url.into();
        self
    }
}

/// Message body for an unlocked report.
pub fn completion_message(purchase: &Purchase) -> String {
    let amount = purchase.amount.amount_minor_units();
    let price = if purchase.amount.currency().as_str() == "JPY" {
        format!("¥{}", group_thousands(amount))
    } else {
        purchase.amount.to_string()
    };
    format!(
        "お支払いを確認しました。\n診断レポート（{}）の完全版をご覧いただけます。\n金額: {}",
        purchase.diagnosis_id, price
    )
}

fn group_thousands(value: i64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[async_trait]
impl PaymentNotifier for LineNotifier {
    async fn purchase_completed(&self, purchase: &Purchase) -> Result<(), DomainError> {
        let request = PushRequest {
            to: purchase.user_id.as_str(),
            messages: vec![TextMessage {
                kind: "text",
                text: completion_message(purchase),
            }],
        };

        let response = self
            .http_client
            .post(&self.push_url)
            .bearer_auth(self.channel_access_token.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                DomainError::internal(format!("LINE push failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DomainError::internal(format!(
                "LINE push rejected with {}: {}",
                status, body
            )));
        }

        Ok(())
    }
}
