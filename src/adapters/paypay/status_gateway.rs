//! PayPay payment detail queries.
//!
//! `GET /v2/codes/payments/{merchantPaymentId}` signed with OPA-Auth and
//! scoped to the merchant via `X-ASSUME-MERCHANT`.

use async_trait::async_trait;
use serde::Deserialize;

use crate::adapters::provider_http::{send_error, status_error};
use crate::domain::foundation::Timestamp;
use crate::domain::payment::{
    Currency, Money, OpaAuthSigner, PaymentProvider, StatusReport, MERCHANT_HEADER,
};
use crate::ports::{GatewayError, PaymentStatusGateway};

pub const DEFAULT_PAYPAY_API_BASE: &str = "https://stg-api.sandbox.paypay.ne.jp";

const PAYMENT_DETAILS_PATH: &str = "/v2/codes/payments";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultInfo {
    code: String,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PayPayAmount {
    amount: i64,
    currency: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentDetails {
    #[serde(default)]
    merchant_payment_id: Option<String>,
    status: String,
    #[serde(default)]
    amount: Option<PayPayAmount>,
    #[serde(default)]
    payment_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentDetailsResponse {
    result_info: ResultInfo,
    #[serde(default)]
    data: Option<PaymentDetails>,
}

impl PaymentDetailsResponse {
    fn into_report(self, external_event_id: &str) -> Result<StatusReport, GatewayError> {
        if self.result_info.code != "SUCCESS" {
            let message = self.result_info.message.unwrap_or_default();
            return Err(match self.result_info.code.as_str() {
                "DYNAMIC_QR_PAYMENT_NOT_FOUND" | "NO_SUCH_PAYMENT" | "ORDER_NOT_FOUND" => {
                    GatewayError::NotFound(external_event_id.to_string())
                }
                "RATE_LIMIT" | "INTERNAL_SERVER_ERROR" | "SERVICE_UNAVAILABLE" => {
                    GatewayError::Transient(format!("{}: {}", self.result_info.code, message))
                }
                code => GatewayError::Permanent(format!("{}: {}", code, message)),
            });
        }

        let data = self
            .data
            .ok_or_else(|| GatewayError::Permanent("PayPay response without data".to_string()))?;
        let amount = data.amount.as_ref().and_then(|a| {
            Currency::new(&a.currency)
                .ok()
                .and_then(|c| Money::new(a.amount, c).ok())
        });

        Ok(StatusReport {
            provider: PaymentProvider::PayPay,
            external_event_id: data
                .merchant_payment_id
                .unwrap_or_else(|| external_event_id.to_string()),
            raw_status: data.status,
            amount,
            details: serde_json::json!({ "payment_id": data.payment_id }),
        })
    }
}

pub struct PayPayStatusGateway {
    signer: OpaAuthSigner,
    merchant_id: String,
    api_base_url: String,
    http_client: reqwest::Client,
}

impl PayPayStatusGateway {
    pub fn new(
        signer: OpaAuthSigner,
        merchant_id: impl Into<String>,
        api_base_url: impl Into<String>,
    ) -> Self {
        Self {
            signer,
            merchant_id: merchant_id.into(),
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            http_client: reqwest::Client::new(),
        }
    }

    /// Replaces the default client, e.g. with one carrying a request timeout.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = client;
        self
    }

    fn authorization(&self, path: &str) -> String {
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        self.signer.api_authorization(
            "GET",
            path,
            &[],
            Timestamp::now().as_unix_secs(),
            &nonce[..8],
        )
    }
}

#[async_trait]
impl PaymentStatusGateway for PayPayStatusGateway {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::PayPay
    }

    async fn fetch_status(&self, external_event_id: &str) -> Result<StatusReport, GatewayError> {
        let path = format!("{}/{}", PAYMENT_DETAILS_PATH, external_event_id);
        let url = format!("{}{}", self.api_base_url, path);

        let response = self
            .http_client
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, self.authorization(&path))
            .header(MERCHANT_HEADER, &self.merchant_id)
            .send()
            .await
            .map_err(send_error)?;

        let status = response.status();
        let body = response.text().await.map_err(send_error)?;

        // PayPay reports business errors in resultInfo, sometimes with a 4xx.
        match serde_json::from_str::<PaymentDetailsResponse>(&body) {
            Ok(parsed) => parsed.into_report(external_event_id),
            Err(_) if !status.is_success() => Err(status_error(status, external_event_id, &body)),
            Err(e) => Err(GatewayError::Permanent(format!(
                "Failed to parse PayPay response: {}",
                e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::{SecretEncoding, SigningKey, OPA_AUTH_PREFIX};
    use serde_json::json;

    fn parse(value: serde_json::Value) -> PaymentDetailsResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn completed_payment_becomes_report() {
        let report = parse(json!({
            "resultInfo": {"code": "SUCCESS", "message": "Success"},
            "data": {
                "merchantPaymentId": "mp_1",
                "paymentId": "04000000000000000001",
                "status": "COMPLETED",
                "amount": {"amount": 98000, "currency": "JPY"}
            }
        }))
        .into_report("mp_1")
        .unwrap();

        assert_eq!(report.raw_status, "COMPLETED");
        assert_eq!(report.external_event_id, "mp_1");
        assert_eq!(report.amount.unwrap().amount_minor_units(), 98_000);
    }

    #[test]
    fn unknown_payment_is_not_found() {
        let err = parse(json!({
            "resultInfo": {"code": "DYNAMIC_QR_PAYMENT_NOT_FOUND", "message": "not found"}
        }))
        .into_report("mp_404")
        .unwrap_err();

        assert_eq!(err, GatewayError::NotFound("mp_404".to_string()));
    }

    #[test]
    fn rate_limit_is_transient() {
        let err = parse(json!({"resultInfo": {"code": "RATE_LIMIT"}}))
            .into_report("mp_1")
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn unauthorized_is_permanent() {
        let err = parse(json!({"resultInfo": {"code": "UNAUTHORIZED", "message": "bad key"}}))
            .into_report("mp_1")
            .unwrap_err();
        assert!(matches!(err, GatewayError::Permanent(_)));
    }

    #[test]
    fn authorization_uses_api_field_order() {
        let key = SigningKey::from_secret("secret", SecretEncoding::Raw).unwrap();
        let gateway =
            PayPayStatusGateway::new(OpaAuthSigner::new("a_key", key), "m_1", "http://paypay/");

        let value = gateway.authorization("/v2/codes/payments/mp_1");
        let fields: Vec<&str> = value
            .strip_prefix(OPA_AUTH_PREFIX)
            .unwrap()
            .split(':')
            .collect();

        assert_eq!(fields.len(), 5);
        assert_eq!(fields[0], "a_key");
        assert_eq!(fields[2].len(), 8);
        assert_eq!(fields[4], "empty");
        assert_eq!(gateway.api_base_url, "http://paypay");
    }
}
