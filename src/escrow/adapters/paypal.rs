//! PayPal Payouts adapter
//!
//! Email-keyed payouts via the PayPal Payouts API. Each call fetches a
//! client-credentials token first; token caching is left to PayPal's own
//! generous token lifetime headroom and the low call volume of payouts.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::warn;

use super::{PayoutNetwork, PurchaseId, RailResult};

const DEFAULT_API_BASE: &str = "https://api-m.paypal.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// PayPal Payouts API client
pub struct PaypalPayouts {
    client: reqwest::Client,
    api_base: String,
    client_id: String,
    client_secret: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct PayoutBatchHeader {
    payout_batch_id: String,
}

#[derive(Deserialize)]
struct PayoutResponse {
    batch_header: PayoutBatchHeader,
}

#[derive(Deserialize)]
struct PaypalErrorBody {
    message: Option<String>,
    name: Option<String>,
}

impl PaypalPayouts {
    pub fn new(client_id: String, client_secret: String) -> anyhow::Result<Self> {
        Self::with_api_base(client_id, client_secret, DEFAULT_API_BASE.to_string())
    }

    pub fn with_api_base(
        client_id: String,
        client_secret: String,
        api_base: String,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            api_base,
            client_id,
            client_secret,
        })
    }

    async fn access_token(&self) -> Result<String, RailResult> {
        let response = self
            .client
            .post(format!("{}/v1/oauth2/token", self.api_base))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "PayPal token request did not complete");
                RailResult::Pending
            })?;

        if !response.status().is_success() {
            return Err(RailResult::Failed(format!(
                "PayPal token request rejected: HTTP {}",
                response.status()
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map(|t| t.access_token)
            .map_err(|e| {
                warn!(error = %e, "PayPal token response unparseable");
                RailResult::Pending
            })
    }
}

#[async_trait]
impl PayoutNetwork for PaypalPayouts {
    fn name(&self) -> &'static str {
        "paypal"
    }

    async fn send_payout(
        &self,
        email: &str,
        amount: i64,
        purchase_id: PurchaseId,
        memo: &str,
    ) -> RailResult {
        let token = match self.access_token().await {
            Ok(t) => t,
            Err(result) => return result,
        };

        // Payouts API takes decimal major units
        let value = format!("{}.{:02}", amount / 100, amount % 100);
        let body = json!({
            "sender_batch_header": {
                "sender_batch_id": purchase_id.to_string(),
                "email_subject": "Your domain sale payout",
            },
            "items": [{
                "recipient_type": "EMAIL",
                "amount": { "value": value, "currency": "USD" },
                "receiver": email,
                "note": memo,
                "sender_item_id": purchase_id.to_string(),
            }],
        });

        let response = match self
            .client
            .post(format!("{}/v1/payments/payouts", self.api_base))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(purchase_id = %purchase_id, error = %e, "PayPal payout request did not complete");
                return RailResult::Pending;
            }
        };

        let status = response.status();
        if status.is_success() {
            return match response.json::<PayoutResponse>().await {
                Ok(r) => RailResult::Success(r.batch_header.payout_batch_id),
                Err(e) => {
                    warn!(purchase_id = %purchase_id, error = %e, "PayPal payout response unparseable");
                    RailResult::Pending
                }
            };
        }

        if status.is_client_error() {
            let detail = response
                .json::<PaypalErrorBody>()
                .await
                .ok()
                .and_then(|b| b.message.or(b.name))
                .unwrap_or_else(|| format!("HTTP {status}"));
            return RailResult::Failed(detail);
        }

        warn!(purchase_id = %purchase_id, status = %status, "PayPal server error");
        RailResult::Pending
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_minor_units_formatting() {
        // matches the inline formatting in send_payout
        let cases = [(9584i64, "95.84"), (100, "1.00"), (5, "0.05"), (1000, "10.00")];
        for (amount, expected) in cases {
            let value = format!("{}.{:02}", amount / 100, amount % 100);
            assert_eq!(value, expected);
        }
    }
}
