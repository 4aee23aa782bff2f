//! Stripe adapter
//!
//! Covers the two card-processor calls the escrow core consumes:
//! full-charge refunds and connected-account transfers. Requests are
//! form-encoded per the Stripe API; authentication is the secret key as
//! HTTP basic auth user.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{error, warn};

use super::{PaymentProcessor, PurchaseId, RailResult};

const DEFAULT_API_BASE: &str = "https://api.stripe.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Stripe API client
pub struct StripeProcessor {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
}

#[derive(Deserialize)]
struct StripeObject {
    id: String,
}

#[derive(Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

impl StripeProcessor {
    pub fn new(secret_key: String) -> anyhow::Result<Self> {
        Self::with_api_base(secret_key, DEFAULT_API_BASE.to_string())
    }

    pub fn with_api_base(secret_key: String, api_base: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            api_base,
            secret_key,
        })
    }

    /// POST a form-encoded request and map the response to a RailResult.
    ///
    /// 4xx with a parseable error body is an explicit failure; anything
    /// else (timeout, 5xx, unparseable body) is Pending - the outcome is
    /// unknown and must not be treated as a rejection.
    async fn post_form(&self, path: &str, form: &[(&str, String)]) -> RailResult {
        let url = format!("{}{path}", self.api_base);

        let response = match self
            .client
            .post(&url)
            .basic_auth(&self.secret_key, None::<&str>)
            .form(form)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(path = path, error = %e, "Stripe request did not complete");
                return RailResult::Pending;
            }
        };

        let status = response.status();
        if status.is_success() {
            return match response.json::<StripeObject>().await {
                Ok(obj) => RailResult::Success(obj.id),
                Err(e) => {
                    // 2xx but unreadable body: the operation likely went
                    // through, so this is unknown, not failed
                    error!(path = path, error = %e, "Stripe success response unparseable");
                    RailResult::Pending
                }
            };
        }

        if status.is_client_error() {
            let detail = response
                .json::<StripeErrorBody>()
                .await
                .ok()
                .and_then(|b| b.error.message.or(b.error.error_type))
                .unwrap_or_else(|| format!("HTTP {status}"));
            return RailResult::Failed(detail);
        }

        warn!(path = path, status = %status, "Stripe server error");
        RailResult::Pending
    }
}

#[async_trait]
impl PaymentProcessor for StripeProcessor {
    fn name(&self) -> &'static str {
        "stripe"
    }

    async fn create_refund(&self, payment_reference: &str, reason: &str) -> RailResult {
        self.post_form(
            "/v1/refunds",
            &[
                ("payment_intent", payment_reference.to_string()),
                ("metadata[reason]", reason.to_string()),
            ],
        )
        .await
    }

    async fn create_transfer(
        &self,
        amount: i64,
        destination_account: &str,
        grouping_key: PurchaseId,
        memo: &str,
    ) -> RailResult {
        self.post_form(
            "/v1/transfers",
            &[
                ("amount", amount.to_string()),
                ("currency", "usd".to_string()),
                ("destination", destination_account.to_string()),
                ("transfer_group", grouping_key.to_string()),
                ("description", memo.to_string()),
            ],
        )
        .await
    }
}
