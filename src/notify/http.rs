//! HTTP mail-provider client
//!
//! Posts one JSON message per send to a transactional-mail HTTP API
//! (template id + recipient + substitution data).

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

use super::{EmailTemplate, Mailer};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// JSON-over-HTTP transactional mailer
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    from: String,
}

impl HttpMailer {
    pub fn new(endpoint: String, api_key: String, from: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            endpoint,
            api_key,
            from,
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(
        &self,
        template: EmailTemplate,
        recipient: &str,
        data: serde_json::Value,
    ) -> anyhow::Result<()> {
        let body = json!({
            "from": self.from,
            "to": recipient,
            "template": template.as_str(),
            "data": data,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!(
                "mail provider rejected send: HTTP {} for template {}",
                response.status(),
                template
            );
        }

        Ok(())
    }
}
