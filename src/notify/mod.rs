//! Notification Gateway
//!
//! Fire-and-forget transactional email keyed to escrow state transitions.
//! A send failure is logged and swallowed - it must never block or fail
//! the state transition that triggered it.

pub mod http;

pub use http::HttpMailer;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Email templates keyed to state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmailTemplate {
    /// To both parties when the purchase is created
    SaleConfirmed,
    /// To the buyer when the seller submits transfer credentials
    TransferInitiated,
    /// To the buyer when the escrow completes
    TransferCompleted,
    /// To the seller when a payout is sent
    PayoutSent,
    /// To both parties when the seller misses the submission deadline
    SellerDeadlineMissed,
    /// To both parties when the confirmation deadline auto-releases funds
    TransferAutoReleased,
    /// To both parties when a dispute is opened
    DisputeOpened,
    /// To both parties when an admin resolves a dispute
    DisputeResolved,
}

impl EmailTemplate {
    /// Template id as known to the mail provider
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailTemplate::SaleConfirmed => "sale-confirmed",
            EmailTemplate::TransferInitiated => "transfer-initiated",
            EmailTemplate::TransferCompleted => "transfer-completed",
            EmailTemplate::PayoutSent => "payout-sent",
            EmailTemplate::SellerDeadlineMissed => "seller-deadline-missed",
            EmailTemplate::TransferAutoReleased => "transfer-auto-released",
            EmailTemplate::DisputeOpened => "dispute-opened",
            EmailTemplate::DisputeResolved => "dispute-resolved",
        }
    }
}

impl fmt::Display for EmailTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outbound email delivery
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send one templated email. Errors are for the dispatch helper to
    /// log; callers in the escrow core go through [`send_quietly`].
    async fn send(
        &self,
        template: EmailTemplate,
        recipient: &str,
        data: serde_json::Value,
    ) -> anyhow::Result<()>;
}

/// Fire-and-forget dispatch: log and move on, never propagate.
pub async fn send_quietly(
    mailer: &Arc<dyn Mailer>,
    template: EmailTemplate,
    recipient: Option<String>,
    data: serde_json::Value,
) {
    let Some(recipient) = recipient else {
        warn!(template = %template, "No recipient email on file, skipping notification");
        return;
    };

    if let Err(e) = mailer.send(template, &recipient, data).await {
        warn!(template = %template, recipient = %recipient, error = %e, "Notification send failed");
    }
}

/// Mailer that drops everything - for tests and local development
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn send(
        &self,
        template: EmailTemplate,
        recipient: &str,
        _data: serde_json::Value,
    ) -> anyhow::Result<()> {
        tracing::debug!(template = %template, recipient = %recipient, "NoopMailer drop");
        Ok(())
    }
}
