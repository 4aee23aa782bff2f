//! Escrow API DTOs
//!
//! Request and response shapes for the gateway's escrow endpoints.
//! Internal fields (auth codes, payment references) never appear in the
//! public views.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::state::EscrowStage;
use super::types::{DisputeOutcome, PayoutOutcome, Purchase, PurchaseId};

/// Internal payment-capture callback: creates the purchase record
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PaymentCapturedRequest {
    pub listing_id: i64,
    pub buyer_id: i64,
    /// Processor charge reference, used later for refunds
    #[validate(length(min = 1, max = 255))]
    pub payment_reference: String,
    /// Integer minor currency units
    #[validate(range(min = 1))]
    pub amount_paid: i64,
    #[validate(range(min = 0))]
    pub processing_fee: i64,
}

/// Seller submits transfer credentials
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct InitiateTransferRequest {
    /// Registrar transfer authorization code
    #[validate(length(min = 1, max = 512))]
    pub auth_code: String,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// Either party flags a problem
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct OpenDisputeRequest {
    #[validate(length(min = 1, max = 2000))]
    pub reason: String,
}

/// Admin picks a money direction for an open dispute
#[derive(Debug, Deserialize, ToSchema)]
pub struct ResolveDisputeRequest {
    /// `buyer_refunded` or `seller_paid`
    pub outcome: DisputeOutcome,
}

/// Public projection of a purchase
#[derive(Debug, Serialize, ToSchema)]
pub struct PurchaseView {
    pub purchase_id: PurchaseId,
    pub listing_id: i64,
    /// Lifecycle stage: awaiting_seller, awaiting_buyer, completed,
    /// disputed, refunded
    pub stage: &'static str,
    pub amount_paid: i64,
    pub processing_fee: i64,
    pub seller_payout: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_deadline: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buyer_confirmation_deadline: Option<DateTime<Utc>>,
    pub auto_released: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispute_outcome: Option<DisputeOutcome>,
    pub created_at: DateTime<Utc>,
}

impl PurchaseView {
    pub fn from_purchase(purchase: &Purchase, stage: &EscrowStage) -> Self {
        let stage_name = match stage {
            EscrowStage::AwaitingSeller { .. } => "awaiting_seller",
            EscrowStage::AwaitingBuyer { .. } => "awaiting_buyer",
            EscrowStage::Completed { .. } => "completed",
            EscrowStage::Disputed { .. } => "disputed",
            EscrowStage::Refunded { .. } => "refunded",
        };

        Self {
            purchase_id: purchase.id,
            listing_id: purchase.listing_id,
            stage: stage_name,
            amount_paid: purchase.amount_paid,
            processing_fee: purchase.processing_fee,
            seller_payout: purchase.seller_payout,
            transfer_deadline: match stage {
                EscrowStage::AwaitingSeller { .. } => Some(purchase.transfer_deadline),
                _ => None,
            },
            buyer_confirmation_deadline: match stage {
                EscrowStage::AwaitingBuyer { .. } => purchase.buyer_confirmation_deadline,
                _ => None,
            },
            auto_released: purchase.auto_released,
            dispute_outcome: purchase.dispute_outcome,
            created_at: purchase.created_at,
        }
    }
}

/// Result of a completion-triggering operation (confirm, resolve)
#[derive(Debug, Serialize, ToSchema)]
pub struct CompletionView {
    pub purchase_id: PurchaseId,
    pub payout_sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payout_method: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payout_note: Option<String>,
}

impl CompletionView {
    pub fn new(purchase_id: PurchaseId, payout: &PayoutOutcome) -> Self {
        match payout {
            PayoutOutcome::Sent { method, .. } => Self {
                purchase_id,
                payout_sent: true,
                payout_method: Some(method.as_str()),
                payout_note: None,
            },
            PayoutOutcome::NotSent { reason } => Self {
                purchase_id,
                payout_sent: false,
                payout_method: None,
                payout_note: Some(reason.clone()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::escrow::testing::purchase_fixture;

    #[test]
    fn test_view_hides_internal_fields() {
        let purchase = purchase_fixture();
        let stage = EscrowStage::of(&purchase).unwrap();
        let view = PurchaseView::from_purchase(&purchase, &stage);

        assert_eq!(view.stage, "awaiting_seller");
        assert!(view.transfer_deadline.is_some());
        assert!(view.buyer_confirmation_deadline.is_none());

        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("auth_code").is_none());
        assert!(json.get("payment_reference").is_none());
    }
}
