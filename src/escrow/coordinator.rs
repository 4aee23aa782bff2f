//! Escrow Coordinator
//!
//! The transfer state machine. Drives a purchase from creation to a
//! terminal state, enforcing stage preconditions on every operation.
//!
//! Concurrency pattern throughout: read state → call external provider →
//! conditional write. No record-store lock is held across a provider
//! call; instead every write is a CAS keyed on the expected current
//! state, and losing the CAS means another actor (buyer, sweeper, admin)
//! already made the transition - the loser aborts without side effects.
//! The completed-flip CAS in particular is the single-fire gate that
//! keeps the payout router from ever double-executing for one purchase.

use chrono::{Duration, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::adapters::PaymentProcessor;
use super::db::EscrowStore;
use super::error::EscrowError;
use super::payout::PayoutRouter;
use super::state::{EscrowStage, TransferStatus};
use super::types::{
    DisputeOutcome, NewPurchase, PayoutOutcome, Purchase, PurchaseId, RailResult,
};
use crate::listing::ListingStatus;
use crate::notify::{EmailTemplate, Mailer, send_quietly};

/// Time-boxing and penalty knobs for the escrow lifecycle
#[derive(Debug, Clone)]
pub struct EscrowPolicy {
    /// Seller submission window from purchase creation
    pub seller_window_hours: i64,
    /// Buyer confirmation window from transfer initiation
    pub buyer_window_days: i64,
    /// Reliability-score penalty when a seller loses a dispute
    pub dispute_penalty: i32,
}

impl Default for EscrowPolicy {
    fn default() -> Self {
        Self {
            seller_window_hours: 72,
            buyer_window_days: 7,
            dispute_penalty: 10,
        }
    }
}

/// Escrow Coordinator - orchestrates the purchase lifecycle
pub struct EscrowCoordinator {
    store: Arc<dyn EscrowStore>,
    processor: Arc<dyn PaymentProcessor>,
    router: PayoutRouter,
    mailer: Arc<dyn Mailer>,
    policy: EscrowPolicy,
}

impl EscrowCoordinator {
    pub fn new(
        store: Arc<dyn EscrowStore>,
        processor: Arc<dyn PaymentProcessor>,
        router: PayoutRouter,
        mailer: Arc<dyn Mailer>,
        policy: EscrowPolicy,
    ) -> Self {
        Self {
            store,
            processor,
            router,
            mailer,
            policy,
        }
    }

    /// Access to the store for the sweepers
    pub fn store(&self) -> &Arc<dyn EscrowStore> {
        &self.store
    }

    /// Create a purchase from a captured payment.
    ///
    /// Atomic with the listing's active→sold flip; the seller's 72-hour
    /// submission deadline starts now. `seller_payout` is fixed here and
    /// never recomputed.
    pub async fn create_purchase(&self, new: NewPurchase) -> Result<Purchase, EscrowError> {
        if new.amount_paid <= 0 {
            return Err(EscrowError::ValidationFailed(
                "amount_paid must be positive".to_string(),
            ));
        }
        if new.processing_fee < 0 || new.processing_fee >= new.amount_paid {
            return Err(EscrowError::ValidationFailed(
                "processing_fee must be non-negative and below amount_paid".to_string(),
            ));
        }
        if new.payment_reference.trim().is_empty() {
            return Err(EscrowError::ValidationFailed(
                "payment_reference must not be empty".to_string(),
            ));
        }

        let deadline = Utc::now() + Duration::hours(self.policy.seller_window_hours);
        let purchase = self.store.create_purchase(&new, deadline).await?;

        info!(
            purchase_id = %purchase.id,
            listing_id = purchase.listing_id,
            amount_paid = purchase.amount_paid,
            seller_payout = purchase.seller_payout,
            transfer_deadline = %purchase.transfer_deadline,
            "Purchase created"
        );

        let domain = self.domain_name(&purchase).await;
        let data = json!({
            "purchase_id": purchase.id,
            "domain": domain,
            "amount_paid": purchase.amount_paid,
            "transfer_deadline": purchase.transfer_deadline,
        });
        self.notify_buyer(&purchase, EmailTemplate::SaleConfirmed, data.clone())
            .await;
        self.notify_seller(&purchase, EmailTemplate::SaleConfirmed, data)
            .await;

        Ok(purchase)
    }

    /// Seller submits transfer credentials.
    ///
    /// Caller must own the listing; stage must be awaiting-seller. Starts
    /// the buyer's 7-day confirmation window.
    pub async fn initiate_transfer(
        &self,
        id: PurchaseId,
        caller_id: i64,
        auth_code: &str,
        notes: Option<&str>,
    ) -> Result<Purchase, EscrowError> {
        let auth_code = auth_code.trim();
        if auth_code.is_empty() {
            return Err(EscrowError::ValidationFailed(
                "auth_code must not be empty".to_string(),
            ));
        }

        let purchase = self.load(id).await?;
        if purchase.seller_id != caller_id {
            return Err(EscrowError::Forbidden);
        }

        match EscrowStage::of(&purchase)? {
            EscrowStage::AwaitingSeller { .. } => {}
            other => return Err(invalid_stage_for("initiate-transfer", other)),
        }

        let now = Utc::now();
        let buyer_deadline = now + Duration::days(self.policy.buyer_window_days);
        let updated = self
            .store
            .mark_initiated(id, auth_code, notes, now, buyer_deadline)
            .await?;

        if !updated {
            // Another actor transitioned the row between our read and the
            // CAS - benign; report the state the caller is actually in.
            let current = self.load(id).await?;
            return Err(invalid_stage_for(
                "initiate-transfer",
                EscrowStage::of(&current)?,
            ));
        }

        info!(
            purchase_id = %id,
            seller_id = caller_id,
            buyer_confirmation_deadline = %buyer_deadline,
            "Transfer initiated"
        );

        let purchase = self.load(id).await?;
        let domain = self.domain_name(&purchase).await;
        self.notify_buyer(
            &purchase,
            EmailTemplate::TransferInitiated,
            json!({
                "purchase_id": id,
                "domain": domain,
                "buyer_confirmation_deadline": buyer_deadline,
            }),
        )
        .await;

        Ok(purchase)
    }

    /// Buyer confirms receipt of the domain.
    ///
    /// The completed-flip CAS is the idempotency gate: of any number of
    /// concurrent confirmations (or a racing auto-release sweep), exactly
    /// one wins and routes the payout. Payout failure never blocks the
    /// completion - it is an operator-visible seller-side concern.
    pub async fn confirm_receipt(&self, id: PurchaseId) -> Result<PayoutOutcome, EscrowError> {
        let purchase = self.load(id).await?;

        match EscrowStage::of(&purchase)? {
            EscrowStage::AwaitingBuyer { .. } => {}
            EscrowStage::AwaitingSeller { .. } => {
                return Err(EscrowError::InvalidState(
                    "Seller has not submitted transfer credentials yet".to_string(),
                ));
            }
            other => return Err(invalid_stage_for("confirm-transfer", other)),
        }

        let now = Utc::now();
        if !self.store.complete_transfer(id, now, false).await? {
            // Lost the race to a concurrent confirm or the auto-release
            // sweeper; no payout from this caller.
            return Err(EscrowError::InvalidState(
                "Transfer already confirmed".to_string(),
            ));
        }

        info!(purchase_id = %id, "Transfer confirmed by buyer");
        Ok(self.finish_completion(&purchase, EmailTemplate::TransferCompleted).await?)
    }

    /// Either party flags a problem. Admin review only - no money moves.
    pub async fn open_dispute(&self, id: PurchaseId, reason: &str) -> Result<(), EscrowError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(EscrowError::ValidationFailed(
                "dispute reason must not be empty".to_string(),
            ));
        }

        let purchase = self.load(id).await?;
        match EscrowStage::of(&purchase)? {
            EscrowStage::AwaitingSeller { .. } | EscrowStage::AwaitingBuyer { .. } => {}
            other => return Err(invalid_stage_for("open-dispute", other)),
        }

        let now = Utc::now();
        if !self.store.open_dispute(id, reason, now).await? {
            let current = self.load(id).await?;
            return Err(invalid_stage_for("open-dispute", EscrowStage::of(&current)?));
        }

        warn!(purchase_id = %id, reason = %reason, "Dispute opened");

        let domain = self.domain_name(&purchase).await;
        let data = json!({ "purchase_id": id, "domain": domain, "reason": reason });
        self.notify_buyer(&purchase, EmailTemplate::DisputeOpened, data.clone())
            .await;
        self.notify_seller(&purchase, EmailTemplate::DisputeOpened, data)
            .await;

        Ok(())
    }

    /// Administrative dispute resolution.
    ///
    /// `buyer_refunded`: the record update is gated on refund success, so
    /// there is never a half-resolved state to roll back. `seller_paid`:
    /// completes the escrow and routes the payout exactly like a normal
    /// confirmation. Bare `admin_decision` is rejected - the admin must
    /// pick a money direction.
    pub async fn resolve_dispute(
        &self,
        id: PurchaseId,
        outcome: DisputeOutcome,
    ) -> Result<Option<PayoutOutcome>, EscrowError> {
        if outcome == DisputeOutcome::AdminDecision {
            return Err(EscrowError::ValidationFailed(
                "resolution must be buyer_refunded or seller_paid".to_string(),
            ));
        }

        let purchase = self.load(id).await?;
        match EscrowStage::of(&purchase)? {
            EscrowStage::Disputed { .. } if purchase.dispute_resolved_at.is_none() => {}
            EscrowStage::Disputed { .. } => return Err(EscrowError::AlreadyResolved),
            _ if purchase.dispute_resolved_at.is_some() => {
                return Err(EscrowError::AlreadyResolved);
            }
            _ => return Err(EscrowError::DisputeNotOpen),
        }

        match outcome {
            DisputeOutcome::BuyerRefunded => {
                self.resolve_refund(&purchase).await?;
                Ok(None)
            }
            DisputeOutcome::SellerPaid => Ok(Some(self.resolve_seller_paid(&purchase).await?)),
            DisputeOutcome::AdminDecision => unreachable!("rejected above"),
        }
    }

    async fn resolve_refund(&self, purchase: &Purchase) -> Result<(), EscrowError> {
        let reason = purchase
            .dispute_reason
            .as_deref()
            .unwrap_or("dispute resolved in buyer's favor");

        // Provider call first; the record only changes on refund success.
        match self
            .processor
            .create_refund(&purchase.payment_reference, reason)
            .await
        {
            RailResult::Success(refund_id) => {
                info!(purchase_id = %purchase.id, refund_id = %refund_id, "Dispute refund issued");
            }
            RailResult::Failed(e) => return Err(EscrowError::ProviderError(e)),
            RailResult::Pending => {
                return Err(EscrowError::ProviderError(
                    "refund outcome unknown, retry resolution later".to_string(),
                ));
            }
        }

        let now = Utc::now();
        if !self
            .store
            .resolve_dispute(
                purchase.id,
                DisputeOutcome::BuyerRefunded,
                TransferStatus::Failed,
                now,
            )
            .await?
        {
            // Refund went through but another admin resolved concurrently.
            // The processor dedupes refunds per charge, so money moved once.
            warn!(purchase_id = %purchase.id, "Dispute already resolved by a concurrent admin");
            return Err(EscrowError::AlreadyResolved);
        }

        self.store
            .penalize_seller(purchase.seller_id, self.policy.dispute_penalty)
            .await?;

        // Listing re-enters the market
        self.store
            .set_listing_status(purchase.listing_id, ListingStatus::Sold, ListingStatus::Active)
            .await?;

        info!(
            purchase_id = %purchase.id,
            listing_id = purchase.listing_id,
            "Dispute resolved: buyer refunded, listing re-activated"
        );

        let domain = self.domain_name(purchase).await;
        let data = json!({
            "purchase_id": purchase.id,
            "domain": domain,
            "outcome": DisputeOutcome::BuyerRefunded,
        });
        self.notify_buyer(purchase, EmailTemplate::DisputeResolved, data.clone())
            .await;
        self.notify_seller(purchase, EmailTemplate::DisputeResolved, data)
            .await;

        Ok(())
    }

    async fn resolve_seller_paid(&self, purchase: &Purchase) -> Result<PayoutOutcome, EscrowError> {
        let now = Utc::now();
        if !self
            .store
            .resolve_dispute(
                purchase.id,
                DisputeOutcome::SellerPaid,
                TransferStatus::Completed,
                now,
            )
            .await?
        {
            return Err(EscrowError::AlreadyResolved);
        }

        // Idempotent when the listing never left SOLD
        self.store.mark_listing_sold(purchase.listing_id).await?;

        info!(
            purchase_id = %purchase.id,
            "Dispute resolved: seller paid, routing payout"
        );

        let payout = self.route_payout(purchase).await?;

        let domain = self.domain_name(purchase).await;
        let data = json!({
            "purchase_id": purchase.id,
            "domain": domain,
            "outcome": DisputeOutcome::SellerPaid,
        });
        self.notify_buyer(purchase, EmailTemplate::DisputeResolved, data.clone())
            .await;
        self.notify_seller(purchase, EmailTemplate::DisputeResolved, data)
            .await;

        Ok(payout)
    }

    // === Sweeper entry points ===================================================

    /// Seller-deadline enforcement for one overdue purchase.
    ///
    /// Refund first; every record update is gated on refund success, so a
    /// failed refund leaves the row untouched for the next sweep.
    pub(crate) async fn refund_unstarted(&self, purchase: &Purchase) -> Result<(), EscrowError> {
        let reason = "seller missed the transfer submission deadline";

        match self
            .processor
            .create_refund(&purchase.payment_reference, reason)
            .await
        {
            RailResult::Success(refund_id) => {
                info!(purchase_id = %purchase.id, refund_id = %refund_id, "Deadline refund issued");
            }
            RailResult::Failed(e) => return Err(EscrowError::ProviderError(e)),
            RailResult::Pending => {
                return Err(EscrowError::ProviderError(
                    "refund outcome unknown, leaving for next sweep".to_string(),
                ));
            }
        }

        let now = Utc::now();
        if !self.store.fail_unstarted(purchase.id, reason, now).await? {
            // Seller initiated (or a dispute opened) between the scan and
            // the refund; benign, nothing more to do here.
            warn!(purchase_id = %purchase.id, "Purchase transitioned during deadline sweep");
            return Ok(());
        }

        self.store
            .set_listing_status(purchase.listing_id, ListingStatus::Sold, ListingStatus::Active)
            .await?;

        let domain = self.domain_name(purchase).await;
        let data = json!({ "purchase_id": purchase.id, "domain": domain });
        self.notify_buyer(purchase, EmailTemplate::SellerDeadlineMissed, data.clone())
            .await;
        self.notify_seller(purchase, EmailTemplate::SellerDeadlineMissed, data)
            .await;

        Ok(())
    }

    /// Buyer-deadline auto-release for one overdue purchase.
    ///
    /// The completed flip happens before the payout attempt so a re-run
    /// after a crash never re-selects (or re-pays) this row.
    pub(crate) async fn auto_release(&self, purchase: &Purchase) -> Result<(), EscrowError> {
        let now = Utc::now();
        if !self.store.complete_transfer(purchase.id, now, true).await? {
            // Buyer confirmed or a dispute opened since the scan; benign.
            warn!(purchase_id = %purchase.id, "Purchase transitioned during auto-release sweep");
            return Ok(());
        }

        info!(purchase_id = %purchase.id, "Confirmation deadline passed, auto-releasing");
        self.finish_completion(purchase, EmailTemplate::TransferAutoReleased)
            .await?;
        Ok(())
    }

    // === Helpers ================================================================

    /// Post-completion tail shared by buyer confirmation and auto-release:
    /// route the payout, then notify (buyer always, seller on payout sent).
    async fn finish_completion(
        &self,
        purchase: &Purchase,
        buyer_template: EmailTemplate,
    ) -> Result<PayoutOutcome, EscrowError> {
        // The transfer is already completed and funds may have moved on a
        // rail; a bookkeeping failure here must not fail the completion or
        // skip the notifications.
        let payout = match self.route_payout(purchase).await {
            Ok(payout) => payout,
            Err(e) => {
                error!(
                    purchase_id = %purchase.id,
                    error = %e,
                    "Payout bookkeeping failed after completion, manual review required"
                );
                PayoutOutcome::NotSent {
                    reason: "payout record unavailable, under operator review".to_string(),
                }
            }
        };

        let domain = self.domain_name(purchase).await;
        self.notify_buyer(
            purchase,
            buyer_template,
            json!({ "purchase_id": purchase.id, "domain": domain }),
        )
        .await;

        if let PayoutOutcome::Sent { method, .. } = &payout {
            self.notify_seller(
                purchase,
                EmailTemplate::PayoutSent,
                json!({
                    "purchase_id": purchase.id,
                    "domain": domain,
                    "amount": purchase.seller_payout,
                    "method": method.as_str(),
                }),
            )
            .await;
        }

        Ok(payout)
    }

    async fn route_payout(&self, purchase: &Purchase) -> Result<PayoutOutcome, EscrowError> {
        let domain = self.domain_name(purchase).await;
        let memo = format!("Domain sale payout: {domain}");
        self.router
            .payout(
                purchase.seller_id,
                purchase.seller_payout,
                purchase.id,
                &memo,
            )
            .await
    }

    async fn load(&self, id: PurchaseId) -> Result<Purchase, EscrowError> {
        self.store
            .get_purchase(id)
            .await?
            .ok_or_else(|| EscrowError::PurchaseNotFound(id.to_string()))
    }

    async fn domain_name(&self, purchase: &Purchase) -> String {
        match self.store.get_listing(purchase.listing_id).await {
            Ok(Some(listing)) => listing.domain_name,
            _ => format!("listing #{}", purchase.listing_id),
        }
    }

    async fn notify_buyer(
        &self,
        purchase: &Purchase,
        template: EmailTemplate,
        data: serde_json::Value,
    ) {
        let email = self.store.user_email(purchase.buyer_id).await.ok().flatten();
        send_quietly(&self.mailer, template, email, data).await;
    }

    async fn notify_seller(
        &self,
        purchase: &Purchase,
        template: EmailTemplate,
        data: serde_json::Value,
    ) {
        // Prefer the payout profile's email, fall back to the account email
        let email = match self.store.seller_profile(purchase.seller_id).await {
            Ok(Some(profile)) => Some(profile.email),
            _ => self
                .store
                .user_email(purchase.seller_id)
                .await
                .ok()
                .flatten(),
        };
        send_quietly(&self.mailer, template, email, data).await;
    }
}

/// Plain-language invalid-state error for an operation attempted in the
/// wrong stage.
fn invalid_stage_for(operation: &str, stage: EscrowStage) -> EscrowError {
    let msg = match stage {
        EscrowStage::AwaitingSeller { .. } => {
            format!("{operation} not available: awaiting seller transfer submission")
        }
        EscrowStage::AwaitingBuyer { .. } => {
            format!("{operation} not available: transfer already initiated")
        }
        EscrowStage::Completed { .. } => "Transfer already confirmed".to_string(),
        EscrowStage::Disputed { .. } => "Purchase is under dispute".to_string(),
        EscrowStage::Refunded { .. } => "Purchase was refunded".to_string(),
    };
    EscrowError::InvalidState(msg)
}
