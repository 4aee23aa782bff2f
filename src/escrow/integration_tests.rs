//! End-to-end lifecycle tests over the in-memory store

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::adapters::mock::{MockPayoutNetwork, MockProcessor};
use super::coordinator::{EscrowCoordinator, EscrowPolicy};
use super::db::EscrowStore;
use super::error::EscrowError;
use super::payout::PayoutRouter;
use super::state::{EscrowStage, TransferStatus};
use super::sweeper::DeadlineSweeper;
use super::testing::{MemStore, listing_fixture, seller_fixture};
use super::types::{
    DisputeOutcome, NewPayout, NewPurchase, Payout, PayoutOutcome, Purchase, PurchaseId,
};
use crate::listing::{Listing, ListingStatus};
use crate::seller::SellerProfile;
use crate::notify::NoopMailer;

struct Harness {
    store: Arc<MemStore>,
    processor: Arc<MockProcessor>,
    network: Arc<MockPayoutNetwork>,
    coordinator: Arc<EscrowCoordinator>,
}

impl Harness {
    fn new() -> Self {
        let store = Arc::new(MemStore::new());
        let processor = Arc::new(MockProcessor::new());
        let network = Arc::new(MockPayoutNetwork::new());

        let store_dyn: Arc<dyn EscrowStore> = store.clone();
        let router = PayoutRouter::new(store_dyn.clone(), processor.clone(), network.clone());
        let coordinator = Arc::new(EscrowCoordinator::new(
            store_dyn,
            processor.clone(),
            router,
            Arc::new(NoopMailer),
            EscrowPolicy::default(),
        ));

        store.put_listing(listing_fixture(1, 3));
        store.put_seller(seller_fixture(3));
        store.put_email(2, "buyer@example.com");
        store.put_email(3, "seller@example.com");

        Self {
            store,
            processor,
            network,
            coordinator,
        }
    }

    fn sweeper(&self) -> DeadlineSweeper {
        DeadlineSweeper::new(self.coordinator.clone(), 100)
    }

    async fn create(&self) -> Purchase {
        self.coordinator
            .create_purchase(NewPurchase {
                listing_id: 1,
                buyer_id: 2,
                payment_reference: "ch_test_1".to_string(),
                amount_paid: 9900,
                processing_fee: 316,
            })
            .await
            .unwrap()
    }

    async fn get(&self, id: PurchaseId) -> Purchase {
        self.store.get_purchase(id).await.unwrap().unwrap()
    }

    /// Push an active purchase past a deadline by rewriting its timestamps
    async fn force_overdue(&self, id: PurchaseId) {
        let mut purchase = self.get(id).await;
        let past = chrono::Utc::now() - chrono::Duration::hours(1);
        purchase.transfer_deadline = past;
        if purchase.buyer_confirmation_deadline.is_some() {
            purchase.buyer_confirmation_deadline = Some(past);
        }
        self.store.put_purchase(purchase);
    }
}

#[tokio::test]
async fn test_happy_path_full_lifecycle() {
    let h = Harness::new();

    // Payment captured: listing flips to SOLD, payout fixed at creation
    let purchase = h.create().await;
    assert_eq!(purchase.amount_paid, 9900);
    assert_eq!(purchase.seller_payout, 9584);
    assert!(matches!(
        EscrowStage::of(&purchase).unwrap(),
        EscrowStage::AwaitingSeller { .. }
    ));
    assert!(purchase.buyer_confirmation_deadline.is_none());
    let listing = h.store.get_listing(1).await.unwrap().unwrap();
    assert_eq!(listing.status, ListingStatus::Sold);

    // Seller submits credentials
    let purchase = h
        .coordinator
        .initiate_transfer(purchase.id, 3, "AUTH-1234", Some("registrar: example"))
        .await
        .unwrap();
    assert!(matches!(
        EscrowStage::of(&purchase).unwrap(),
        EscrowStage::AwaitingBuyer { .. }
    ));

    // Buyer deadline only exists once credentials are in, and never
    // precedes the initiation timestamp
    let initiated_at = purchase.transfer_initiated_at.unwrap();
    let buyer_deadline = purchase.buyer_confirmation_deadline.unwrap();
    assert!(buyer_deadline >= initiated_at);

    // Buyer confirms: escrow completes, paypal payout routed and recorded
    let payout = h.coordinator.confirm_receipt(purchase.id).await.unwrap();
    assert!(payout.is_sent());
    assert_eq!(h.network.payout_count(), 1);
    assert_eq!(h.store.payout_count(), 1);

    let done = h.get(purchase.id).await;
    assert_eq!(done.transfer_status, TransferStatus::Completed);
    assert!(!done.auto_released);

    let recorded = h.store.payouts_for_purchase(purchase.id).await.unwrap();
    assert_eq!(recorded[0].amount, 9584);
}

#[tokio::test]
async fn test_second_buyer_loses_listing_race() {
    let h = Harness::new();
    h.create().await;

    let err = h
        .coordinator
        .create_purchase(NewPurchase {
            listing_id: 1,
            buyer_id: 7,
            payment_reference: "ch_test_2".to_string(),
            amount_paid: 9900,
            processing_fee: 316,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EscrowError::ListingUnavailable));
}

#[tokio::test]
async fn test_initiate_requires_ownership_and_auth_code() {
    let h = Harness::new();
    let purchase = h.create().await;

    let err = h
        .coordinator
        .initiate_transfer(purchase.id, 99, "AUTH-1234", None)
        .await
        .unwrap_err();
    assert!(matches!(err, EscrowError::Forbidden));

    let err = h
        .coordinator
        .initiate_transfer(purchase.id, 3, "   ", None)
        .await
        .unwrap_err();
    assert!(matches!(err, EscrowError::ValidationFailed(_)));

    // Second submission loses the CAS
    h.coordinator
        .initiate_transfer(purchase.id, 3, "AUTH-1234", None)
        .await
        .unwrap();
    let err = h
        .coordinator
        .initiate_transfer(purchase.id, 3, "AUTH-5678", None)
        .await
        .unwrap_err();
    assert!(matches!(err, EscrowError::InvalidState(_)));
}

#[tokio::test]
async fn test_confirm_before_initiation_rejected() {
    let h = Harness::new();
    let purchase = h.create().await;

    let err = h.coordinator.confirm_receipt(purchase.id).await.unwrap_err();
    assert!(matches!(err, EscrowError::InvalidState(_)));
    assert_eq!(h.network.payout_count(), 0);
}

#[tokio::test]
async fn test_confirm_is_single_fire() {
    let h = Harness::new();
    let purchase = h.create().await;
    h.coordinator
        .initiate_transfer(purchase.id, 3, "AUTH-1234", None)
        .await
        .unwrap();

    h.coordinator.confirm_receipt(purchase.id).await.unwrap();
    let err = h.coordinator.confirm_receipt(purchase.id).await.unwrap_err();
    assert!(matches!(err, EscrowError::InvalidState(_)));

    // Exactly one payout despite the second attempt
    assert_eq!(h.network.payout_count(), 1);
    assert_eq!(h.store.payout_count(), 1);
}

/// Store wrapper that serves one stashed stale snapshot from
/// `get_purchase`, then delegates. Reproduces the interleaving where a
/// confirmer reads the row while it is still AWAITING_BUYER and another
/// actor flips it before the confirmer's conditional write lands.
struct StaleSnapshotStore {
    inner: Arc<MemStore>,
    stale: Mutex<Option<Purchase>>,
}

impl StaleSnapshotStore {
    fn new(inner: Arc<MemStore>, snapshot: Purchase) -> Self {
        Self {
            inner,
            stale: Mutex::new(Some(snapshot)),
        }
    }
}

#[async_trait]
impl EscrowStore for StaleSnapshotStore {
    async fn create_purchase(
        &self,
        new: &NewPurchase,
        transfer_deadline: DateTime<Utc>,
    ) -> Result<Purchase, EscrowError> {
        self.inner.create_purchase(new, transfer_deadline).await
    }

    async fn get_purchase(&self, id: PurchaseId) -> Result<Option<Purchase>, EscrowError> {
        let stashed = self.stale.lock().unwrap().take_if(|p| p.id == id);
        match stashed {
            Some(p) => Ok(Some(p)),
            None => self.inner.get_purchase(id).await,
        }
    }

    async fn get_listing(&self, id: i64) -> Result<Option<Listing>, EscrowError> {
        self.inner.get_listing(id).await
    }

    async fn mark_initiated(
        &self,
        id: PurchaseId,
        auth_code: &str,
        notes: Option<&str>,
        now: DateTime<Utc>,
        buyer_deadline: DateTime<Utc>,
    ) -> Result<bool, EscrowError> {
        self.inner
            .mark_initiated(id, auth_code, notes, now, buyer_deadline)
            .await
    }

    async fn complete_transfer(
        &self,
        id: PurchaseId,
        now: DateTime<Utc>,
        auto_released: bool,
    ) -> Result<bool, EscrowError> {
        self.inner.complete_transfer(id, now, auto_released).await
    }

    async fn open_dispute(
        &self,
        id: PurchaseId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, EscrowError> {
        self.inner.open_dispute(id, reason, now).await
    }

    async fn resolve_dispute(
        &self,
        id: PurchaseId,
        outcome: DisputeOutcome,
        to: TransferStatus,
        now: DateTime<Utc>,
    ) -> Result<bool, EscrowError> {
        self.inner.resolve_dispute(id, outcome, to, now).await
    }

    async fn fail_unstarted(
        &self,
        id: PurchaseId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, EscrowError> {
        self.inner.fail_unstarted(id, reason, now).await
    }

    async fn find_seller_overdue(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Purchase>, EscrowError> {
        self.inner.find_seller_overdue(now, limit).await
    }

    async fn find_buyer_overdue(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Purchase>, EscrowError> {
        self.inner.find_buyer_overdue(now, limit).await
    }

    async fn set_listing_status(
        &self,
        listing_id: i64,
        from: ListingStatus,
        to: ListingStatus,
    ) -> Result<bool, EscrowError> {
        self.inner.set_listing_status(listing_id, from, to).await
    }

    async fn mark_listing_sold(&self, listing_id: i64) -> Result<bool, EscrowError> {
        self.inner.mark_listing_sold(listing_id).await
    }

    async fn insert_payout(
        &self,
        new: &NewPayout,
        now: DateTime<Utc>,
    ) -> Result<i64, EscrowError> {
        self.inner.insert_payout(new, now).await
    }

    async fn payouts_for_purchase(&self, id: PurchaseId) -> Result<Vec<Payout>, EscrowError> {
        self.inner.payouts_for_purchase(id).await
    }

    async fn seller_profile(&self, seller_id: i64) -> Result<Option<SellerProfile>, EscrowError> {
        self.inner.seller_profile(seller_id).await
    }

    async fn penalize_seller(&self, seller_id: i64, penalty: i32) -> Result<(), EscrowError> {
        self.inner.penalize_seller(seller_id, penalty).await
    }

    async fn user_email(&self, user_id: i64) -> Result<Option<String>, EscrowError> {
        self.inner.user_email(user_id).await
    }

    async fn bump_rate_window(
        &self,
        key: &str,
        window_start: DateTime<Utc>,
    ) -> Result<i64, EscrowError> {
        self.inner.bump_rate_window(key, window_start).await
    }
}

#[tokio::test]
async fn test_concurrent_confirm_loser_gets_invalid_state() {
    let h = Harness::new();
    let purchase = h.create().await;
    h.coordinator
        .initiate_transfer(purchase.id, 3, "AUTH-1234", None)
        .await
        .unwrap();

    // Snapshot the row while still awaiting the buyer, then let the
    // winning confirmation land
    let snapshot = h.get(purchase.id).await;
    h.coordinator.confirm_receipt(purchase.id).await.unwrap();
    assert_eq!(h.store.payout_count(), 1);

    // The losing confirmer reads the stale snapshot, passes the stage
    // check, and loses the completed-flip CAS
    let loser_store: Arc<dyn EscrowStore> =
        Arc::new(StaleSnapshotStore::new(h.store.clone(), snapshot));
    let loser = EscrowCoordinator::new(
        loser_store.clone(),
        h.processor.clone(),
        PayoutRouter::new(loser_store, h.processor.clone(), h.network.clone()),
        Arc::new(NoopMailer),
        EscrowPolicy::default(),
    );

    let err = loser.confirm_receipt(purchase.id).await.unwrap_err();
    assert!(matches!(err, EscrowError::InvalidState(_)));

    // The loser never reaches the payout router
    assert_eq!(h.network.payout_count(), 1);
    assert_eq!(h.store.payout_count(), 1);
}

#[tokio::test]
async fn test_payout_failure_does_not_block_completion() {
    let h = Harness::new();
    let purchase = h.create().await;
    h.coordinator
        .initiate_transfer(purchase.id, 3, "AUTH-1234", None)
        .await
        .unwrap();

    // Both rails down: paypal fails and the fixture has no stripe account
    h.network.set_fail_payout(true);

    let payout = h.coordinator.confirm_receipt(purchase.id).await.unwrap();
    assert!(!payout.is_sent());

    let done = h.get(purchase.id).await;
    assert_eq!(done.transfer_status, TransferStatus::Completed);
    // Failed attempts never become payout rows
    assert_eq!(h.store.payout_count(), 0);
}

#[tokio::test]
async fn test_payout_record_failure_does_not_block_completion() {
    let h = Harness::new();
    let purchase = h.create().await;
    h.coordinator
        .initiate_transfer(purchase.id, 3, "AUTH-1234", None)
        .await
        .unwrap();

    // The rail accepts the payout but the record store rejects the row
    h.store.set_fail_insert_payout(true);

    let payout = h.coordinator.confirm_receipt(purchase.id).await.unwrap();
    assert!(matches!(payout, PayoutOutcome::NotSent { .. }));

    let done = h.get(purchase.id).await;
    assert_eq!(done.transfer_status, TransferStatus::Completed);
    assert_eq!(h.network.payout_count(), 1);
    assert_eq!(h.store.payout_count(), 0);
}

#[tokio::test]
async fn test_seller_deadline_sweep_refunds_and_reactivates() {
    let h = Harness::new();
    let purchase = h.create().await;
    h.force_overdue(purchase.id).await;

    let report = h.sweeper().sweep_seller_deadline().await.unwrap();
    assert_eq!(report.scanned, 1);
    assert_eq!(report.succeeded, 1);
    assert_eq!(h.processor.refund_count(), 1);

    let swept = h.get(purchase.id).await;
    assert_eq!(swept.transfer_status, TransferStatus::Failed);
    assert_eq!(swept.dispute_outcome, Some(DisputeOutcome::BuyerRefunded));
    assert!(matches!(
        EscrowStage::of(&swept).unwrap(),
        EscrowStage::Refunded { .. }
    ));

    let listing = h.store.get_listing(1).await.unwrap().unwrap();
    assert_eq!(listing.status, ListingStatus::Active);

    // Re-running the sweep finds nothing
    let report = h.sweeper().sweep_seller_deadline().await.unwrap();
    assert_eq!(report.scanned, 0);
    assert_eq!(h.processor.refund_count(), 1);
}

#[tokio::test]
async fn test_seller_deadline_sweep_skips_on_refund_failure() {
    let h = Harness::new();
    let purchase = h.create().await;
    h.force_overdue(purchase.id).await;

    h.processor.set_fail_refund(true);
    let report = h.sweeper().sweep_seller_deadline().await.unwrap();
    assert_eq!(report.failed, 1);

    // Row untouched, picked up again next sweep
    let kept = h.get(purchase.id).await;
    assert_eq!(kept.transfer_status, TransferStatus::Pending);

    h.processor.set_fail_refund(false);
    let report = h.sweeper().sweep_seller_deadline().await.unwrap();
    assert_eq!(report.succeeded, 1);
}

#[tokio::test]
async fn test_initiated_purchase_ignored_by_seller_sweep() {
    let h = Harness::new();
    let purchase = h.create().await;
    h.coordinator
        .initiate_transfer(purchase.id, 3, "AUTH-1234", None)
        .await
        .unwrap();

    let mut stale = h.get(purchase.id).await;
    stale.transfer_deadline = chrono::Utc::now() - chrono::Duration::hours(1);
    h.store.put_purchase(stale);

    let report = h.sweeper().sweep_seller_deadline().await.unwrap();
    assert_eq!(report.scanned, 0);
    assert_eq!(h.processor.refund_count(), 0);
}

#[tokio::test]
async fn test_buyer_deadline_sweep_auto_releases() {
    let h = Harness::new();
    let purchase = h.create().await;
    h.coordinator
        .initiate_transfer(purchase.id, 3, "AUTH-1234", None)
        .await
        .unwrap();
    h.force_overdue(purchase.id).await;

    let report = h.sweeper().sweep_buyer_deadline().await.unwrap();
    assert_eq!(report.succeeded, 1);

    let released = h.get(purchase.id).await;
    assert_eq!(released.transfer_status, TransferStatus::Completed);
    assert!(released.auto_released);
    assert_eq!(h.network.payout_count(), 1);

    // Idempotent re-sweep
    let report = h.sweeper().sweep_buyer_deadline().await.unwrap();
    assert_eq!(report.scanned, 0);
    assert_eq!(h.network.payout_count(), 1);
}

#[tokio::test]
async fn test_dispute_freezes_both_sweeps_and_confirmation() {
    let h = Harness::new();
    let purchase = h.create().await;
    h.coordinator
        .initiate_transfer(purchase.id, 3, "AUTH-1234", None)
        .await
        .unwrap();
    h.coordinator
        .open_dispute(purchase.id, "domain still locked at registrar")
        .await
        .unwrap();

    h.force_overdue(purchase.id).await;
    let seller_report = h.sweeper().sweep_seller_deadline().await.unwrap();
    let buyer_report = h.sweeper().sweep_buyer_deadline().await.unwrap();
    assert_eq!(seller_report.scanned, 0);
    assert_eq!(buyer_report.scanned, 0);

    let err = h.coordinator.confirm_receipt(purchase.id).await.unwrap_err();
    assert!(matches!(err, EscrowError::InvalidState(_)));

    let err = h
        .coordinator
        .open_dispute(purchase.id, "second dispute")
        .await
        .unwrap_err();
    assert!(matches!(err, EscrowError::InvalidState(_)));
}

#[tokio::test]
async fn test_resolve_buyer_refunded() {
    let h = Harness::new();
    let purchase = h.create().await;
    h.coordinator
        .open_dispute(purchase.id, "seller unresponsive")
        .await
        .unwrap();

    h.coordinator
        .resolve_dispute(purchase.id, DisputeOutcome::BuyerRefunded)
        .await
        .unwrap();

    assert_eq!(h.processor.refund_count(), 1);
    let resolved = h.get(purchase.id).await;
    assert_eq!(resolved.transfer_status, TransferStatus::Failed);
    assert_eq!(resolved.dispute_outcome, Some(DisputeOutcome::BuyerRefunded));

    // Listing back on the market, seller penalized
    let listing = h.store.get_listing(1).await.unwrap().unwrap();
    assert_eq!(listing.status, ListingStatus::Active);
    let profile = h.store.seller_profile(3).await.unwrap().unwrap();
    assert_eq!(profile.reliability_score, 90);

    // Second resolution attempt
    let err = h
        .coordinator
        .resolve_dispute(purchase.id, DisputeOutcome::SellerPaid)
        .await
        .unwrap_err();
    assert!(matches!(err, EscrowError::AlreadyResolved));
}

#[tokio::test]
async fn test_resolve_buyer_refunded_gated_on_refund() {
    let h = Harness::new();
    let purchase = h.create().await;
    h.coordinator
        .open_dispute(purchase.id, "seller unresponsive")
        .await
        .unwrap();

    h.processor.set_fail_refund(true);
    let err = h
        .coordinator
        .resolve_dispute(purchase.id, DisputeOutcome::BuyerRefunded)
        .await
        .unwrap_err();
    assert!(matches!(err, EscrowError::ProviderError(_)));

    // Dispute still open; resolution retryable
    let kept = h.get(purchase.id).await;
    assert_eq!(kept.transfer_status, TransferStatus::Disputed);
    assert!(kept.dispute_resolved_at.is_none());

    h.processor.set_fail_refund(false);
    h.coordinator
        .resolve_dispute(purchase.id, DisputeOutcome::BuyerRefunded)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_resolve_seller_paid_routes_payout() {
    let h = Harness::new();
    let purchase = h.create().await;
    h.coordinator
        .initiate_transfer(purchase.id, 3, "AUTH-1234", None)
        .await
        .unwrap();
    h.coordinator
        .open_dispute(purchase.id, "buyer claims non-delivery")
        .await
        .unwrap();

    let payout = h
        .coordinator
        .resolve_dispute(purchase.id, DisputeOutcome::SellerPaid)
        .await
        .unwrap()
        .unwrap();
    assert!(payout.is_sent());
    assert_eq!(h.network.payout_count(), 1);

    let resolved = h.get(purchase.id).await;
    assert_eq!(resolved.transfer_status, TransferStatus::Completed);
    assert!(resolved.transfer_confirmed_at.is_some());

    let listing = h.store.get_listing(1).await.unwrap().unwrap();
    assert_eq!(listing.status, ListingStatus::Sold);
}

#[tokio::test]
async fn test_resolve_rejects_admin_decision_and_no_dispute() {
    let h = Harness::new();
    let purchase = h.create().await;

    let err = h
        .coordinator
        .resolve_dispute(purchase.id, DisputeOutcome::AdminDecision)
        .await
        .unwrap_err();
    assert!(matches!(err, EscrowError::ValidationFailed(_)));

    let err = h
        .coordinator
        .resolve_dispute(purchase.id, DisputeOutcome::SellerPaid)
        .await
        .unwrap_err();
    assert!(matches!(err, EscrowError::DisputeNotOpen));
}

#[tokio::test]
async fn test_create_purchase_validation() {
    let h = Harness::new();

    let err = h
        .coordinator
        .create_purchase(NewPurchase {
            listing_id: 1,
            buyer_id: 2,
            payment_reference: "ch_bad".to_string(),
            amount_paid: 1000,
            processing_fee: 1000,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EscrowError::ValidationFailed(_)));

    let err = h
        .coordinator
        .create_purchase(NewPurchase {
            listing_id: 404,
            buyer_id: 2,
            payment_reference: "ch_x".to_string(),
            amount_paid: 1000,
            processing_fee: 10,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EscrowError::ListingNotFound(404)));
}
