//! Test support: fixtures and an in-memory `EscrowStore`.
//!
//! `MemStore` mirrors the Postgres store's CAS semantics over plain
//! hash maps so lifecycle tests run without a database.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

use super::db::EscrowStore;
use super::error::EscrowError;
use super::state::TransferStatus;
use super::types::{
    DisputeOutcome, NewPayout, NewPurchase, Payout, PayoutStatus, Purchase, PurchaseId,
};
use crate::listing::{Listing, ListingStatus};
use crate::seller::{PayoutMethod, SellerProfile};

/// A freshly created purchase: PENDING, seller yet to act.
/// $99.00 sale, $3.16 processing fee, $95.84 to the seller.
pub fn purchase_fixture() -> Purchase {
    let now = Utc::now();
    Purchase {
        id: PurchaseId::new(),
        listing_id: 1,
        buyer_id: 2,
        seller_id: 3,
        payment_reference: "ch_fixture_1".to_string(),
        amount_paid: 9900,
        processing_fee: 316,
        seller_payout: 9584,
        transfer_status: TransferStatus::Pending,
        transfer_deadline: now + Duration::hours(72),
        transfer_initiated_at: None,
        auth_code: None,
        transfer_notes: None,
        buyer_confirmation_deadline: None,
        transfer_confirmed_at: None,
        auto_released: false,
        dispute_reason: None,
        dispute_opened_at: None,
        dispute_resolved_at: None,
        dispute_outcome: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn listing_fixture(id: i64, seller_id: i64) -> Listing {
    let now = Utc::now();
    Listing {
        id,
        seller_id,
        domain_name: format!("example-{id}.com"),
        status: ListingStatus::Active,
        created_at: now,
        updated_at: now,
    }
}

pub fn seller_fixture(seller_id: i64) -> SellerProfile {
    SellerProfile {
        seller_id,
        email: format!("seller{seller_id}@example.com"),
        payout_method: Some(PayoutMethod::Paypal),
        paypal_email: Some(format!("seller{seller_id}@paypal.example.com")),
        stripe_account_id: None,
        reliability_score: 100,
        created_at: Utc::now(),
    }
}

/// In-memory record store with the same conditional-write semantics as
/// the Postgres store.
#[derive(Default)]
pub struct MemStore {
    purchases: Mutex<HashMap<uuid::Uuid, Purchase>>,
    listings: Mutex<HashMap<i64, Listing>>,
    payouts: Mutex<Vec<Payout>>,
    sellers: Mutex<HashMap<i64, SellerProfile>>,
    emails: Mutex<HashMap<i64, String>>,
    rate_windows: Mutex<HashMap<(String, DateTime<Utc>), i64>>,
    next_payout_id: AtomicI64,
    fail_insert_payout: Mutex<bool>,
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            next_payout_id: AtomicI64::new(1),
            ..Default::default()
        }
    }

    pub fn put_purchase(&self, purchase: Purchase) {
        self.purchases
            .lock()
            .unwrap()
            .insert(purchase.id.inner(), purchase);
    }

    pub fn put_listing(&self, listing: Listing) {
        self.listings.lock().unwrap().insert(listing.id, listing);
    }

    pub fn put_seller(&self, profile: SellerProfile) {
        self.sellers
            .lock()
            .unwrap()
            .insert(profile.seller_id, profile);
    }

    pub fn put_email(&self, user_id: i64, email: &str) {
        self.emails.lock().unwrap().insert(user_id, email.to_string());
    }

    pub fn payout_count(&self) -> usize {
        self.payouts.lock().unwrap().len()
    }

    pub fn set_fail_insert_payout(&self, fail: bool) {
        *self.fail_insert_payout.lock().unwrap() = fail;
    }
}

#[async_trait]
impl EscrowStore for MemStore {
    async fn create_purchase(
        &self,
        new: &NewPurchase,
        transfer_deadline: DateTime<Utc>,
    ) -> Result<Purchase, EscrowError> {
        let seller_id = {
            let mut listings = self.listings.lock().unwrap();
            let listing = listings
                .get_mut(&new.listing_id)
                .ok_or(EscrowError::ListingNotFound(new.listing_id))?;
            if listing.status != ListingStatus::Active {
                return Err(EscrowError::ListingUnavailable);
            }
            listing.status = ListingStatus::Sold;
            listing.seller_id
        };

        let now = Utc::now();
        let purchase = Purchase {
            id: PurchaseId::new(),
            listing_id: new.listing_id,
            buyer_id: new.buyer_id,
            seller_id,
            payment_reference: new.payment_reference.clone(),
            amount_paid: new.amount_paid,
            processing_fee: new.processing_fee,
            seller_payout: new.seller_payout(),
            transfer_status: TransferStatus::Pending,
            transfer_deadline,
            transfer_initiated_at: None,
            auth_code: None,
            transfer_notes: None,
            buyer_confirmation_deadline: None,
            transfer_confirmed_at: None,
            auto_released: false,
            dispute_reason: None,
            dispute_opened_at: None,
            dispute_resolved_at: None,
            dispute_outcome: None,
            created_at: now,
            updated_at: now,
        };
        self.put_purchase(purchase.clone());
        Ok(purchase)
    }

    async fn get_purchase(&self, id: PurchaseId) -> Result<Option<Purchase>, EscrowError> {
        Ok(self.purchases.lock().unwrap().get(&id.inner()).cloned())
    }

    async fn get_listing(&self, id: i64) -> Result<Option<Listing>, EscrowError> {
        Ok(self.listings.lock().unwrap().get(&id).cloned())
    }

    async fn mark_initiated(
        &self,
        id: PurchaseId,
        auth_code: &str,
        notes: Option<&str>,
        now: DateTime<Utc>,
        buyer_deadline: DateTime<Utc>,
    ) -> Result<bool, EscrowError> {
        let mut purchases = self.purchases.lock().unwrap();
        let Some(p) = purchases.get_mut(&id.inner()) else {
            return Ok(false);
        };
        if p.transfer_status != TransferStatus::Pending || p.transfer_initiated_at.is_some() {
            return Ok(false);
        }
        p.transfer_initiated_at = Some(now);
        p.auth_code = Some(auth_code.to_string());
        p.transfer_notes = notes.map(str::to_string);
        p.buyer_confirmation_deadline = Some(buyer_deadline);
        p.updated_at = now;
        Ok(true)
    }

    async fn complete_transfer(
        &self,
        id: PurchaseId,
        now: DateTime<Utc>,
        auto_released: bool,
    ) -> Result<bool, EscrowError> {
        let mut purchases = self.purchases.lock().unwrap();
        let Some(p) = purchases.get_mut(&id.inner()) else {
            return Ok(false);
        };
        if p.transfer_status != TransferStatus::Pending || p.transfer_initiated_at.is_none() {
            return Ok(false);
        }
        p.transfer_status = TransferStatus::Completed;
        p.transfer_confirmed_at = Some(now);
        p.auto_released = auto_released;
        p.updated_at = now;
        Ok(true)
    }

    async fn open_dispute(
        &self,
        id: PurchaseId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, EscrowError> {
        let mut purchases = self.purchases.lock().unwrap();
        let Some(p) = purchases.get_mut(&id.inner()) else {
            return Ok(false);
        };
        if p.transfer_status != TransferStatus::Pending {
            return Ok(false);
        }
        p.transfer_status = TransferStatus::Disputed;
        p.dispute_reason = Some(reason.to_string());
        p.dispute_opened_at = Some(now);
        p.updated_at = now;
        Ok(true)
    }

    async fn resolve_dispute(
        &self,
        id: PurchaseId,
        outcome: DisputeOutcome,
        to: TransferStatus,
        now: DateTime<Utc>,
    ) -> Result<bool, EscrowError> {
        let mut purchases = self.purchases.lock().unwrap();
        let Some(p) = purchases.get_mut(&id.inner()) else {
            return Ok(false);
        };
        if p.transfer_status != TransferStatus::Disputed || p.dispute_resolved_at.is_some() {
            return Ok(false);
        }
        p.transfer_status = to;
        p.dispute_outcome = Some(outcome);
        p.dispute_resolved_at = Some(now);
        if to == TransferStatus::Completed && p.transfer_confirmed_at.is_none() {
            p.transfer_confirmed_at = Some(now);
        }
        p.updated_at = now;
        Ok(true)
    }

    async fn fail_unstarted(
        &self,
        id: PurchaseId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, EscrowError> {
        let mut purchases = self.purchases.lock().unwrap();
        let Some(p) = purchases.get_mut(&id.inner()) else {
            return Ok(false);
        };
        if p.transfer_status != TransferStatus::Pending || p.transfer_initiated_at.is_some() {
            return Ok(false);
        }
        p.transfer_status = TransferStatus::Failed;
        p.dispute_reason = Some(reason.to_string());
        p.dispute_opened_at = Some(now);
        p.dispute_resolved_at = Some(now);
        p.dispute_outcome = Some(DisputeOutcome::BuyerRefunded);
        p.updated_at = now;
        Ok(true)
    }

    async fn find_seller_overdue(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Purchase>, EscrowError> {
        let purchases = self.purchases.lock().unwrap();
        let mut overdue: Vec<Purchase> = purchases
            .values()
            .filter(|p| {
                p.transfer_status == TransferStatus::Pending
                    && p.transfer_initiated_at.is_none()
                    && p.transfer_deadline < now
            })
            .cloned()
            .collect();
        overdue.sort_by_key(|p| p.transfer_deadline);
        overdue.truncate(limit as usize);
        Ok(overdue)
    }

    async fn find_buyer_overdue(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Purchase>, EscrowError> {
        let purchases = self.purchases.lock().unwrap();
        let mut overdue: Vec<Purchase> = purchases
            .values()
            .filter(|p| {
                p.transfer_status == TransferStatus::Pending
                    && p.transfer_initiated_at.is_some()
                    && p.buyer_confirmation_deadline.is_some_and(|d| d < now)
            })
            .cloned()
            .collect();
        overdue.sort_by_key(|p| p.buyer_confirmation_deadline);
        overdue.truncate(limit as usize);
        Ok(overdue)
    }

    async fn set_listing_status(
        &self,
        listing_id: i64,
        from: ListingStatus,
        to: ListingStatus,
    ) -> Result<bool, EscrowError> {
        let mut listings = self.listings.lock().unwrap();
        let Some(listing) = listings.get_mut(&listing_id) else {
            return Ok(false);
        };
        if listing.status != from {
            return Ok(false);
        }
        listing.status = to;
        Ok(true)
    }

    async fn mark_listing_sold(&self, listing_id: i64) -> Result<bool, EscrowError> {
        let mut listings = self.listings.lock().unwrap();
        let Some(listing) = listings.get_mut(&listing_id) else {
            return Ok(false);
        };
        if !matches!(listing.status, ListingStatus::Sold | ListingStatus::Active) {
            return Ok(false);
        }
        listing.status = ListingStatus::Sold;
        Ok(true)
    }

    async fn insert_payout(
        &self,
        new: &NewPayout,
        now: DateTime<Utc>,
    ) -> Result<i64, EscrowError> {
        if *self.fail_insert_payout.lock().unwrap() {
            return Err(EscrowError::DatabaseError(
                "payouts_tb insert rejected".to_string(),
            ));
        }
        let id = self.next_payout_id.fetch_add(1, Ordering::SeqCst);
        self.payouts.lock().unwrap().push(Payout {
            id,
            purchase_id: new.purchase_id,
            seller_id: new.seller_id,
            amount: new.amount,
            status: PayoutStatus::Completed,
            method: new.method,
            provider_ref: new.provider_ref.clone(),
            processed_at: now,
        });
        Ok(id)
    }

    async fn payouts_for_purchase(&self, id: PurchaseId) -> Result<Vec<Payout>, EscrowError> {
        Ok(self
            .payouts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.purchase_id == id)
            .cloned()
            .collect())
    }

    async fn seller_profile(&self, seller_id: i64) -> Result<Option<SellerProfile>, EscrowError> {
        Ok(self.sellers.lock().unwrap().get(&seller_id).cloned())
    }

    async fn penalize_seller(&self, seller_id: i64, penalty: i32) -> Result<(), EscrowError> {
        if let Some(profile) = self.sellers.lock().unwrap().get_mut(&seller_id) {
            profile.reliability_score = (profile.reliability_score - penalty).max(0);
        }
        Ok(())
    }

    async fn user_email(&self, user_id: i64) -> Result<Option<String>, EscrowError> {
        Ok(self.emails.lock().unwrap().get(&user_id).cloned())
    }

    async fn bump_rate_window(
        &self,
        key: &str,
        window_start: DateTime<Utc>,
    ) -> Result<i64, EscrowError> {
        let mut windows = self.rate_windows.lock().unwrap();
        let count = windows
            .entry((key.to_string(), window_start))
            .and_modify(|c| *c += 1)
            .or_insert(1);
        Ok(*count)
    }
}
