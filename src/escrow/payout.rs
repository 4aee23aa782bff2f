//! Payout Router
//!
//! Routes a seller payout across the two rails (peer payout network,
//! card-processor transfer) as a strategy list evaluated in preference
//! order. The first rail to succeed records a completed Payout row and
//! wins; the router itself is stateless per call - the caller's status
//! flip is the idempotency gate that keeps it single-fire per purchase.

use std::sync::Arc;
use tracing::{error, info, warn};

use super::adapters::{PaymentProcessor, PayoutNetwork};
use super::db::EscrowStore;
use super::error::EscrowError;
use super::types::{NewPayout, PayoutOutcome, PurchaseId, RailResult};
use crate::seller::{PayoutMethod, SellerProfile};

/// Rails to attempt for a seller, in preference order.
///
/// Preferred rail first when its account data is on file, the other rail
/// as fallback. Sellers with no stated preference get the payout-network
/// rail first (it clears faster for individuals).
pub fn rail_order(profile: &SellerProfile) -> Vec<PayoutMethod> {
    let paypal_ok = profile.has_paypal();
    let stripe_ok = profile.has_stripe();

    let preference = match profile.payout_method {
        Some(PayoutMethod::Stripe) => [PayoutMethod::Stripe, PayoutMethod::Paypal],
        Some(PayoutMethod::Paypal) | None => [PayoutMethod::Paypal, PayoutMethod::Stripe],
    };

    preference
        .into_iter()
        .filter(|method| match method {
            PayoutMethod::Paypal => paypal_ok,
            PayoutMethod::Stripe => stripe_ok,
        })
        .collect()
}

/// Payout Router - executes the rail strategy list
pub struct PayoutRouter {
    store: Arc<dyn EscrowStore>,
    processor: Arc<dyn PaymentProcessor>,
    network: Arc<dyn PayoutNetwork>,
}

impl PayoutRouter {
    pub fn new(
        store: Arc<dyn EscrowStore>,
        processor: Arc<dyn PaymentProcessor>,
        network: Arc<dyn PayoutNetwork>,
    ) -> Self {
        Self {
            store,
            processor,
            network,
        }
    }

    /// Attempt to pay `amount` to the seller for `purchase_id`.
    ///
    /// Returns Ok in both the sent and not-sent cases: a payout that could
    /// not be routed is an operator concern, never fatal to the transfer
    /// completion that triggered it. Only record-store failures error.
    pub async fn payout(
        &self,
        seller_id: i64,
        amount: i64,
        purchase_id: PurchaseId,
        memo: &str,
    ) -> Result<PayoutOutcome, EscrowError> {
        let Some(profile) = self.store.seller_profile(seller_id).await? else {
            warn!(seller_id, purchase_id = %purchase_id, "No seller profile, payout not routed");
            return Ok(PayoutOutcome::NotSent {
                reason: "seller has no payout profile".to_string(),
            });
        };

        let rails = rail_order(&profile);
        if rails.is_empty() {
            warn!(seller_id, purchase_id = %purchase_id, "No payout rail configured");
            return Ok(PayoutOutcome::NotSent {
                reason: "no payout method configured".to_string(),
            });
        }

        let mut last_error = String::new();

        for method in rails {
            let result = self
                .attempt_rail(method, &profile, amount, purchase_id, memo)
                .await;

            match result {
                RailResult::Success(provider_ref) => {
                    let new = NewPayout {
                        purchase_id,
                        seller_id,
                        amount,
                        method,
                        provider_ref: provider_ref.clone(),
                    };
                    self.store.insert_payout(&new, chrono::Utc::now()).await?;

                    info!(
                        purchase_id = %purchase_id,
                        seller_id,
                        amount,
                        method = %method,
                        provider_ref = %provider_ref,
                        "Payout sent"
                    );
                    return Ok(PayoutOutcome::Sent {
                        method,
                        provider_ref,
                    });
                }
                RailResult::Failed(e) => {
                    warn!(
                        purchase_id = %purchase_id,
                        method = %method,
                        error = %e,
                        "Payout rail declined, trying next"
                    );
                    last_error = e;
                }
                RailResult::Pending => {
                    // Unknown outcome: funds may have moved. Falling through
                    // to the next rail here could pay the seller twice, so
                    // stop and leave it to operator review.
                    error!(
                        purchase_id = %purchase_id,
                        method = %method,
                        "Payout rail outcome unknown, aborting fallback chain"
                    );
                    return Ok(PayoutOutcome::NotSent {
                        reason: format!("{method} payout outcome unknown, manual review required"),
                    });
                }
            }
        }

        Ok(PayoutOutcome::NotSent {
            reason: format!("all configured rails declined (last error: {last_error})"),
        })
    }

    async fn attempt_rail(
        &self,
        method: PayoutMethod,
        profile: &SellerProfile,
        amount: i64,
        purchase_id: PurchaseId,
        memo: &str,
    ) -> RailResult {
        match method {
            PayoutMethod::Paypal => {
                // rail_order only yields Paypal when the email is on file
                let email = profile.paypal_email.as_deref().unwrap_or_default();
                self.network
                    .send_payout(email, amount, purchase_id, memo)
                    .await
            }
            PayoutMethod::Stripe => {
                let account = profile.stripe_account_id.as_deref().unwrap_or_default();
                self.processor
                    .create_transfer(amount, account, purchase_id, memo)
                    .await
            }
        }
    }
}
