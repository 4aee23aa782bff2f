//! Seller profile model
//!
//! Carries the payout routing data (preferred rail plus per-rail account
//! identifiers) and the reliability score the dispute handler penalizes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Payout rail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i16)]
#[serde(rename_all = "lowercase")]
pub enum PayoutMethod {
    /// Card-processor transfer to a connected account
    Stripe = 1,
    /// Peer payout network keyed by email
    Paypal = 2,
}

impl PayoutMethod {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(PayoutMethod::Stripe),
            2 => Some(PayoutMethod::Paypal),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutMethod::Stripe => "stripe",
            PayoutMethod::Paypal => "paypal",
        }
    }
}

impl fmt::Display for PayoutMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Seller payout profile
#[derive(Debug, Clone)]
pub struct SellerProfile {
    pub seller_id: i64,
    pub email: String,
    /// Preferred rail; None when the seller never picked one
    pub payout_method: Option<PayoutMethod>,
    /// PayPal payout email, if on file
    pub paypal_email: Option<String>,
    /// Connected card-processor payout account, if on file
    pub stripe_account_id: Option<String>,
    /// Reliability score, floor 0; penalized when a dispute is lost
    pub reliability_score: i32,
    pub created_at: DateTime<Utc>,
}

impl SellerProfile {
    /// Whether the PayPal rail is usable for this seller
    #[inline]
    pub fn has_paypal(&self) -> bool {
        self.paypal_email.as_deref().is_some_and(|e| !e.is_empty())
    }

    /// Whether the card-processor rail is usable for this seller
    #[inline]
    pub fn has_stripe(&self) -> bool {
        self.stripe_account_id
            .as_deref()
            .is_some_and(|a| !a.is_empty())
    }
}
