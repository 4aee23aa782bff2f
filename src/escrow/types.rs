//! Escrow Core Types
//!
//! Type definitions for the purchase escrow lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::state::TransferStatus;
use crate::seller::PayoutMethod;

/// Purchase ID - UUID-based unique identifier
///
/// The id doubles as the public transfer token handed to the buyer, so it
/// must be unguessable; UUIDv4 gives 122 bits of entropy with no
/// coordination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(transparent)]
pub struct PurchaseId(uuid::Uuid);

impl PurchaseId {
    /// Generate a new unique PurchaseId
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Get the inner UUID value
    pub fn inner(&self) -> uuid::Uuid {
        self.0
    }
}

impl Default for PurchaseId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PurchaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PurchaseId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(uuid::Uuid::from_str(s)?))
    }
}

impl From<uuid::Uuid> for PurchaseId {
    fn from(id: uuid::Uuid) -> Self {
        Self(id)
    }
}

/// Dispute resolution outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[repr(i16)]
#[serde(rename_all = "snake_case")]
pub enum DisputeOutcome {
    /// Buyer got their money back; listing re-enters the market
    BuyerRefunded = 1,
    /// Seller delivered; escrow completes and payout runs
    SellerPaid = 2,
    /// Legacy catch-all recorded by older admin tooling. Not accepted as a
    /// resolution input - stored value only, so historical rows decode.
    AdminDecision = 3,
}

impl DisputeOutcome {
    /// Get numeric ID for PostgreSQL storage
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    /// Convert from PostgreSQL ID
    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(DisputeOutcome::BuyerRefunded),
            2 => Some(DisputeOutcome::SellerPaid),
            3 => Some(DisputeOutcome::AdminDecision),
            _ => None,
        }
    }

    /// Get human-readable name
    pub fn as_str(&self) -> &'static str {
        match self {
            DisputeOutcome::BuyerRefunded => "buyer_refunded",
            DisputeOutcome::SellerPaid => "seller_paid",
            DisputeOutcome::AdminDecision => "admin_decision",
        }
    }
}

impl fmt::Display for DisputeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Purchase record - the central entity of the escrow core
///
/// All money fields are integer minor currency units.
/// `seller_payout = amount_paid - processing_fee`, computed once at
/// creation and never recomputed.
#[derive(Debug, Clone)]
pub struct Purchase {
    pub id: PurchaseId,
    pub listing_id: i64,
    pub buyer_id: i64,
    pub seller_id: i64,
    /// Processor charge reference, used for refunds
    pub payment_reference: String,
    pub amount_paid: i64,
    pub processing_fee: i64,
    pub seller_payout: i64,
    pub transfer_status: TransferStatus,
    /// Seller must submit transfer credentials by this time (creation + 72h)
    pub transfer_deadline: DateTime<Utc>,
    /// Null until the seller submits; discriminates "awaiting seller"
    /// from "awaiting buyer"
    pub transfer_initiated_at: Option<DateTime<Utc>>,
    pub auth_code: Option<String>,
    pub transfer_notes: Option<String>,
    /// Set iff `transfer_initiated_at` is set (initiation + 7 days)
    pub buyer_confirmation_deadline: Option<DateTime<Utc>>,
    pub transfer_confirmed_at: Option<DateTime<Utc>>,
    /// True when the deadline sweeper, not the buyer, completed the escrow
    pub auto_released: bool,
    pub dispute_reason: Option<String>,
    pub dispute_opened_at: Option<DateTime<Utc>>,
    pub dispute_resolved_at: Option<DateTime<Utc>>,
    pub dispute_outcome: Option<DisputeOutcome>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parameters for creating a purchase at payment-capture time
#[derive(Debug, Clone)]
pub struct NewPurchase {
    pub listing_id: i64,
    pub buyer_id: i64,
    pub payment_reference: String,
    pub amount_paid: i64,
    pub processing_fee: i64,
}

impl NewPurchase {
    /// Seller payout amount, fixed at creation time
    #[inline]
    pub fn seller_payout(&self) -> i64 {
        self.amount_paid - self.processing_fee
    }
}

/// Payout record status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i16)]
pub enum PayoutStatus {
    Pending = 0,
    Processing = 1,
    Completed = 2,
    Failed = -1,
}

impl PayoutStatus {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(PayoutStatus::Pending),
            1 => Some(PayoutStatus::Processing),
            2 => Some(PayoutStatus::Completed),
            -1 => Some(PayoutStatus::Failed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Pending => "PENDING",
            PayoutStatus::Processing => "PROCESSING",
            PayoutStatus::Completed => "COMPLETED",
            PayoutStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Seller payout record
///
/// Inserted only when a payout attempt succeeds - failed attempts are
/// logged, never recorded as rows.
#[derive(Debug, Clone)]
pub struct Payout {
    pub id: i64,
    pub purchase_id: PurchaseId,
    pub seller_id: i64,
    pub amount: i64,
    pub status: PayoutStatus,
    pub method: PayoutMethod,
    /// Provider-specific reference (transfer id or payout batch id)
    pub provider_ref: String,
    pub processed_at: DateTime<Utc>,
}

/// Parameters for recording a completed payout
#[derive(Debug, Clone)]
pub struct NewPayout {
    pub purchase_id: PurchaseId,
    pub seller_id: i64,
    pub amount: i64,
    pub method: PayoutMethod,
    pub provider_ref: String,
}

/// Result of a single external rail/processor call
///
/// `Pending` means the call's outcome is unknown (timeout, 5xx) - the
/// caller must not treat it as an explicit failure.
#[derive(Debug, Clone)]
pub enum RailResult {
    /// Call succeeded; carries the provider reference
    Success(String),
    /// Provider explicitly rejected the call
    Failed(String),
    /// Outcome unknown - retry later, never assume failure
    Pending,
}

impl RailResult {
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, RailResult::Success(_))
    }
}

/// Outcome of a payout-routing attempt
///
/// Payout failure is deliberately not an error: the transfer-completion
/// transition and the money movement are decoupled failure domains.
#[derive(Debug, Clone)]
pub enum PayoutOutcome {
    /// A rail accepted the payout; a completed Payout row was recorded
    Sent {
        method: PayoutMethod,
        provider_ref: String,
    },
    /// Every configured rail declined, or none is configured
    NotSent { reason: String },
}

impl PayoutOutcome {
    #[inline]
    pub fn is_sent(&self) -> bool {
        matches!(self, PayoutOutcome::Sent { .. })
    }

    /// Method that carried the payout, if any
    pub fn method(&self) -> Option<PayoutMethod> {
        match self {
            PayoutOutcome::Sent { method, .. } => Some(*method),
            PayoutOutcome::NotSent { .. } => None,
        }
    }
}
