//! Listing model
//!
//! Listings are mostly managed by the (out-of-scope) marketplace CRUD; the
//! escrow core touches them at exactly three points: the atomic
//! active→sold flip at purchase creation, re-activation when an escrow
//! fails, and the idempotent sold re-assert on a seller-won dispute.

use chrono::{DateTime, Utc};
use std::fmt;

/// Listing status
///
/// Stored as SMALLINT. Only ACTIVE listings are purchasable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum ListingStatus {
    /// Submitted, listing fee not captured yet
    PendingPayment = 0,
    /// Fee captured, waiting on DNS ownership verification
    PendingVerification = 1,
    /// Live on the marketplace
    Active = 2,
    /// Purchased; exactly one non-terminal purchase references it
    Sold = 3,
    /// Hidden by the seller
    Paused = 4,
    /// Domain registration lapsed before sale
    Expired = 5,
    /// Taken down by moderation
    Removed = 6,
}

impl ListingStatus {
    /// Get numeric ID for PostgreSQL storage
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    /// Convert from PostgreSQL ID
    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(ListingStatus::PendingPayment),
            1 => Some(ListingStatus::PendingVerification),
            2 => Some(ListingStatus::Active),
            3 => Some(ListingStatus::Sold),
            4 => Some(ListingStatus::Paused),
            5 => Some(ListingStatus::Expired),
            6 => Some(ListingStatus::Removed),
            _ => None,
        }
    }

    /// Get human-readable name
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::PendingPayment => "PENDING_PAYMENT",
            ListingStatus::PendingVerification => "PENDING_VERIFICATION",
            ListingStatus::Active => "ACTIVE",
            ListingStatus::Sold => "SOLD",
            ListingStatus::Paused => "PAUSED",
            ListingStatus::Expired => "EXPIRED",
            ListingStatus::Removed => "REMOVED",
        }
    }

    /// Whether a buyer may purchase this listing
    #[inline]
    pub fn is_purchasable(&self) -> bool {
        matches!(self, ListingStatus::Active)
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<i16> for ListingStatus {
    type Error = ();

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        ListingStatus::from_id(value).ok_or(())
    }
}

/// Marketplace listing
#[derive(Debug, Clone)]
pub struct Listing {
    pub id: i64,
    pub seller_id: i64,
    pub domain_name: String,
    pub status: ListingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
