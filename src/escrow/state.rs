//! Escrow State Definitions
//!
//! `TransferStatus` is the coarse, persisted state column. `EscrowStage` is
//! the full lifecycle stage derived from the status column plus the
//! auxiliary timestamp/dispute fields, computed once when a row is loaded.

use chrono::{DateTime, Utc};
use std::fmt;

use super::error::EscrowError;
use super::types::{DisputeOutcome, Purchase};

/// Persisted transfer status
///
/// State IDs are designed for PostgreSQL storage as SMALLINT.
/// Terminal states: COMPLETED (10), FAILED (-10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum TransferStatus {
    /// Escrow open - waiting on the seller or the buyer
    Pending = 0,

    /// Terminal: domain transfer confirmed (by buyer or auto-release)
    Completed = 10,

    /// Administrative hold - resolved only by explicit admin action
    Disputed = 20,

    /// Terminal: escrow failed and the buyer was refunded
    Failed = -10,
}

impl TransferStatus {
    /// Check if this is a terminal state (no more transitions possible)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferStatus::Completed | TransferStatus::Failed)
    }

    /// Get the numeric state ID for PostgreSQL storage
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    /// Convert from PostgreSQL state ID
    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(TransferStatus::Pending),
            10 => Some(TransferStatus::Completed),
            20 => Some(TransferStatus::Disputed),
            -10 => Some(TransferStatus::Failed),
            _ => None,
        }
    }

    /// Get human-readable status name
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "PENDING",
            TransferStatus::Completed => "COMPLETED",
            TransferStatus::Disputed => "DISPUTED",
            TransferStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<i16> for TransferStatus {
    type Error = ();

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        TransferStatus::from_id(value).ok_or(())
    }
}

/// Derived lifecycle stage of a purchase
///
/// The record store keeps only `TransferStatus` plus nullable auxiliary
/// fields; the combinations that matter are made explicit here so callers
/// match on one value instead of re-testing nullable columns.
///
/// ```text
/// AwaitingSeller ──initiate──▶ AwaitingBuyer ──confirm/auto──▶ Completed
///       │                           │
///       │ deadline missed           │ dispute
///       ▼                           ▼
///    Refunded ◀──buyer_refunded── Disputed ──seller_paid──▶ Completed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscrowStage {
    /// Seller has not submitted transfer credentials yet
    AwaitingSeller { transfer_deadline: DateTime<Utc> },

    /// Seller submitted; buyer must confirm receipt before the deadline
    AwaitingBuyer {
        buyer_confirmation_deadline: DateTime<Utc>,
    },

    /// Terminal: transfer confirmed, payout routed (or operator-visible failure)
    Completed { auto_released: bool },

    /// Held for admin review; no money moves until resolution
    Disputed { opened_at: DateTime<Utc> },

    /// Terminal: escrow failed, buyer refunded
    Refunded { outcome: Option<DisputeOutcome> },
}

impl EscrowStage {
    /// Derive the stage from a raw purchase record.
    ///
    /// Rejects impossible field combinations as a data-integrity error
    /// instead of silently tolerating them:
    /// - buyer confirmation deadline set while `transfer_initiated_at` is null
    /// - `transfer_initiated_at` set without a confirmation deadline
    /// - DISPUTED status without `dispute_opened_at`
    /// - PENDING status carrying `dispute_resolved_at`
    pub fn of(p: &Purchase) -> Result<EscrowStage, EscrowError> {
        match (p.transfer_initiated_at, p.buyer_confirmation_deadline) {
            (None, Some(_)) => {
                return Err(EscrowError::CorruptRecord(format!(
                    "purchase {}: buyer_confirmation_deadline set but transfer never initiated",
                    p.id
                )));
            }
            (Some(_), None) => {
                return Err(EscrowError::CorruptRecord(format!(
                    "purchase {}: transfer_initiated_at set without buyer_confirmation_deadline",
                    p.id
                )));
            }
            _ => {}
        }

        match p.transfer_status {
            TransferStatus::Pending => {
                if p.dispute_resolved_at.is_some() {
                    return Err(EscrowError::CorruptRecord(format!(
                        "purchase {}: pending but dispute already resolved",
                        p.id
                    )));
                }
                match p.buyer_confirmation_deadline {
                    None => Ok(EscrowStage::AwaitingSeller {
                        transfer_deadline: p.transfer_deadline,
                    }),
                    Some(deadline) => Ok(EscrowStage::AwaitingBuyer {
                        buyer_confirmation_deadline: deadline,
                    }),
                }
            }
            TransferStatus::Completed => Ok(EscrowStage::Completed {
                auto_released: p.auto_released,
            }),
            TransferStatus::Disputed => match p.dispute_opened_at {
                Some(opened_at) => Ok(EscrowStage::Disputed { opened_at }),
                None => Err(EscrowError::CorruptRecord(format!(
                    "purchase {}: disputed without dispute_opened_at",
                    p.id
                ))),
            },
            TransferStatus::Failed => Ok(EscrowStage::Refunded {
                outcome: p.dispute_outcome,
            }),
        }
    }

    /// Stage name for logs and API responses
    pub fn as_str(&self) -> &'static str {
        match self {
            EscrowStage::AwaitingSeller { .. } => "AWAITING_SELLER",
            EscrowStage::AwaitingBuyer { .. } => "AWAITING_BUYER",
            EscrowStage::Completed { .. } => "COMPLETED",
            EscrowStage::Disputed { .. } => "DISPUTED",
            EscrowStage::Refunded { .. } => "REFUNDED",
        }
    }
}

impl fmt::Display for EscrowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::escrow::testing::purchase_fixture;
    use chrono::Duration;

    #[test]
    fn test_terminal_states() {
        assert!(TransferStatus::Completed.is_terminal());
        assert!(TransferStatus::Failed.is_terminal());

        assert!(!TransferStatus::Pending.is_terminal());
        assert!(!TransferStatus::Disputed.is_terminal());
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            TransferStatus::Pending,
            TransferStatus::Completed,
            TransferStatus::Disputed,
            TransferStatus::Failed,
        ] {
            assert_eq!(TransferStatus::from_id(status.id()), Some(status));
        }
        assert_eq!(TransferStatus::from_id(99), None);
    }

    #[test]
    fn test_stage_awaiting_seller() {
        let p = purchase_fixture();
        let stage = EscrowStage::of(&p).unwrap();
        assert!(matches!(stage, EscrowStage::AwaitingSeller { .. }));
    }

    #[test]
    fn test_stage_awaiting_buyer() {
        let mut p = purchase_fixture();
        let now = Utc::now();
        p.transfer_initiated_at = Some(now);
        p.buyer_confirmation_deadline = Some(now + Duration::days(7));

        match EscrowStage::of(&p).unwrap() {
            EscrowStage::AwaitingBuyer {
                buyer_confirmation_deadline,
            } => assert!(buyer_confirmation_deadline >= now),
            other => panic!("unexpected stage: {other}"),
        }
    }

    #[test]
    fn test_stage_rejects_deadline_without_initiation() {
        let mut p = purchase_fixture();
        p.buyer_confirmation_deadline = Some(Utc::now());

        assert!(matches!(
            EscrowStage::of(&p),
            Err(EscrowError::CorruptRecord(_))
        ));
    }

    #[test]
    fn test_stage_rejects_disputed_without_opened_at() {
        let mut p = purchase_fixture();
        p.transfer_status = TransferStatus::Disputed;

        assert!(matches!(
            EscrowStage::of(&p),
            Err(EscrowError::CorruptRecord(_))
        ));
    }

    #[test]
    fn test_refunded_carries_outcome() {
        let mut p = purchase_fixture();
        p.transfer_status = TransferStatus::Failed;
        p.dispute_outcome = Some(DisputeOutcome::BuyerRefunded);

        match EscrowStage::of(&p).unwrap() {
            EscrowStage::Refunded { outcome } => {
                assert_eq!(outcome, Some(DisputeOutcome::BuyerRefunded))
            }
            other => panic!("unexpected stage: {other}"),
        }
    }
}
