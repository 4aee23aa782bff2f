//! Purchase Escrow Core
//!
//! Drives a fixed-price domain purchase from captured payment to a
//! terminal state: seller payout, buyer refund, or admin-resolved
//! dispute.
//!
//! # Lifecycle
//!
//! ```text
//!                      payment captured
//!                            |
//!                            v
//!        +----------- AWAITING_SELLER ----------+
//!        | seller submits       72h deadline    |
//!        v                      missed          v
//!  AWAITING_BUYER -----------------------> FAILED (refunded,
//!        |                \                      listing re-activated)
//!        | buyer confirms  \ 7d deadline
//!        | or dispute       \ missed
//!        v                   v
//!    DISPUTED           COMPLETED (payout routed)
//!        |                   ^
//!        | admin resolves    |
//!        +---> buyer_refunded -> FAILED
//!        +---> seller_paid ------+
//! ```
//!
//! Writes follow read → external call → conditional update. Every
//! transition is a CAS on the expected current state; the PENDING→
//! COMPLETED flip is the single-fire gate in front of the payout router.

pub mod adapters;
pub mod api;
pub mod coordinator;
pub mod db;
pub mod error;
pub mod payout;
pub mod state;
pub mod sweeper;
pub mod testing;
pub mod types;
pub mod worker;

pub use coordinator::{EscrowCoordinator, EscrowPolicy};
pub use db::{EscrowStore, PgStore};
pub use error::EscrowError;
pub use payout::PayoutRouter;
pub use state::{EscrowStage, TransferStatus};
pub use sweeper::{DeadlineSweeper, SweepReport};
pub use types::{DisputeOutcome, PayoutOutcome, Purchase, PurchaseId};
pub use worker::{SweepWorker, WorkerConfig};

#[cfg(test)]
mod integration_tests;
