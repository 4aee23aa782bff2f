//! Deadline sweepers
//!
//! Two batch scans over overdue purchases: the seller sweep refunds
//! buyers whose seller never submitted credentials, the buyer sweep
//! auto-releases transfers the buyer never confirmed. One purchase
//! failing never stops the rest of the batch, and every step inside an
//! item is the same CAS the interactive paths use, so re-running a sweep
//! after a crash is harmless.

use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;

use super::coordinator::EscrowCoordinator;
use super::error::EscrowError;
use super::types::PurchaseId;

/// Outcome of one purchase within a sweep batch
#[derive(Debug, Serialize, ToSchema)]
pub struct SweepItem {
    pub purchase_id: PurchaseId,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of a whole sweep batch
#[derive(Debug, Serialize, ToSchema)]
pub struct SweepReport {
    pub scanned: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub items: Vec<SweepItem>,
}

impl SweepReport {
    fn from_items(items: Vec<SweepItem>) -> Self {
        let succeeded = items.iter().filter(|i| i.success).count();
        Self {
            scanned: items.len(),
            succeeded,
            failed: items.len() - succeeded,
            items,
        }
    }
}

/// Runs both deadline sweeps against the coordinator
pub struct DeadlineSweeper {
    coordinator: Arc<EscrowCoordinator>,
    batch_limit: i64,
}

impl DeadlineSweeper {
    pub fn new(coordinator: Arc<EscrowCoordinator>, batch_limit: i64) -> Self {
        Self {
            coordinator,
            batch_limit,
        }
    }

    /// Refund purchases whose seller missed the submission deadline
    pub async fn sweep_seller_deadline(&self) -> Result<SweepReport, EscrowError> {
        let now = chrono::Utc::now();
        let overdue = self
            .coordinator
            .store()
            .find_seller_overdue(now, self.batch_limit)
            .await?;

        let mut items = Vec::with_capacity(overdue.len());
        for purchase in &overdue {
            let item = match self.coordinator.refund_unstarted(purchase).await {
                Ok(()) => SweepItem {
                    purchase_id: purchase.id,
                    success: true,
                    error: None,
                },
                Err(e) => {
                    error!(purchase_id = %purchase.id, error = %e, "Seller-deadline sweep item failed");
                    SweepItem {
                        purchase_id: purchase.id,
                        success: false,
                        error: Some(e.to_string()),
                    }
                }
            };
            items.push(item);
        }

        let report = SweepReport::from_items(items);
        info!(
            scanned = report.scanned,
            succeeded = report.succeeded,
            failed = report.failed,
            "Seller-deadline sweep finished"
        );
        Ok(report)
    }

    /// Auto-release purchases whose buyer missed the confirmation deadline
    pub async fn sweep_buyer_deadline(&self) -> Result<SweepReport, EscrowError> {
        let now = chrono::Utc::now();
        let overdue = self
            .coordinator
            .store()
            .find_buyer_overdue(now, self.batch_limit)
            .await?;

        let mut items = Vec::with_capacity(overdue.len());
        for purchase in &overdue {
            let item = match self.coordinator.auto_release(purchase).await {
                Ok(()) => SweepItem {
                    purchase_id: purchase.id,
                    success: true,
                    error: None,
                },
                Err(e) => {
                    error!(purchase_id = %purchase.id, error = %e, "Buyer-deadline sweep item failed");
                    SweepItem {
                        purchase_id: purchase.id,
                        success: false,
                        error: Some(e.to_string()),
                    }
                }
            };
            items.push(item);
        }

        let report = SweepReport::from_items(items);
        info!(
            scanned = report.scanned,
            succeeded = report.succeeded,
            failed = report.failed,
            "Buyer-deadline sweep finished"
        );
        Ok(report)
    }
}
