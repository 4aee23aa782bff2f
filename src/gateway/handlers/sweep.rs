//! Internal sweep triggers
//!
//! The same sweeps the background worker runs, exposed for external
//! schedulers and operators. Every item transition is CAS-guarded, so a
//! manual trigger overlapping a worker run is harmless.

use std::sync::Arc;

use axum::extract::State;

use super::super::state::AppState;
use super::super::types::{ApiResult, escrow_error, ok};
use crate::escrow::sweeper::SweepReport;

/// Run the seller-deadline sweep
///
/// POST /internal/sweeps/seller-deadline
#[utoipa::path(
    post,
    path = "/internal/sweeps/seller-deadline",
    responses(
        (status = 200, description = "Sweep report", body = SweepReport),
        (status = 401, description = "Missing or invalid internal secret")
    ),
    security(("internal_secret" = [])),
    tag = "Internal"
)]
pub async fn sweep_seller_deadline(State(state): State<Arc<AppState>>) -> ApiResult<SweepReport> {
    match state.sweeper.sweep_seller_deadline().await {
        Ok(report) => ok(report),
        Err(e) => escrow_error(e),
    }
}

/// Run the buyer-deadline sweep
///
/// POST /internal/sweeps/buyer-deadline
#[utoipa::path(
    post,
    path = "/internal/sweeps/buyer-deadline",
    responses(
        (status = 200, description = "Sweep report", body = SweepReport),
        (status = 401, description = "Missing or invalid internal secret")
    ),
    security(("internal_secret" = [])),
    tag = "Internal"
)]
pub async fn sweep_buyer_deadline(State(state): State<Arc<AppState>>) -> ApiResult<SweepReport> {
    match state.sweeper.sweep_buyer_deadline().await {
        Ok(report) => ok(report),
        Err(e) => escrow_error(e),
    }
}
