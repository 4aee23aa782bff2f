//! Escrow lifecycle handlers
//!
//! The purchase id doubles as the transfer token: buyer-side endpoints
//! (get, confirm, dispute) authenticate by possession of the id, so an
//! unparseable or unknown id is always a plain 404.

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use validator::Validate;

use super::super::state::AppState;
use super::super::types::{ApiResult, escrow_error, ok};
use crate::auth::Claims;
use crate::escrow::api::{
    CompletionView, InitiateTransferRequest, OpenDisputeRequest, PaymentCapturedRequest,
    PurchaseView, ResolveDisputeRequest,
};
use crate::escrow::error::EscrowError;
use crate::escrow::state::EscrowStage;
use crate::escrow::types::{DisputeOutcome, NewPurchase, PayoutOutcome, PurchaseId};

fn parse_id(raw: &str) -> Result<PurchaseId, EscrowError> {
    PurchaseId::from_str(raw).map_err(|_| EscrowError::PurchaseNotFound(raw.to_string()))
}

fn validation<T: Validate>(req: &T) -> Result<(), EscrowError> {
    req.validate()
        .map_err(|e| EscrowError::ValidationFailed(e.to_string()))
}

/// Get purchase status
///
/// GET /api/v1/purchases/{id}
#[utoipa::path(
    get,
    path = "/api/v1/purchases/{id}",
    params(("id" = String, Path, description = "Purchase id (transfer token)")),
    responses(
        (status = 200, description = "Purchase status", body = PurchaseView),
        (status = 404, description = "Purchase not found")
    ),
    tag = "Escrow"
)]
pub async fn get_purchase(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<PurchaseView> {
    let result = async {
        let id = parse_id(&id)?;
        let purchase = state
            .store
            .get_purchase(id)
            .await?
            .ok_or_else(|| EscrowError::PurchaseNotFound(id.to_string()))?;
        let stage = EscrowStage::of(&purchase)?;
        Ok(PurchaseView::from_purchase(&purchase, &stage))
    }
    .await;

    match result {
        Ok(view) => ok(view),
        Err(e) => escrow_error(e),
    }
}

/// Seller submits transfer credentials
///
/// POST /api/v1/purchases/{id}/initiate-transfer
#[utoipa::path(
    post,
    path = "/api/v1/purchases/{id}/initiate-transfer",
    params(("id" = String, Path, description = "Purchase id")),
    request_body = InitiateTransferRequest,
    responses(
        (status = 200, description = "Transfer initiated", body = PurchaseView),
        (status = 400, description = "Invalid state or parameters"),
        (status = 401, description = "Authentication required"),
        (status = 403, description = "Caller does not own this listing"),
        (status = 404, description = "Purchase not found")
    ),
    security(("jwt_auth" = [])),
    tag = "Escrow"
)]
pub async fn initiate_transfer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<InitiateTransferRequest>,
) -> ApiResult<PurchaseView> {
    let result = async {
        validation(&req)?;
        let id = parse_id(&id)?;
        let purchase = state
            .coordinator
            .initiate_transfer(id, claims.sub, &req.auth_code, req.notes.as_deref())
            .await?;
        let stage = EscrowStage::of(&purchase)?;
        Ok(PurchaseView::from_purchase(&purchase, &stage))
    }
    .await;

    match result {
        Ok(view) => ok(view),
        Err(e) => escrow_error(e),
    }
}

/// Buyer confirms receipt of the domain
///
/// POST /api/v1/purchases/{id}/confirm-transfer
#[utoipa::path(
    post,
    path = "/api/v1/purchases/{id}/confirm-transfer",
    params(("id" = String, Path, description = "Purchase id (transfer token)")),
    responses(
        (status = 200, description = "Transfer confirmed", body = CompletionView),
        (status = 400, description = "Invalid state"),
        (status = 404, description = "Purchase not found")
    ),
    tag = "Escrow"
)]
pub async fn confirm_transfer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<CompletionView> {
    let result = async {
        let id = parse_id(&id)?;
        let payout = state.coordinator.confirm_receipt(id).await?;
        Ok(CompletionView::new(id, &payout))
    }
    .await;

    match result {
        Ok(view) => ok(view),
        Err(e) => escrow_error(e),
    }
}

/// Open a dispute on an active purchase
///
/// POST /api/v1/purchases/{id}/open-dispute
#[utoipa::path(
    post,
    path = "/api/v1/purchases/{id}/open-dispute",
    params(("id" = String, Path, description = "Purchase id (transfer token)")),
    request_body = OpenDisputeRequest,
    responses(
        (status = 200, description = "Dispute opened"),
        (status = 400, description = "Invalid state or parameters"),
        (status = 404, description = "Purchase not found"),
        (status = 429, description = "Too many attempts")
    ),
    tag = "Escrow"
)]
pub async fn open_dispute(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<OpenDisputeRequest>,
) -> ApiResult<()> {
    let result = async {
        validation(&req)?;
        let id = parse_id(&id)?;
        state.check_dispute_rate(&id.to_string()).await?;
        state.coordinator.open_dispute(id, &req.reason).await
    }
    .await;

    match result {
        Ok(()) => ok(()),
        Err(e) => escrow_error(e),
    }
}

/// Admin resolves an open dispute
///
/// POST /api/v1/admin/purchases/{id}/resolve-dispute
#[utoipa::path(
    post,
    path = "/api/v1/admin/purchases/{id}/resolve-dispute",
    params(("id" = String, Path, description = "Purchase id")),
    request_body = ResolveDisputeRequest,
    responses(
        (status = 200, description = "Dispute resolved", body = CompletionView),
        (status = 400, description = "Invalid outcome or dispute state"),
        (status = 401, description = "Authentication required"),
        (status = 403, description = "Admin privileges required"),
        (status = 404, description = "Purchase not found"),
        (status = 502, description = "Refund provider error")
    ),
    security(("jwt_auth" = [])),
    tag = "Admin"
)]
pub async fn resolve_dispute(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ResolveDisputeRequest>,
) -> ApiResult<CompletionView> {
    let result = async {
        if !claims.admin {
            return Err(EscrowError::AdminRequired);
        }
        let id = parse_id(&id)?;
        let payout = state.coordinator.resolve_dispute(id, req.outcome).await?;

        Ok(match payout {
            Some(payout) => CompletionView::new(id, &payout),
            None => CompletionView::new(
                id,
                &PayoutOutcome::NotSent {
                    reason: DisputeOutcome::BuyerRefunded.to_string(),
                },
            ),
        })
    }
    .await;

    match result {
        Ok(view) => ok(view),
        Err(e) => escrow_error(e),
    }
}

/// Internal payment-capture callback: creates the purchase
///
/// POST /internal/payment-captured
#[utoipa::path(
    post,
    path = "/internal/payment-captured",
    request_body = PaymentCapturedRequest,
    responses(
        (status = 200, description = "Purchase created", body = PurchaseView),
        (status = 400, description = "Invalid parameters or listing unavailable"),
        (status = 401, description = "Missing or invalid internal secret"),
        (status = 404, description = "Listing not found")
    ),
    security(("internal_secret" = [])),
    tag = "Internal"
)]
pub async fn payment_captured(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PaymentCapturedRequest>,
) -> ApiResult<PurchaseView> {
    let result = async {
        validation(&req)?;
        let purchase = state
            .coordinator
            .create_purchase(NewPurchase {
                listing_id: req.listing_id,
                buyer_id: req.buyer_id,
                payment_reference: req.payment_reference,
                amount_paid: req.amount_paid,
                processing_fee: req.processing_fee,
            })
            .await?;
        let stage = EscrowStage::of(&purchase)?;
        Ok(PurchaseView::from_purchase(&purchase, &stage))
    }
    .await;

    match result {
        Ok(view) => ok(view),
        Err(e) => escrow_error(e),
    }
}
