//! Escrow Error Types
//!
//! One error enum for the whole escrow module, with stable string codes
//! and HTTP status suggestions for the API layer.

use thiserror::Error;

/// Escrow operation errors
#[derive(Error, Debug, Clone)]
pub enum EscrowError {
    // === Validation Errors (no side effects, no retry) ===
    #[error("User not authenticated")]
    Unauthorized,

    #[error("Caller does not own this listing")]
    Forbidden,

    #[error("Admin privileges required")]
    AdminRequired,

    #[error("{0}")]
    ValidationFailed(String),

    // === State Errors ===
    #[error("Invalid state for this operation: {0}")]
    InvalidState(String),

    #[error("Purchase not found: {0}")]
    PurchaseNotFound(String),

    #[error("Listing not found: {0}")]
    ListingNotFound(i64),

    #[error("Listing is not available for purchase")]
    ListingUnavailable,

    #[error("No dispute open for this purchase")]
    DisputeNotOpen,

    #[error("Dispute is already resolved")]
    AlreadyResolved,

    // === Data Integrity ===
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    // === External Providers ===
    #[error("Payment provider error: {0}")]
    ProviderError(String),

    // === Rate Limiting ===
    #[error("Too many attempts, try again later")]
    RateLimited,

    // === System Errors ===
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal system error: {0}")]
    SystemError(String),
}

impl EscrowError {
    /// Get the stable error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            EscrowError::Unauthorized => "UNAUTHORIZED",
            EscrowError::Forbidden => "FORBIDDEN",
            EscrowError::AdminRequired => "ADMIN_REQUIRED",
            EscrowError::ValidationFailed(_) => "VALIDATION_FAILED",
            EscrowError::InvalidState(_) => "INVALID_STATE",
            EscrowError::PurchaseNotFound(_) => "PURCHASE_NOT_FOUND",
            EscrowError::ListingNotFound(_) => "LISTING_NOT_FOUND",
            EscrowError::ListingUnavailable => "LISTING_UNAVAILABLE",
            EscrowError::DisputeNotOpen => "DISPUTE_NOT_OPEN",
            EscrowError::AlreadyResolved => "ALREADY_RESOLVED",
            EscrowError::CorruptRecord(_) => "CORRUPT_RECORD",
            EscrowError::ProviderError(_) => "PROVIDER_ERROR",
            EscrowError::RateLimited => "RATE_LIMITED",
            EscrowError::DatabaseError(_) => "DATABASE_ERROR",
            EscrowError::SystemError(_) => "SYSTEM_ERROR",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            EscrowError::Unauthorized => 401,
            EscrowError::Forbidden | EscrowError::AdminRequired => 403,
            EscrowError::ValidationFailed(_)
            | EscrowError::InvalidState(_)
            | EscrowError::ListingUnavailable
            | EscrowError::DisputeNotOpen
            | EscrowError::AlreadyResolved => 400,
            EscrowError::PurchaseNotFound(_) | EscrowError::ListingNotFound(_) => 404,
            EscrowError::RateLimited => 429,
            EscrowError::ProviderError(_) => 502,
            EscrowError::CorruptRecord(_)
            | EscrowError::DatabaseError(_)
            | EscrowError::SystemError(_) => 500,
        }
    }
}

impl From<sqlx::Error> for EscrowError {
    fn from(e: sqlx::Error) -> Self {
        EscrowError::DatabaseError(e.to_string())
    }
}

impl From<anyhow::Error> for EscrowError {
    fn from(e: anyhow::Error) -> Self {
        EscrowError::SystemError(e.to_string())
    }
}
