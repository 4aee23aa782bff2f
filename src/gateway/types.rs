//! API response types and error codes
//!
//! - `ApiResponse<T>`: unified response wrapper
//! - `error_codes`: stable error code constants for the gateway layer

use axum::Json;
use axum::http::StatusCode;
use serde::Serialize;
use utoipa::ToSchema;

use crate::escrow::error::EscrowError;

/// Unified API response wrapper
///
/// All API responses follow this structure:
/// - code: "OK" = success, otherwise a stable error code
/// - msg: short message description
/// - data: actual data (success) or absent (error)
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    /// "OK" for success, stable error code otherwise
    #[schema(example = "OK")]
    pub code: String,
    /// Response message
    #[schema(example = "ok")]
    pub msg: String,
    /// Response data (only present when code == "OK")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Create success response
    pub fn success(data: T) -> Self {
        Self {
            code: error_codes::SUCCESS.to_string(),
            msg: "ok".to_string(),
            data: Some(data),
        }
    }

    /// Create error response
    pub fn error(code: &str, msg: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            code: code.to_string(),
            msg: msg.into(),
            data: None,
        }
    }
}

/// Handler result: success envelope or (status, error envelope)
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, (StatusCode, Json<ApiResponse<()>>)>;

/// Wrap a success value
pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data)))
}

/// Map an escrow error to the HTTP error envelope. Internal detail is
/// logged, not exposed.
pub fn escrow_error<T>(e: EscrowError) -> ApiResult<T> {
    let status =
        StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let msg = match &e {
        EscrowError::CorruptRecord(_)
        | EscrowError::DatabaseError(_)
        | EscrowError::SystemError(_) => {
            tracing::error!(error = %e, "Internal error in escrow operation");
            "Internal server error".to_string()
        }
        _ => e.to_string(),
    };

    Err((status, Json(ApiResponse::<()>::error(e.code(), msg))))
}

/// Stable gateway error codes
pub mod error_codes {
    pub const SUCCESS: &str = "OK";

    // Auth errors
    pub const MISSING_AUTH: &str = "MISSING_AUTH";
    pub const AUTH_FAILED: &str = "AUTH_FAILED";

    // Server errors
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}
