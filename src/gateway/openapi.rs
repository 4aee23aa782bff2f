//! OpenAPI / Swagger UI documentation
//!
//! - Swagger UI: `http://localhost:8080/docs`
//! - OpenAPI JSON: `http://localhost:8080/api-docs/openapi.json`

use utoipa::openapi::security::{ApiKey, ApiKeyValue, Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::escrow::api::{
    CompletionView, InitiateTransferRequest, OpenDisputeRequest, PaymentCapturedRequest,
    PurchaseView, ResolveDisputeRequest,
};
use crate::escrow::sweeper::{SweepItem, SweepReport};
use crate::gateway::handlers::HealthResponse;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "jwt_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
            components.add_security_scheme(
                "internal_secret",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                    "X-Internal-Secret",
                    "Shared secret for the internal scheduler surface",
                ))),
            );
        }
    }
}

/// Main API documentation struct
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Namedrop Escrow API",
        version = "1.0.0",
        description = "Fixed-price domain marketplace: purchase-to-payout escrow core."
    ),
    servers(
        (url = "http://localhost:8080", description = "Development"),
    ),
    paths(
        crate::gateway::handlers::health_check,
        crate::gateway::handlers::get_purchase,
        crate::gateway::handlers::initiate_transfer,
        crate::gateway::handlers::confirm_transfer,
        crate::gateway::handlers::open_dispute,
        crate::gateway::handlers::resolve_dispute,
        crate::gateway::handlers::payment_captured,
        crate::gateway::handlers::sweep_seller_deadline,
        crate::gateway::handlers::sweep_buyer_deadline,
    ),
    components(
        schemas(
            HealthResponse,
            PurchaseView,
            CompletionView,
            InitiateTransferRequest,
            OpenDisputeRequest,
            ResolveDisputeRequest,
            PaymentCapturedRequest,
            SweepItem,
            SweepReport,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Escrow", description = "Purchase escrow lifecycle"),
        (name = "Admin", description = "Dispute resolution (admin JWT required)"),
        (name = "Internal", description = "Scheduler surface (shared secret required)"),
        (name = "System", description = "Health checks")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_generation() {
        let doc = ApiDoc::openapi();
        let json = doc.to_json().unwrap();
        assert!(json.contains("/api/v1/purchases/{id}/confirm-transfer"));
        assert!(json.contains("/internal/sweeps/seller-deadline"));
    }
}
