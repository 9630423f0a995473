//! Generated OpenAPI document, served by Swagger UI.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::config::ADMIN_KEY_HEADER;
use crate::{api, error, models, services};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Repository Compliance Server",
        version = "0.1.0",
        description = "Audits organization repositories against compliance policies and remediates violations"
    ),
    paths(
        api::health::health,
        api::health::ready,
        api::scans::trigger_scan,
        api::scans::latest_scan,
        api::compliance::compliance_summary,
        api::access::check_access,
        api::webhooks::receive_webhook,
    ),
    components(
        schemas(
            error::ErrorResponse,
            api::health::HealthResponse,
            api::health::ReadyResponse,
            api::scans::ScanAcceptedResponse,
            api::scans::LatestScanResponse,
            api::webhooks::WebhookAcceptedResponse,
            models::Scan,
            models::ScanStatus,
            models::ScanSummary,
            models::Repository,
            models::Policy,
            models::PolicyViolation,
            models::ViolationContext,
            models::ComplianceSummary,
            models::ActionKind,
            models::ActionStatus,
            models::ActionLog,
            services::AccessDecision,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Scans", description = "Scan trigger and results"),
        (name = "Compliance", description = "Organization compliance summary"),
        (name = "Access", description = "Dashboard access checks"),
        (name = "Webhooks", description = "GitHub webhook ingress")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Registers the `admin_key` header scheme referenced by operator endpoints.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let scheme = SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(ADMIN_KEY_HEADER)));
        openapi
            .components
            .get_or_insert_with(Default::default)
            .add_security_scheme("admin_key", scheme);
    }
}
