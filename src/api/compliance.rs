//! Organization compliance summary endpoint.

use actix_web::{HttpResponse, get, web};

use crate::error::AppResult;
use crate::models::ComplianceSummary;
use crate::services::ComplianceServices;

/// Compliance as of the latest completed scan.
#[utoipa::path(
    get,
    path = "/api/v1/compliance",
    tag = "Compliance",
    responses(
        (status = 200, description = "Compliance summary", body = ComplianceSummary)
    )
)]
#[get("/compliance")]
pub async fn compliance_summary(
    services: web::Data<ComplianceServices>,
) -> AppResult<HttpResponse> {
    let store = &services.store;
    let summary = match store.latest_completed_scan().await? {
        Some(scan) => {
            let violations = store.violations_for_scan(scan.id).await?;
            ComplianceSummary::for_scan(&scan, &violations)
        }
        None => ComplianceSummary::empty(),
    };

    Ok(HttpResponse::Ok().json(summary))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(compliance_summary);
}
