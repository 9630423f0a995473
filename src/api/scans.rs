//! Scan trigger and results endpoints.

use actix_web::{HttpResponse, get, post, web};
use serde::Serialize;
use tracing::{error, info};
use utoipa::ToSchema;

use crate::auth::AdminAuth;
use crate::error::{AppError, AppResult};
use crate::models::{Scan, ViolationContext};
use crate::services::ComplianceServices;

/// Response of an accepted scan trigger.
#[derive(Serialize, ToSchema)]
pub struct ScanAcceptedResponse {
    pub status: &'static str,
    pub message: String,
}

/// Latest completed scan with its violations.
#[derive(Serialize, ToSchema)]
pub struct LatestScanResponse {
    pub scan: Scan,
    pub violations: Vec<ViolationContext>,
}

/// Start an organization scan in the background.
#[utoipa::path(
    post,
    path = "/api/v1/scans",
    tag = "Scans",
    responses(
        (status = 202, description = "Scan started", body = ScanAcceptedResponse),
        (status = 401, description = "Missing or invalid admin key", body = crate::error::ErrorResponse)
    ),
    security(("admin_key" = []))
)]
#[post("/scans")]
pub async fn trigger_scan(
    _auth: AdminAuth,
    services: web::Data<ComplianceServices>,
) -> HttpResponse {
    let scans = services.scans.clone();
    tokio::spawn(async move {
        match scans.perform_scan().await {
            Ok(summary) => info!(
                scan_id = %summary.scan_id,
                status = %summary.status,
                "Manual scan finished"
            ),
            Err(e) => error!("Manual scan error: {}", e),
        }
    });

    HttpResponse::Accepted().json(ScanAcceptedResponse {
        status: "accepted",
        message: "Scan started".to_string(),
    })
}

/// Latest completed scan and its violations.
#[utoipa::path(
    get,
    path = "/api/v1/scans/latest",
    tag = "Scans",
    responses(
        (status = 200, description = "Latest completed scan", body = LatestScanResponse),
        (status = 404, description = "No scan has completed yet", body = crate::error::ErrorResponse)
    )
)]
#[get("/scans/latest")]
pub async fn latest_scan(
    services: web::Data<ComplianceServices>,
) -> AppResult<HttpResponse> {
    let scan = services
        .store
        .latest_completed_scan()
        .await?
        .ok_or_else(|| AppError::NotFound("Completed scan".to_string()))?;
    let violations = services.store.violations_for_scan(scan.id).await?;

    Ok(HttpResponse::Ok().json(LatestScanResponse { scan, violations }))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(trigger_scan).service(latest_scan);
}
