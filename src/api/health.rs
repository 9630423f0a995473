//! Liveness and readiness checks.

use actix_web::{HttpResponse, get, web};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;
use utoipa::ToSchema;

use crate::db::DbPool;
use crate::error::ErrorResponse;
use crate::services::ComplianceServices;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Readiness, with the age of the data the read endpoints serve.
#[derive(Serialize, ToSchema)]
pub struct ReadyResponse {
    status: &'static str,
    database: &'static str,
    /// Completion time of the scan the read endpoints report on
    last_completed_scan: Option<DateTime<Utc>>,
}

/// Liveness: the process is up and serving.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Process is alive", body = HealthResponse)
    )
)]
#[get("/health")]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness: the database answers and the compliance store can be read.
#[utoipa::path(
    get,
    path = "/api/v1/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Ready to serve", body = ReadyResponse),
        (status = 503, description = "Database unavailable", body = ErrorResponse)
    )
)]
#[get("/ready")]
pub async fn ready(
    pool: web::Data<DbPool>,
    services: web::Data<ComplianceServices>,
) -> HttpResponse {
    let latest = match pool.ping().await {
        Ok(()) => services.store.latest_completed_scan().await,
        Err(e) => Err(e),
    };

    match latest {
        Ok(scan) => HttpResponse::Ok().json(ReadyResponse {
            status: "ready",
            database: "connected",
            last_completed_scan: scan.and_then(|s| s.completed_at),
        }),
        Err(e) => {
            warn!("Readiness check failed: {}", e);
            HttpResponse::ServiceUnavailable().json(ErrorResponse {
                error: "NOT_READY".to_string(),
                message: "Database unavailable".to_string(),
            })
        }
    }
}

pub fn configure_health_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health).service(ready);
}
