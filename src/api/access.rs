//! Dashboard access check endpoint.

use actix_web::{HttpResponse, get, web};

use crate::auth::AdminAuth;
use crate::error::AppResult;
use crate::services::{AccessDecision, ComplianceServices};

/// Whether a GitHub login belongs to the configured authorized team.
#[utoipa::path(
    get,
    path = "/api/v1/access/{login}",
    tag = "Access",
    params(("login" = String, Path, description = "GitHub login")),
    responses(
        (status = 200, description = "Access decision", body = AccessDecision),
        (status = 401, description = "Missing or invalid admin key", body = crate::error::ErrorResponse),
        (status = 422, description = "Compliance configuration missing or invalid", body = crate::error::ErrorResponse)
    ),
    security(("admin_key" = []))
)]
#[get("/access/{login}")]
pub async fn check_access(
    _auth: AdminAuth,
    path: web::Path<String>,
    services: web::Data<ComplianceServices>,
) -> AppResult<HttpResponse> {
    let decision = services.access.check(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(decision))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(check_access);
}
