//! `AdminAuth` extractor guarding operator endpoints.

use std::future::{Ready, ready};

use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpRequest, web};
use tracing::warn;

use super::AdminKey;
use crate::config::ADMIN_KEY_HEADER;
use crate::error::AppError;

/// Present in a handler's arguments when the request carried the configured admin key.
///
/// ```ignore
/// async fn trigger_scan(_auth: AdminAuth) -> impl Responder { ... }
/// ```
pub struct AdminAuth;

fn authorize(req: &HttpRequest) -> Result<AdminAuth, AppError> {
    let key = req
        .app_data::<web::Data<AdminKey>>()
        .ok_or_else(|| AppError::Unauthorized("admin access is not configured".to_string()))?;

    let provided = req
        .headers()
        .get(ADMIN_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized(format!("missing {} header", ADMIN_KEY_HEADER)))?;

    if !key.verify(provided) {
        warn!(path = %req.path(), "Rejected invalid admin key");
        return Err(AppError::Unauthorized("invalid admin key".to_string()));
    }
    Ok(AdminAuth)
}

impl FromRequest for AdminAuth {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authorize(req))
    }
}
