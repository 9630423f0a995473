//! GitHub webhook ingress.
//!
//! The raw body is authenticated with `X-Hub-Signature-256` (HMAC-SHA256 keyed with the
//! webhook secret) before anything is parsed. Verified deliveries are handed to the
//! webhook service in the background and acknowledged with 202.

use actix_web::{HttpRequest, HttpResponse, post, web};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use sha2::Sha256;
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;

use crate::config::{GITHUB_DELIVERY_HEADER, GITHUB_EVENT_HEADER, GITHUB_SIGNATURE_HEADER};
use crate::error::{AppError, AppResult};
use crate::services::ComplianceServices;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_PREFIX: &str = "sha256=";

/// Shared secret configured on the GitHub App webhook.
#[derive(Clone)]
pub struct WebhookSecret(Option<SecretString>);

impl WebhookSecret {
    pub fn new(secret: Option<SecretString>) -> Self {
        Self(secret)
    }

    /// Check a `sha256=<hex>` signature over `body`. Comparison is constant-time.
    pub fn verify(&self, body: &[u8], signature_header: &str) -> bool {
        let Some(secret) = &self.0 else {
            return false;
        };
        let Some(hex_digest) = signature_header.trim().strip_prefix(SIGNATURE_PREFIX) else {
            return false;
        };
        let Ok(expected) = hex::decode(hex_digest) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.expose_secret().as_bytes()) else {
            return false;
        };
        mac.update(body);
        mac.verify_slice(&expected).is_ok()
    }
}

impl std::fmt::Debug for WebhookSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Some(_) => write!(f, "WebhookSecret([REDACTED])"),
            None => write!(f, "WebhookSecret(None)"),
        }
    }
}

/// `sha256=<hex>` signature for `body`, as GitHub computes it.
pub fn sign_payload(secret: &str, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    Some(format!(
        "{}{}",
        SIGNATURE_PREFIX,
        hex::encode(mac.finalize().into_bytes())
    ))
}

/// Acknowledgement of a verified delivery.
#[derive(Serialize, ToSchema)]
pub struct WebhookAcceptedResponse {
    pub status: &'static str,
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery: Option<String>,
}

fn header_value(req: &HttpRequest, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Receive a GitHub webhook delivery.
#[utoipa::path(
    post,
    path = "/api/v1/webhooks/github",
    tag = "Webhooks",
    request_body(content = String, content_type = "application/json", description = "Raw GitHub event payload"),
    responses(
        (status = 202, description = "Delivery accepted", body = WebhookAcceptedResponse),
        (status = 400, description = "Missing event header or unreadable payload", body = crate::error::ErrorResponse),
        (status = 401, description = "Signature missing or invalid", body = crate::error::ErrorResponse)
    )
)]
#[post("/webhooks/github")]
pub async fn receive_webhook(
    req: HttpRequest,
    body: web::Bytes,
    secret: web::Data<WebhookSecret>,
    services: web::Data<ComplianceServices>,
) -> AppResult<HttpResponse> {
    let delivery = header_value(&req, GITHUB_DELIVERY_HEADER);

    let signature = header_value(&req, GITHUB_SIGNATURE_HEADER).ok_or_else(|| {
        warn!(delivery = ?delivery, "Webhook delivery without signature");
        AppError::Unauthorized("Missing webhook signature".to_string())
    })?;
    if !secret.verify(&body, &signature) {
        warn!(delivery = ?delivery, "Webhook signature mismatch");
        return Err(AppError::Unauthorized(
            "Invalid webhook signature".to_string(),
        ));
    }

    let event = header_value(&req, GITHUB_EVENT_HEADER)
        .ok_or_else(|| AppError::InvalidInput(format!("Missing {} header", GITHUB_EVENT_HEADER)))?;

    let action = serde_json::from_slice::<serde_json::Value>(&body)
        .map_err(|e| AppError::InvalidInput(format!("Webhook payload is not JSON: {}", e)))?
        .get("action")
        .and_then(|a| a.as_str())
        .map(str::to_string);

    debug!(delivery = ?delivery, event = %event, action = ?action, "Webhook verified");

    let webhooks = services.webhooks.clone();
    let task_event = event.clone();
    let task_delivery = delivery.clone();
    tokio::spawn(async move {
        match webhooks
            .handle_event(
                &task_event,
                action.as_deref(),
                &body,
                task_delivery.as_deref(),
            )
            .await
        {
            Ok(outcome) => info!(delivery = ?task_delivery, outcome = ?outcome, "Webhook handled"),
            Err(e) => error!(delivery = ?task_delivery, "Webhook handling failed: {}", e),
        }
    });

    Ok(HttpResponse::Accepted().json(WebhookAcceptedResponse {
        status: "accepted",
        event,
        delivery,
    }))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(receive_webhook);
}
