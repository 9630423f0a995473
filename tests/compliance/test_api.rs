//! HTTP surface: authentication, webhook ingress and read endpoints.

use actix_web::{App, dev::ServiceResponse, test, web};
use secrecy::SecretString;
use serde_json::Value;

use repo_compliance_lib::api::{self, WebhookSecret, webhooks::sign_payload};
use repo_compliance_lib::auth::AdminKey;
use repo_compliance_lib::models::ScanStatus;

use super::support::{CATALOG_WITH_OWNER, Harness, LOG_ONLY_CONFIG};

const TEST_ADMIN_KEY: &str = "test-admin-key";
const TEST_WEBHOOK_SECRET: &str = "test-webhook-secret";

async fn call(
    h: &Harness,
    webhook_secret: Option<&str>,
    req: test::TestRequest,
) -> ServiceResponse {
    let secret = WebhookSecret::new(webhook_secret.map(|s| SecretString::from(s.to_string())));
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(h.services.clone()))
            .app_data(web::Data::new(AdminKey::new(Some(TEST_ADMIN_KEY.to_string()))))
            .app_data(web::Data::new(secret))
            .service(
                web::scope("/api/v1")
                    .service(api::health::health)
                    .configure(api::configure_scan_routes)
                    .configure(api::configure_compliance_routes)
                    .configure(api::configure_access_routes)
                    .configure(api::configure_webhook_routes),
            ),
    )
    .await;
    test::call_service(&app, req.to_request()).await
}

fn webhook_request(body: &'static [u8], signature: Option<String>) -> test::TestRequest {
    let mut req = test::TestRequest::post()
        .uri("/api/v1/webhooks/github")
        .insert_header(("X-GitHub-Event", "ping"))
        .insert_header(("X-GitHub-Delivery", "delivery-42"))
        .insert_header(("Content-Type", "application/json"))
        .set_payload(body);
    if let Some(signature) = signature {
        req = req.insert_header(("X-Hub-Signature-256", signature));
    }
    req
}

/// 1. The health endpoint answers without a database.
#[actix_rt::test]
async fn test_health() {
    let h = Harness::new(LOG_ONLY_CONFIG);
    let resp = call(&h, None, test::TestRequest::get().uri("/api/v1/health")).await;
    assert_eq!(resp.status(), 200);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "healthy");
}

/// 2. Webhook deliveries need a valid signature.
#[actix_rt::test]
async fn test_webhook_signature_is_required() {
    let h = Harness::new(LOG_ONLY_CONFIG);
    let body: &'static [u8] = br#"{"zen":"Design for failure."}"#;

    let resp = call(&h, Some(TEST_WEBHOOK_SECRET), webhook_request(body, None)).await;
    assert_eq!(resp.status(), 401);

    let forged = sign_payload("some-other-secret", body);
    let resp = call(&h, Some(TEST_WEBHOOK_SECRET), webhook_request(body, forged)).await;
    assert_eq!(resp.status(), 401);
    let error: Value = test::read_body_json(resp).await;
    assert_eq!(error["error"], "UNAUTHORIZED");

    let signed = sign_payload(TEST_WEBHOOK_SECRET, body);
    let resp = call(&h, Some(TEST_WEBHOOK_SECRET), webhook_request(body, signed)).await;
    assert_eq!(resp.status(), 202);
    let accepted: Value = test::read_body_json(resp).await;
    assert_eq!(accepted["status"], "accepted");
    assert_eq!(accepted["event"], "ping");
    assert_eq!(accepted["delivery"], "delivery-42");
}

/// 3. Without a configured secret every delivery is rejected.
#[actix_rt::test]
async fn test_webhook_without_secret_rejects_all() {
    let h = Harness::new(LOG_ONLY_CONFIG);
    let body: &'static [u8] = b"{}";
    let signed = sign_payload(TEST_WEBHOOK_SECRET, body);

    let resp = call(&h, None, webhook_request(body, signed)).await;
    assert_eq!(resp.status(), 401);
}

/// 4. A signed delivery without an event header is a bad request.
#[actix_rt::test]
async fn test_webhook_without_event_header() {
    let h = Harness::new(LOG_ONLY_CONFIG);
    let body: &'static [u8] = b"{}";
    let signature = sign_payload(TEST_WEBHOOK_SECRET, body).unwrap();

    let req = test::TestRequest::post()
        .uri("/api/v1/webhooks/github")
        .insert_header(("X-Hub-Signature-256", signature))
        .set_payload(body);
    let resp = call(&h, Some(TEST_WEBHOOK_SECRET), req).await;
    assert_eq!(resp.status(), 400);
}

/// 5. Triggering a scan needs the admin key.
#[actix_rt::test]
async fn test_scan_trigger_requires_admin_key() {
    let h = Harness::new(LOG_ONLY_CONFIG);

    let resp = call(&h, None, test::TestRequest::post().uri("/api/v1/scans")).await;
    assert_eq!(resp.status(), 401);

    let resp = call(
        &h,
        None,
        test::TestRequest::post()
            .uri("/api/v1/scans")
            .insert_header(("X-Admin-Key", "wrong-key")),
    )
    .await;
    assert_eq!(resp.status(), 401);

    let resp = call(
        &h,
        None,
        test::TestRequest::post()
            .uri("/api/v1/scans")
            .insert_header(("X-Admin-Key", TEST_ADMIN_KEY)),
    )
    .await;
    assert_eq!(resp.status(), 202);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "accepted");
}

/// 6. Read endpoints reflect only the latest completed scan.
#[actix_rt::test]
async fn test_latest_scan_and_compliance_summary() {
    let h = Harness::new(LOG_ONLY_CONFIG);
    h.github.add_repository(1, "good");
    h.github.add_file("good", "catalog-info.yaml", CATALOG_WITH_OWNER);
    h.github.add_repository(2, "bare");

    let resp = call(&h, None, test::TestRequest::get().uri("/api/v1/scans/latest")).await;
    assert_eq!(resp.status(), 404);

    let resp = call(&h, None, test::TestRequest::get().uri("/api/v1/compliance")).await;
    assert_eq!(resp.status(), 200);
    let empty: Value = test::read_body_json(resp).await;
    assert_eq!(empty["total_repositories"], 0);
    assert!(empty["compliance_percentage"].is_null());

    let summary = h.services.scans.perform_scan().await.unwrap();

    let resp = call(&h, None, test::TestRequest::get().uri("/api/v1/scans/latest")).await;
    assert_eq!(resp.status(), 200);
    let latest: Value = test::read_body_json(resp).await;
    assert_eq!(latest["scan"]["id"], summary.scan_id.to_string());
    assert_eq!(latest["scan"]["status"], "completed");
    assert_eq!(latest["violations"].as_array().unwrap().len(), 1);
    assert_eq!(
        latest["violations"][0]["policy"]["policy_type"],
        "has_catalog_info_yaml"
    );

    let resp = call(&h, None, test::TestRequest::get().uri("/api/v1/compliance")).await;
    let compliance: Value = test::read_body_json(resp).await;
    assert_eq!(compliance["scan_id"], summary.scan_id.to_string());
    assert_eq!(compliance["total_repositories"], 2);
    assert_eq!(compliance["compliant_repositories"], 1);
    assert_eq!(compliance["total_violations"], 1);
    assert_eq!(compliance["violations_by_policy"]["has_catalog_info_yaml"], 1);
    assert_eq!(compliance["compliance_percentage"], 50.0);
}

/// 7. A failed scan changes neither the summary's scope nor its totals.
#[actix_rt::test]
async fn test_compliance_summary_ignores_failed_scans() {
    let h = Harness::new(LOG_ONLY_CONFIG);
    h.github.add_repository(1, "good");
    h.github.add_file("good", "catalog-info.yaml", CATALOG_WITH_OWNER);
    h.github.add_repository(2, "bare");
    h.github.revoke_credentials();

    let failed = h.services.scans.perform_scan().await.unwrap();
    assert_eq!(failed.status, ScanStatus::Failed);
    assert_eq!(h.store.repository(2).unwrap().name, "bare");

    let resp = call(&h, None, test::TestRequest::get().uri("/api/v1/compliance")).await;
    assert_eq!(resp.status(), 200);
    let summary: Value = test::read_body_json(resp).await;
    assert!(summary["scan_id"].is_null());
    assert_eq!(summary["total_repositories"], 0);
    assert_eq!(summary["compliant_repositories"], 0);
    assert_eq!(summary["total_violations"], 0);
    assert!(summary["compliance_percentage"].is_null());

    let h = Harness::new(LOG_ONLY_CONFIG);
    h.github.add_repository(1, "good");
    h.github.add_file("good", "catalog-info.yaml", CATALOG_WITH_OWNER);
    let completed = h.services.scans.perform_scan().await.unwrap();
    assert_eq!(completed.status, ScanStatus::Completed);

    h.github.add_repository(2, "bare");
    h.github.revoke_credentials();
    let failed = h.services.scans.perform_scan().await.unwrap();
    assert_eq!(failed.status, ScanStatus::Failed);

    let resp = call(&h, None, test::TestRequest::get().uri("/api/v1/compliance")).await;
    let summary: Value = test::read_body_json(resp).await;
    assert_eq!(summary["scan_id"], completed.scan_id.to_string());
    assert_eq!(summary["total_repositories"], 1);
    assert_eq!(summary["compliant_repositories"], 1);
    assert_eq!(summary["compliance_percentage"], 100.0);
}

/// 8. Access checks resolve the authorized team from configuration.
#[actix_rt::test]
async fn test_access_check() {
    let h = Harness::new(LOG_ONLY_CONFIG);
    h.github.add_team_member("acme", "platform", "octocat");

    let resp = call(&h, None, test::TestRequest::get().uri("/api/v1/access/octocat")).await;
    assert_eq!(resp.status(), 401);

    let resp = call(
        &h,
        None,
        test::TestRequest::get()
            .uri("/api/v1/access/octocat")
            .insert_header(("X-Admin-Key", TEST_ADMIN_KEY)),
    )
    .await;
    assert_eq!(resp.status(), 200);
    let decision: Value = test::read_body_json(resp).await;
    assert_eq!(decision["authorized"], true);
    assert_eq!(decision["team"], "acme/platform");

    let resp = call(
        &h,
        None,
        test::TestRequest::get()
            .uri("/api/v1/access/mallory")
            .insert_header(("X-Admin-Key", TEST_ADMIN_KEY)),
    )
    .await;
    let decision: Value = test::read_body_json(resp).await;
    assert_eq!(decision["authorized"], false);
}
