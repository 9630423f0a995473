//! API endpoint modules.

pub mod access;
pub mod compliance;
pub mod health;
pub mod openapi;
pub mod scans;
pub mod webhooks;

pub use access::configure_routes as configure_access_routes;
pub use compliance::configure_routes as configure_compliance_routes;
pub use health::configure_health_routes;
pub use openapi::ApiDoc;
pub use scans::configure_routes as configure_scan_routes;
pub use webhooks::{WebhookSecret, configure_routes as configure_webhook_routes};
