//! Repository compliance server.
//!
//! Serves the scan, compliance, access and webhook API, and runs the interval scan
//! trigger when one is configured.

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, http::header, web};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use repo_compliance_lib::api::{self, ApiDoc, WebhookSecret};
use repo_compliance_lib::auth::AdminKey;
use repo_compliance_lib::config::Config;
use repo_compliance_lib::db::{ComplianceStore, DbPool};
use repo_compliance_lib::middleware;
use repo_compliance_lib::services::{self, ComplianceServices};

const DEV_WORKERS: usize = 4;
const DEV_DASHBOARD_ORIGINS: [&str; 2] = ["http://localhost:3000", "http://127.0.0.1:3000"];

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

fn load_config_or_exit() -> Config {
    Config::from_env().unwrap_or_else(|e| {
        error!("Failed to load configuration: {}", e);
        error!("RUST_ENV (development|production) and GITHUB_ORG are always required.");
        error!("Production additionally needs DATABASE_URL, the GitHub App credentials");
        error!("and GITHUB_WEBHOOK_SECRET.");
        std::process::exit(1);
    })
}

/// The dashboard runs on a separate origin in development; production is same-origin.
fn cors(is_development: bool) -> Cors {
    let mut cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "OPTIONS"])
        .allowed_headers(vec![
            header::ACCEPT,
            header::CONTENT_TYPE,
            header::HeaderName::from_static("x-admin-key"),
        ])
        .max_age(3600);
    if is_development {
        for origin in DEV_DASHBOARD_ORIGINS {
            cors = cors.allowed_origin(origin);
        }
    }
    cors
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = load_config_or_exit();
    info!(
        environment = %config.environment,
        org = %config.github.org,
        policy_file = %format!(
            "{}/{}:{}",
            config.github.org, config.policy_source.control_repo, config.policy_source.config_path
        ),
        "Repository compliance server starting"
    );
    if config.is_development() {
        warn!("Development mode: local database and admin key defaults are in effect");
    }

    let pool = DbPool::new(&config)
        .await
        .expect("Failed to initialize database");
    pool.run_migrations()
        .await
        .expect("Failed to run migrations");
    info!("Database ready");

    let store: Arc<dyn ComplianceStore> = Arc::new(pool.clone());
    let compliance = ComplianceServices::from_config(&config, store).unwrap_or_else(|e| {
        error!("Failed to initialize GitHub App client: {}", e);
        std::process::exit(1);
    });

    match config.scan_interval {
        Some(every) => services::start_scan_task(compliance.scans.clone(), every),
        None => info!("Built-in scan trigger disabled (RCS_SCAN_INTERVAL_SECS=0)"),
    }
    if config.github.webhook_secret.is_none() {
        warn!("GITHUB_WEBHOOK_SECRET is not set; every webhook delivery will be rejected");
    }

    let bind_address = config.bind_address();
    let admin_key = AdminKey::new(config.admin_key.clone());
    let webhook_secret = WebhookSecret::new(config.github.webhook_secret.clone());
    let is_development = config.is_development();
    let workers = if is_development {
        DEV_WORKERS
    } else {
        num_cpus::get()
    };
    info!(address = %bind_address, workers, "Listening");

    let openapi = ApiDoc::openapi();

    HttpServer::new(move || {
        App::new()
            .wrap(cors(is_development))
            .wrap(middleware::RequestLogger)
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(compliance.clone()))
            .app_data(web::Data::new(admin_key.clone()))
            .app_data(web::Data::new(webhook_secret.clone()))
            .service(
                web::scope("/api/v1")
                    .configure(api::configure_health_routes)
                    .configure(api::configure_scan_routes)
                    .configure(api::configure_compliance_routes)
                    .configure(api::configure_access_routes)
                    .configure(api::configure_webhook_routes),
            )
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", openapi.clone()),
            )
    })
    .workers(workers)
    .bind(&bind_address)?
    .run()
    .await
}
