//! Compliance engine services.

pub mod access;
pub mod actions;
pub mod clock;
pub mod config_cache;
pub mod evaluation;
pub mod github_client;
pub mod policies;
pub mod refresh_cache;
pub mod scan;
pub mod scheduler;
pub mod token_manager;
pub mod webhook;

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;

use crate::config::Config;
use crate::db::ComplianceStore;
use crate::error::{AppError, AppResult};

pub use access::{AccessDecision, AccessService};
pub use actions::ActionExecutor;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config_cache::{ConfigCache, ConfigSource, ControlRepoSource};
pub use evaluation::PolicyEngine;
pub use github_client::{GitHubApi, GitHubClient};
pub use scan::{ScanOrchestrator, ScanRun};
pub use scheduler::start_scan_task;
pub use token_manager::{GitHubAppTokenExchange, TokenExchange, TokenManager};
pub use webhook::{WebhookOutcome, WebhookService};

/// Settings the engine needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub org: String,
    pub config_ttl: Duration,
    pub concurrency: usize,
}

/// The wired-up compliance engine shared by HTTP handlers and the scan trigger.
#[derive(Clone)]
pub struct ComplianceServices {
    pub store: Arc<dyn ComplianceStore>,
    pub config: Arc<ConfigCache>,
    pub engine: Arc<PolicyEngine>,
    pub executor: Arc<ActionExecutor>,
    pub scans: Arc<ScanOrchestrator>,
    pub webhooks: Arc<WebhookService>,
    pub access: Arc<AccessService>,
}

impl ComplianceServices {
    /// Wire the engine from explicit collaborators.
    pub fn assemble(
        store: Arc<dyn ComplianceStore>,
        github: Arc<dyn GitHubApi>,
        config_source: Arc<dyn ConfigSource>,
        clock: Arc<dyn Clock>,
        settings: EngineSettings,
    ) -> Self {
        let config = Arc::new(ConfigCache::new(
            config_source,
            settings.config_ttl,
            clock.clone(),
        ));
        let engine = Arc::new(PolicyEngine::with_default_evaluators(github.clone()));
        let executor = Arc::new(ActionExecutor::new(
            store.clone(),
            github.clone(),
            config.clone(),
            settings.org.as_str(),
            settings.concurrency,
        ));
        let scans = Arc::new(ScanOrchestrator::new(
            store.clone(),
            github.clone(),
            config.clone(),
            engine.clone(),
            executor.clone(),
            clock,
            settings.org.as_str(),
            settings.concurrency,
        ));
        let webhooks = Arc::new(WebhookService::new(
            config.clone(),
            engine.clone(),
            executor.clone(),
        ));
        let access = Arc::new(AccessService::new(github, config.clone(), settings.org));

        Self {
            store,
            config,
            engine,
            executor,
            scans,
            webhooks,
            access,
        }
    }

    /// Wire the engine against GitHub using the process configuration.
    pub fn from_config(config: &Config, store: Arc<dyn ComplianceStore>) -> AppResult<Self> {
        let github_settings = &config.github;
        let app_id = github_settings
            .app_id
            .clone()
            .ok_or_else(|| AppError::Authentication("GITHUB_APP_ID is not set".to_string()))?;
        let installation_id = github_settings.installation_id.ok_or_else(|| {
            AppError::Authentication("GITHUB_APP_INSTALLATION_ID is not set".to_string())
        })?;
        let private_key: &SecretString = github_settings.private_key.as_ref().ok_or_else(|| {
            AppError::Authentication("GITHUB_APP_PRIVATE_KEY is not set".to_string())
        })?;

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let exchange = Arc::new(GitHubAppTokenExchange::new(&github_settings.api_url)?);
        let tokens = Arc::new(TokenManager::new(
            app_id,
            installation_id,
            private_key,
            exchange,
            clock.clone(),
        )?);
        let github: Arc<dyn GitHubApi> =
            Arc::new(GitHubClient::new(&github_settings.api_url, tokens)?);
        let source = Arc::new(ControlRepoSource::new(
            github.clone(),
            &github_settings.org,
            &config.policy_source.control_repo,
            &config.policy_source.config_path,
        ));

        Ok(Self::assemble(
            store,
            github,
            source,
            clock,
            EngineSettings {
                org: github_settings.org.clone(),
                config_ttl: config.policy_source.cache_ttl,
                concurrency: config.scan_concurrency,
            },
        ))
    }
}
