//! Policy configuration cache.
//!
//! The YAML file lives in the organization's control repository. It is fetched at most once
//! per TTL window no matter how many scans or webhook deliveries ask for it concurrently.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::models::{AppConfig, RepositoryRef};

use super::clock::Clock;
use super::github_client::GitHubApi;
use super::refresh_cache::RefreshCache;

/// Where the raw configuration text comes from.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Raw file text; `None` when the file does not exist.
    async fn fetch(&self) -> AppResult<Option<String>>;
}

/// Reads the configuration file from `<org>/<control_repo>` on its default branch.
pub struct ControlRepoSource {
    github: Arc<dyn GitHubApi>,
    repository: RepositoryRef,
    path: String,
}

impl ControlRepoSource {
    pub fn new(github: Arc<dyn GitHubApi>, org: &str, control_repo: &str, path: &str) -> Self {
        Self {
            github,
            // Only owner/name are used for content lookups
            repository: RepositoryRef::new(0, org, control_repo),
            path: path.to_string(),
        }
    }
}

#[async_trait]
impl ConfigSource for ControlRepoSource {
    async fn fetch(&self) -> AppResult<Option<String>> {
        let file = self
            .github
            .get_file_content(&self.repository, &self.path)
            .await?;

        match file {
            Some(file) => Ok(Some(file.decode()?)),
            None => Ok(None),
        }
    }
}

pub struct ConfigCache {
    source: Arc<dyn ConfigSource>,
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
    cache: RefreshCache<Arc<AppConfig>>,
}

impl ConfigCache {
    pub fn new(source: Arc<dyn ConfigSource>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::seconds(300));
        Self {
            source,
            ttl,
            cache: RefreshCache::new(clock.clone()),
            clock,
        }
    }

    /// Current configuration. `force_refresh` always re-reads the file.
    pub async fn get_config(&self, force_refresh: bool) -> AppResult<Arc<AppConfig>> {
        self.cache
            .get_or_refresh(force_refresh, || async {
                debug!("Fetching compliance configuration (force={})", force_refresh);
                let raw = self.source.fetch().await?.ok_or(AppError::ConfigurationNotFound)?;

                let config = AppConfig::parse(&raw).inspect_err(|e| {
                    warn!("Compliance configuration rejected: {}", e);
                })?;

                info!(
                    "Loaded compliance configuration with {} policies",
                    config.policies.len()
                );
                Ok((Arc::new(config), self.clock.now() + self.ttl))
            })
            .await
    }
}
