//! Dashboard access check against the configured authorized team.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

use super::config_cache::ConfigCache;
use super::github_client::GitHubApi;

/// Answer to "may this GitHub login use the dashboard".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct AccessDecision {
    pub login: String,
    /// `org/team` the login was checked against
    pub team: String,
    pub authorized: bool,
}

pub struct AccessService {
    github: Arc<dyn GitHubApi>,
    config: Arc<ConfigCache>,
    org: String,
}

impl AccessService {
    pub fn new(github: Arc<dyn GitHubApi>, config: Arc<ConfigCache>, org: impl Into<String>) -> Self {
        Self {
            github,
            config,
            org: org.into(),
        }
    }

    pub async fn check(&self, login: &str) -> AppResult<AccessDecision> {
        let login = login.trim();
        if login.is_empty() {
            return Err(AppError::InvalidInput("login must not be empty".to_string()));
        }

        let config = self.config.get_config(false).await?;
        let (org, team) = config.authorized_team_parts(&self.org);
        let authorized = self.github.is_team_member(org, team, login).await?;
        debug!("Access check for {} against {}/{}: {}", login, org, team, authorized);

        Ok(AccessDecision {
            login: login.to_string(),
            team: format!("{}/{}", org, team),
            authorized,
        })
    }
}
