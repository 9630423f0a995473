//! Policy configuration read from the organization's control repository.
//!
//! The YAML file is decoded into a loosely-shaped raw tree first and then validated into
//! [`AppConfig`]. Only the validated form leaves this module.
//!
//! ```yaml
//! access_control:
//!   authorized_team: acme/platform
//! policies:
//!   - type: has_catalog_info_yaml
//!     action: [create-issue, block-prs]
//!     issue:
//!       title: "Add a catalog-info.yaml"
//!       labels: [compliance, backstage]
//!   - type: correct_workflow_permissions
//!     action: log-only
//! ```

use serde::Deserialize;

use crate::error::{AppError, AppResult};

use super::action::{ActionKind, normalize_action};

/// Action used when a policy entry names none.
pub const DEFAULT_ACTION: &str = "log-only";

/// Parsed and validated policy configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// `org/team` whose members may use the dashboard
    pub authorized_team: String,
    pub policies: Vec<PolicyConfig>,
}

/// Configuration of one policy.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PolicyConfig {
    /// Evaluator type key, e.g. `has_catalog_info_yaml`
    pub policy_type: String,
    /// Non-empty, ordered, as written in the file
    pub actions: Vec<String>,
    pub issue: Option<IssueSettings>,
    pub pr_comment: Option<PrCommentSettings>,
    pub status_check: Option<StatusCheckSettings>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct IssueSettings {
    pub title: Option<String>,
    pub body: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct PrCommentSettings {
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct StatusCheckSettings {
    pub name: Option<String>,
}

impl AppConfig {
    /// Parse and validate the raw YAML text.
    pub fn parse(raw: &str) -> AppResult<Self> {
        if raw.trim().is_empty() {
            return Err(AppError::ConfigurationNotFound);
        }

        let parsed: RawConfig = serde_yaml::from_str(raw)
            .map_err(|_| AppError::InvalidConfiguration("malformed".to_string()))?;

        let authorized_team = parsed
            .access_control
            .and_then(|ac| ac.authorized_team)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                AppError::InvalidConfiguration("authorized_team must be set".to_string())
            })?;

        let policies = parsed
            .policies
            .unwrap_or_default()
            .into_iter()
            .map(PolicyConfig::try_from)
            .collect::<AppResult<Vec<_>>>()?;

        Ok(Self {
            authorized_team,
            policies,
        })
    }

    /// Configuration of a policy type, if present.
    pub fn policy(&self, policy_type: &str) -> Option<&PolicyConfig> {
        self.policies.iter().find(|p| p.policy_type == policy_type)
    }

    /// Split `authorized_team` into organization and team slug.
    ///
    /// A bare slug is resolved against `default_org`.
    pub fn authorized_team_parts<'a>(&'a self, default_org: &'a str) -> (&'a str, &'a str) {
        match self.authorized_team.split_once('/') {
            Some((org, team)) => (org, team),
            None => (default_org, self.authorized_team.as_str()),
        }
    }
}

impl PolicyConfig {
    /// Whether any configured action normalizes to `kind`.
    pub fn has_action(&self, kind: ActionKind) -> bool {
        self.actions
            .iter()
            .any(|a| ActionKind::parse(a) == Some(kind))
    }
}

impl TryFrom<RawPolicy> for PolicyConfig {
    type Error = AppError;

    fn try_from(raw: RawPolicy) -> AppResult<Self> {
        let policy_type = raw
            .policy_type
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::InvalidConfiguration("policy type must be set".to_string()))?;

        let mut actions: Vec<String> = match raw.action {
            Some(OneOrMany::One(a)) => vec![a],
            Some(OneOrMany::Many(list)) => list,
            None => Vec::new(),
        }
        .into_iter()
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .collect();

        if actions.is_empty() {
            actions.push(DEFAULT_ACTION.to_string());
        }

        // Keep first occurrence when the same action is listed in both spellings
        let mut seen = Vec::new();
        actions.retain(|a| {
            let key = normalize_action(a);
            if seen.contains(&key) {
                false
            } else {
                seen.push(key);
                true
            }
        });

        Ok(Self {
            policy_type,
            actions,
            issue: raw.issue,
            pr_comment: raw.pr_comment,
            status_check: raw.status_check,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    access_control: Option<RawAccessControl>,
    policies: Option<Vec<RawPolicy>>,
}

#[derive(Debug, Deserialize)]
struct RawAccessControl {
    authorized_team: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPolicy {
    #[serde(rename = "type")]
    policy_type: Option<String>,
    action: Option<OneOrMany>,
    issue: Option<IssueSettings>,
    pr_comment: Option<PrCommentSettings>,
    status_check: Option<StatusCheckSettings>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}
