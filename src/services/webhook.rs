//! Pull request webhook handling.
//!
//! Signature verification happens in the HTTP layer; this service only sees verified
//! deliveries. Pull request events re-evaluate the policies that act on pull requests and
//! update that single pull request, without creating a scan.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::models::github::{GitHubRepository, PullRequest};
use crate::models::{ActionKind, ActionOutcome, ActionStatus, PolicyConfig, RepositoryRef};

use super::actions::ActionExecutor;
use super::config_cache::ConfigCache;
use super::evaluation::PolicyEngine;

pub const PULL_REQUEST_EVENT: &str = "pull_request";
pub const PING_EVENT: &str = "ping";

/// Pull request actions that trigger re-evaluation.
pub const HANDLED_PULL_REQUEST_ACTIONS: [&str; 4] =
    ["opened", "reopened", "synchronize", "ready_for_review"];

#[derive(Debug, Deserialize)]
struct PullRequestEvent {
    pull_request: PullRequest,
    repository: GitHubRepository,
}

/// What a delivery led to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum WebhookOutcome {
    Ignored {
        reason: String,
    },
    Processed {
        repository: String,
        pull_request: u64,
        violations: usize,
        comment: Option<OutcomeReport>,
        status_check: Option<OutcomeReport>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeReport {
    pub status: ActionStatus,
    pub details: String,
}

impl From<ActionOutcome> for OutcomeReport {
    fn from(outcome: ActionOutcome) -> Self {
        Self {
            status: outcome.status,
            details: outcome.details,
        }
    }
}

impl WebhookOutcome {
    fn ignored(reason: impl Into<String>) -> Self {
        Self::Ignored {
            reason: reason.into(),
        }
    }
}

pub struct WebhookService {
    config: Arc<ConfigCache>,
    engine: Arc<PolicyEngine>,
    executor: Arc<ActionExecutor>,
}

impl WebhookService {
    pub fn new(
        config: Arc<ConfigCache>,
        engine: Arc<PolicyEngine>,
        executor: Arc<ActionExecutor>,
    ) -> Self {
        Self {
            config,
            engine,
            executor,
        }
    }

    /// Handle one verified delivery.
    ///
    /// GitHub call failures are reported in the outcome; only configuration problems and
    /// unreadable payloads are errors.
    pub async fn handle_event(
        &self,
        event_type: &str,
        action: Option<&str>,
        payload: &[u8],
        delivery_id: Option<&str>,
    ) -> AppResult<WebhookOutcome> {
        let delivery = delivery_id.unwrap_or("-");

        if event_type == PING_EVENT {
            info!(delivery = %delivery, "Webhook ping received");
            return Ok(WebhookOutcome::ignored("ping"));
        }
        if event_type != PULL_REQUEST_EVENT {
            debug!(delivery = %delivery, event = %event_type, "Ignoring webhook event");
            return Ok(WebhookOutcome::ignored(format!("event '{}' is not handled", event_type)));
        }

        let action = action.unwrap_or_default();
        if !HANDLED_PULL_REQUEST_ACTIONS.contains(&action) {
            debug!(delivery = %delivery, action = %action, "Ignoring pull request action");
            return Ok(WebhookOutcome::ignored(format!(
                "pull_request action '{}' is not handled",
                action
            )));
        }

        let event: PullRequestEvent = serde_json::from_slice(payload).map_err(|e| {
            AppError::InvalidInput(format!("Invalid pull_request payload: {}", e))
        })?;

        let config = self.config.get_config(false).await?;
        let comment_policies: Vec<&PolicyConfig> = config
            .policies
            .iter()
            .filter(|p| p.has_action(ActionKind::CommentOnPrs))
            .collect();
        let block_policies: Vec<&PolicyConfig> = config
            .policies
            .iter()
            .filter(|p| p.has_action(ActionKind::BlockPrs))
            .collect();

        if comment_policies.is_empty() && block_policies.is_empty() {
            return Ok(WebhookOutcome::ignored("no policies act on pull requests"));
        }

        let owner = if event.repository.owner.login.is_empty() {
            event
                .repository
                .full_name
                .split_once('/')
                .map(|(o, _)| o.to_string())
                .unwrap_or_default()
        } else {
            event.repository.owner.login.clone()
        };
        let repo = RepositoryRef::new(event.repository.id, owner, event.repository.name.as_str());
        let pr = &event.pull_request;

        let mut relevant: Vec<PolicyConfig> = Vec::new();
        for policy in comment_policies.iter().chain(block_policies.iter()) {
            if !relevant.iter().any(|p| p.policy_type == policy.policy_type) {
                relevant.push((*policy).clone());
            }
        }

        let violations = self.engine.evaluate_repository(&repo, &relevant).await?;
        info!(
            delivery = %delivery,
            repository = %repo,
            pr = pr.number,
            violations = violations.len(),
            "Evaluated pull request"
        );

        let comment = if comment_policies.is_empty() {
            None
        } else {
            let selected: Vec<_> = violations
                .iter()
                .filter(|v| comment_policies.iter().any(|p| p.policy_type == v.policy_type))
                .cloned()
                .collect();
            let template = comment_policies
                .iter()
                .find_map(|p| p.pr_comment.as_ref().and_then(|c| c.message.as_deref()));

            let outcome = self
                .executor
                .comment_on_pull_request(&repo, pr.number, &selected, template)
                .await
                .unwrap_or_else(|e| {
                    warn!(delivery = %delivery, repository = %repo, pr = pr.number, "Commenting failed: {}", e);
                    ActionOutcome::failed(e.to_string())
                });
            Some(outcome.into())
        };

        let status_check = if block_policies.is_empty() {
            None
        } else {
            let selected: Vec<_> = violations
                .iter()
                .filter(|v| block_policies.iter().any(|p| p.policy_type == v.policy_type))
                .cloned()
                .collect();
            let check_name = block_policies
                .iter()
                .find_map(|p| p.status_check.as_ref().and_then(|s| s.name.as_deref()));

            let outcome = self
                .executor
                .update_pull_request_status_check(&repo, &pr.head.sha, &selected, check_name)
                .await
                .unwrap_or_else(|e| {
                    warn!(delivery = %delivery, repository = %repo, pr = pr.number, "Status check update failed: {}", e);
                    ActionOutcome::failed(e.to_string())
                });
            Some(outcome.into())
        };

        Ok(WebhookOutcome::Processed {
            repository: repo.full_name(),
            pull_request: pr.number,
            violations: violations.len(),
            comment,
            status_check,
        })
    }
}
