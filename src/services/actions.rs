//! Remediation of persisted violations.
//!
//! Two entry points share the same per-action semantics:
//! - [`ActionExecutor::process_actions_for_scan`] runs every configured action for every
//!   violation of a completed scan and records one action log per attempt
//! - [`ActionExecutor::comment_on_pull_request`] and
//!   [`ActionExecutor::update_pull_request_status_check`] act on a single pull request
//!   for webhook deliveries
//!
//! Duplicate checks ("is there already an open issue", "is there already a bot comment")
//! are read-then-write, so all work against one repository is serialized through a
//! per-repository lock.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex};

use futures_util::{StreamExt, stream};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::db::ComplianceStore;
use crate::error::{AppResult, GitHubError};
use crate::models::github::{CheckRunOutput, CheckRunRequest, NewIssue};
use crate::models::{
    ActionKind, ActionOutcome, ActionStatus, ActionSummary, AppConfig, PolicyConfig, RepositoryRef,
    Violation, ViolationContext,
};

use super::config_cache::ConfigCache;
use super::github_client::GitHubApi;

pub const DEFAULT_ISSUE_LABEL: &str = "compliance";
pub const DEFAULT_CHECK_NAME: &str = "Compliance Check";
pub const COMMENT_HEADER: &str = "## Repository compliance check";
/// Placeholder in custom PR comment templates.
pub const VIOLATIONS_PLACEHOLDER: &str = "{violations}";
/// Prefix length compared when looking for an earlier identical bot comment.
pub const COMMENT_DEDUPE_PREFIX_CHARS: usize = 50;

pub struct ActionExecutor {
    store: Arc<dyn ComplianceStore>,
    github: Arc<dyn GitHubApi>,
    config: Arc<ConfigCache>,
    org: String,
    concurrency: usize,
    repo_locks: StdMutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl ActionExecutor {
    pub fn new(
        store: Arc<dyn ComplianceStore>,
        github: Arc<dyn GitHubApi>,
        config: Arc<ConfigCache>,
        org: impl Into<String>,
        concurrency: usize,
    ) -> Self {
        Self {
            store,
            github,
            config,
            org: org.into(),
            concurrency: concurrency.max(1),
            repo_locks: StdMutex::new(HashMap::new()),
        }
    }

    /// Run `work` while holding the lock of repository `github_id`.
    ///
    /// Map entries exist only while some task holds or waits for them.
    async fn serialized<T>(&self, github_id: i64, work: impl Future<Output = T>) -> T {
        let lock = {
            let mut locks = self.repo_locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(github_id).or_default().clone()
        };

        let result = {
            let _guard = lock.lock().await;
            work.await
        };

        drop(lock);
        let mut locks = self.repo_locks.lock().unwrap_or_else(|e| e.into_inner());
        if locks
            .get(&github_id)
            .is_some_and(|l| Arc::strong_count(l) == 1)
        {
            locks.remove(&github_id);
        }
        result
    }

    /// Repositories with a lock currently held or awaited.
    pub fn locked_repositories(&self) -> usize {
        self.repo_locks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Run configured actions for every violation of `scan_id`.
    ///
    /// Repositories are processed concurrently; violations of one repository run in order.
    pub async fn process_actions_for_scan(&self, scan_id: Uuid) -> AppResult<ActionSummary> {
        let violations = self.store.violations_for_scan(scan_id).await?;
        if violations.is_empty() {
            debug!(scan_id = %scan_id, "No violations to remediate");
            return Ok(ActionSummary::default());
        }

        let config = match self.config.get_config(false).await {
            Ok(config) => Some(config),
            Err(e) => {
                warn!(
                    scan_id = %scan_id,
                    "Compliance configuration unavailable, using stored policy actions: {}", e
                );
                None
            }
        };

        let mut by_repository: BTreeMap<i64, Vec<ViolationContext>> = BTreeMap::new();
        for v in violations {
            by_repository
                .entry(v.violation.repository_id)
                .or_default()
                .push(v);
        }

        info!(
            scan_id = %scan_id,
            "Processing actions for {} repositories",
            by_repository.len()
        );

        let config = config.as_deref();
        let summaries: Vec<ActionSummary> = stream::iter(by_repository.into_values())
            .map(|group| self.process_repository(scan_id, group, config))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut total = ActionSummary::default();
        for s in &summaries {
            total.merge(s);
        }

        info!(
            scan_id = %scan_id,
            succeeded = total.succeeded,
            skipped = total.skipped,
            failed = total.failed,
            "Action processing finished"
        );
        Ok(total)
    }

    async fn process_repository(
        &self,
        scan_id: Uuid,
        group: Vec<ViolationContext>,
        config: Option<&AppConfig>,
    ) -> ActionSummary {
        let Some(first) = group.first() else {
            return ActionSummary::default();
        };
        let repo = RepositoryRef::new(
            first.repository.github_id,
            self.org.as_str(),
            first.repository.name.as_str(),
        );

        self.serialized(
            repo.github_id,
            self.process_repository_locked(scan_id, &repo, &group, config),
        )
        .await
    }

    async fn process_repository_locked(
        &self,
        scan_id: Uuid,
        repo: &RepositoryRef,
        group: &[ViolationContext],
        config: Option<&AppConfig>,
    ) -> ActionSummary {
        let mut summary = ActionSummary::default();
        let planned: Vec<PlannedViolation<'_>> = group
            .iter()
            .map(|ctx| PlannedViolation::resolve(ctx, config))
            .collect();

        // Pull request actions run once, covering every violation whose policy lists them
        let mut pr_outcomes: HashMap<ActionKind, ActionOutcome> = HashMap::new();

        for plan in &planned {
            let ctx = plan.ctx;
            for action in &plan.actions {
                let outcome = match ActionKind::parse(action) {
                    Some(kind @ (ActionKind::CommentOnPrs | ActionKind::BlockPrs)) => {
                        match pr_outcomes.get(&kind) {
                            Some(_) => ActionOutcome::skipped(format!(
                                "{} already applied to {} in this run",
                                kind, repo
                            )),
                            None => {
                                let outcome =
                                    self.apply_to_open_pull_requests(kind, repo, &planned).await;
                                pr_outcomes.insert(kind, outcome.clone());
                                outcome
                            }
                        }
                    }
                    Some(kind) => {
                        self.execute(kind, repo, ctx, plan.policy_config, scan_id)
                            .await
                    }
                    None => {
                        warn!(repository = %repo, action = %action, "Unknown action");
                        ActionOutcome::failed(format!("Unknown action: {}", action))
                    }
                };

                summary.record(outcome.status);
                if let Err(e) = self
                    .store
                    .insert_action_log(ctx.violation.id, action, &outcome)
                    .await
                {
                    error!(
                        repository = %repo,
                        action = %action,
                        "Failed to record action log: {}", e
                    );
                }
            }
        }

        summary
    }

    async fn execute(
        &self,
        kind: ActionKind,
        repo: &RepositoryRef,
        ctx: &ViolationContext,
        policy_config: Option<&PolicyConfig>,
        scan_id: Uuid,
    ) -> ActionOutcome {
        let result = match kind {
            ActionKind::CreateIssue => self.create_issue(repo, ctx, policy_config, scan_id).await,
            ActionKind::ArchiveRepo => self.archive_repository(repo).await,
            ActionKind::LogOnly => {
                info!(
                    repository = %repo,
                    policy = %ctx.policy.policy_type,
                    "Compliance violation logged"
                );
                Ok(ActionOutcome::success(format!(
                    "Logged violation of {}",
                    ctx.policy.policy_type
                )))
            }
            ActionKind::CommentOnPrs | ActionKind::BlockPrs => {
                Ok(ActionOutcome::skipped("Pull request actions run per repository"))
            }
        };

        result.unwrap_or_else(|e| {
            warn!(repository = %repo, action = %kind, "Action failed: {}", e);
            ActionOutcome::failed(e.to_string())
        })
    }

    async fn create_issue(
        &self,
        repo: &RepositoryRef,
        ctx: &ViolationContext,
        policy_config: Option<&PolicyConfig>,
        scan_id: Uuid,
    ) -> Result<ActionOutcome, GitHubError> {
        let issue = build_issue(repo, ctx, policy_config, scan_id);
        let primary_label = issue
            .labels
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_ISSUE_LABEL);

        let open = self
            .github
            .list_open_issues_with_label(repo, primary_label)
            .await?;
        if let Some(existing) = open
            .iter()
            .find(|i| i.title.trim().eq_ignore_ascii_case(issue.title.trim()))
        {
            debug!(repository = %repo, issue = existing.number, "Issue already open");
            return Ok(ActionOutcome::skipped(format!(
                "Open issue #{} already exists: {}",
                existing.number, existing.html_url
            )));
        }

        let created = self.github.create_issue(repo, &issue).await?;
        info!(repository = %repo, issue = created.number, "Created compliance issue");
        Ok(ActionOutcome::success(format!(
            "Created issue #{}: {}",
            created.number, created.html_url
        )))
    }

    async fn archive_repository(&self, repo: &RepositoryRef) -> Result<ActionOutcome, GitHubError> {
        let current = match self.github.get_repository(&repo.owner, &repo.name).await {
            Ok(r) => r,
            Err(e) => return archive_failure(repo, e),
        };

        if current.archived {
            return Ok(ActionOutcome::skipped(format!("{} is already archived", repo)));
        }

        match self.github.archive_repository(repo).await {
            Ok(()) => {
                info!(repository = %repo, "Archived repository");
                Ok(ActionOutcome::success(format!("Archived {}", repo)))
            }
            Err(e) => archive_failure(repo, e),
        }
    }

    async fn apply_to_open_pull_requests(
        &self,
        kind: ActionKind,
        repo: &RepositoryRef,
        planned: &[PlannedViolation<'_>],
    ) -> ActionOutcome {
        let selected: Vec<&PlannedViolation<'_>> =
            planned.iter().filter(|p| p.requests(kind)).collect();
        let violations: Vec<Violation> = selected.iter().map(|p| p.violation()).collect();
        let template = selected.iter().find_map(|p| {
            p.policy_config
                .and_then(|c| c.pr_comment.as_ref())
                .and_then(|c| c.message.as_deref())
        });
        let check_name = selected.iter().find_map(|p| {
            p.policy_config
                .and_then(|c| c.status_check.as_ref())
                .and_then(|s| s.name.as_deref())
        });

        let pulls = match self.github.list_open_pull_requests(repo).await {
            Ok(p) => p,
            Err(e) => {
                warn!(repository = %repo, action = %kind, "Listing pull requests failed: {}", e);
                return ActionOutcome::failed(e.to_string());
            }
        };

        if pulls.is_empty() {
            return ActionOutcome::skipped(format!("No open pull requests in {}", repo));
        }

        let mut applied = 0;
        let mut unchanged = 0;
        let mut failures = Vec::new();

        for pr in &pulls {
            let result = match kind {
                ActionKind::CommentOnPrs => {
                    self.post_comment(repo, pr.number, &violations, template)
                        .await
                }
                _ => {
                    self.upsert_check_run(repo, &pr.head.sha, &violations, check_name)
                        .await
                }
            };

            match result {
                Ok(outcome) if outcome.status == ActionStatus::Skipped => unchanged += 1,
                Ok(_) => applied += 1,
                Err(e) => failures.push(format!("#{}: {}", pr.number, e)),
            }
        }

        let details = format!(
            "{} applied to {} of {} open pull requests ({} unchanged)",
            kind,
            applied,
            pulls.len(),
            unchanged
        );
        if !failures.is_empty() {
            ActionOutcome::failed(format!("{}; failed {}", details, failures.join(", ")))
        } else if applied > 0 {
            ActionOutcome::success(details)
        } else {
            ActionOutcome::skipped(details)
        }
    }

    /// Comment the violation list on a pull request unless a bot already said the same.
    pub async fn comment_on_pull_request(
        &self,
        repo: &RepositoryRef,
        pr_number: u64,
        violations: &[Violation],
        template: Option<&str>,
    ) -> Result<ActionOutcome, GitHubError> {
        self.serialized(
            repo.github_id,
            self.post_comment(repo, pr_number, violations, template),
        )
        .await
    }

    async fn post_comment(
        &self,
        repo: &RepositoryRef,
        pr_number: u64,
        violations: &[Violation],
        template: Option<&str>,
    ) -> Result<ActionOutcome, GitHubError> {
        if violations.is_empty() {
            return Ok(ActionOutcome::skipped("No violations to report"));
        }

        let message = build_comment(violations, template);
        let existing = self.github.list_issue_comments(repo, pr_number).await?;

        if existing
            .iter()
            .filter(|c| c.is_from_bot())
            .any(|c| is_duplicate_comment(&c.body, &message))
        {
            debug!(repository = %repo, pr = pr_number, "Equivalent bot comment already posted");
            return Ok(ActionOutcome::skipped(format!(
                "PR #{} already has a compliance comment",
                pr_number
            )));
        }

        let comment = self
            .github
            .create_issue_comment(repo, pr_number, &message)
            .await?;
        info!(repository = %repo, pr = pr_number, "Posted compliance comment");
        Ok(ActionOutcome::success(format!(
            "Commented on PR #{}: {}",
            pr_number, comment.html_url
        )))
    }

    /// Create or update the compliance check run on `head_sha`.
    pub async fn update_pull_request_status_check(
        &self,
        repo: &RepositoryRef,
        head_sha: &str,
        violations: &[Violation],
        check_name: Option<&str>,
    ) -> Result<ActionOutcome, GitHubError> {
        self.serialized(
            repo.github_id,
            self.upsert_check_run(repo, head_sha, violations, check_name),
        )
        .await
    }

    async fn upsert_check_run(
        &self,
        repo: &RepositoryRef,
        head_sha: &str,
        violations: &[Violation],
        check_name: Option<&str>,
    ) -> Result<ActionOutcome, GitHubError> {
        let name = check_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_CHECK_NAME);
        let conclusion = if violations.is_empty() {
            "success"
        } else {
            "failure"
        };

        let mut request = CheckRunRequest {
            name: name.to_string(),
            head_sha: None,
            status: "completed".to_string(),
            conclusion: conclusion.to_string(),
            output: check_output(violations),
        };

        let existing = self.github.list_check_runs(repo, head_sha, name).await?;
        if let Some(run) = existing
            .iter()
            .find(|r| r.name.trim().eq_ignore_ascii_case(name))
        {
            let updated = self.github.update_check_run(repo, run.id, &request).await?;
            info!(repository = %repo, check_run = updated.id, conclusion, "Updated check run");
            return Ok(ActionOutcome::success(format!(
                "Updated check run {} on {} ({})",
                updated.id, head_sha, conclusion
            )));
        }

        request.head_sha = Some(head_sha.to_string());
        let created = self.github.create_check_run(repo, &request).await?;
        info!(repository = %repo, check_run = created.id, conclusion, "Created check run");
        Ok(ActionOutcome::success(format!(
            "Created check run {} on {} ({})",
            created.id, head_sha, conclusion
        )))
    }
}

/// A stored violation with the actions resolved for it.
struct PlannedViolation<'a> {
    ctx: &'a ViolationContext,
    policy_config: Option<&'a PolicyConfig>,
    actions: Vec<String>,
}

impl<'a> PlannedViolation<'a> {
    /// Configured actions, or the stored defaults when the policy is not configured.
    fn resolve(ctx: &'a ViolationContext, config: Option<&'a AppConfig>) -> Self {
        let policy_config = config.and_then(|c| c.policy(&ctx.policy.policy_type));
        let actions = match policy_config {
            Some(p) => p.actions.clone(),
            None => ctx.policy.default_actions.clone(),
        };
        Self {
            ctx,
            policy_config,
            actions,
        }
    }

    fn requests(&self, kind: ActionKind) -> bool {
        self.actions.iter().any(|a| ActionKind::parse(a) == Some(kind))
    }

    fn violation(&self) -> Violation {
        Violation::new(&self.ctx.policy.policy_type, self.ctx.policy.description.as_str())
    }
}

fn archive_failure(repo: &RepositoryRef, e: GitHubError) -> Result<ActionOutcome, GitHubError> {
    match e {
        GitHubError::NotFound(_) => {
            warn!(repository = %repo, "Repository not found, it may have been deleted");
            Ok(ActionOutcome::failed(format!("{} was not found", repo)))
        }
        GitHubError::Forbidden(msg) => {
            warn!(repository = %repo, "Missing permission to archive: {}", msg);
            Ok(ActionOutcome::failed(format!(
                "Insufficient permissions to archive {}: {}",
                repo, msg
            )))
        }
        other => Err(other),
    }
}

fn build_issue(
    repo: &RepositoryRef,
    ctx: &ViolationContext,
    policy_config: Option<&PolicyConfig>,
    scan_id: Uuid,
) -> NewIssue {
    let settings = policy_config.and_then(|p| p.issue.as_ref());
    let policy_type = &ctx.policy.policy_type;

    let title = settings
        .and_then(|s| s.title.as_deref())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("Compliance violation: {}", policy_type));

    let body = settings
        .and_then(|s| s.body.clone())
        .filter(|b| !b.trim().is_empty())
        .unwrap_or_else(|| {
            format!(
                "Repository `{}` violates the `{}` compliance policy.\n\n{}\n\nDetected by scan `{}`.",
                repo, policy_type, ctx.policy.description, scan_id
            )
        });

    let labels: Vec<String> = settings
        .map(|s| {
            s.labels
                .iter()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .collect()
        })
        .filter(|l: &Vec<String>| !l.is_empty())
        .unwrap_or_else(|| vec![DEFAULT_ISSUE_LABEL.to_string()]);

    NewIssue {
        title,
        body,
        labels,
    }
}

fn violation_list(violations: &[Violation]) -> String {
    let mut types: Vec<&str> = Vec::new();
    for v in violations {
        if !types.contains(&v.policy_type.as_str()) {
            types.push(&v.policy_type);
        }
    }
    types
        .iter()
        .map(|t| format!("- `{}`", t))
        .collect::<Vec<_>>()
        .join("\n")
}

/// PR comment body: a custom template or the default header plus one bullet per policy.
pub fn build_comment(violations: &[Violation], template: Option<&str>) -> String {
    let list = violation_list(violations);
    match template.map(str::trim).filter(|t| !t.is_empty()) {
        Some(t) if t.contains(VIOLATIONS_PLACEHOLDER) => t.replace(VIOLATIONS_PLACEHOLDER, &list),
        Some(t) => format!("{}\n\n{}", t, list),
        None => format!(
            "{}\n\nThis pull request targets a repository that violates the following compliance policies:\n\n{}",
            COMMENT_HEADER, list
        ),
    }
}

/// Whether `existing` already carries the first characters of `candidate`, ignoring case.
pub fn is_duplicate_comment(existing: &str, candidate: &str) -> bool {
    let prefix: String = candidate
        .chars()
        .take(COMMENT_DEDUPE_PREFIX_CHARS)
        .collect::<String>()
        .to_lowercase();
    !prefix.is_empty() && existing.to_lowercase().contains(&prefix)
}

fn check_output(violations: &[Violation]) -> CheckRunOutput {
    if violations.is_empty() {
        return CheckRunOutput {
            title: "All compliance checks passed".to_string(),
            summary: "No compliance violations were found.".to_string(),
        };
    }

    CheckRunOutput {
        title: format!("{} compliance violation(s)", violations.len()),
        summary: violations
            .iter()
            .map(|v| format!("- **{}**: {}", v.policy_type, v.message))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}
