//! Scan orchestration: inventory reconciliation, evaluation and remediation handoff.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures_util::{StreamExt, stream};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::ComplianceStore;
use crate::error::AppResult;
use crate::models::{ActionSummary, PolicyConfig, RepositoryRef, ScanStatus, ScanSummary};

use super::actions::ActionExecutor;
use super::clock::Clock;
use super::config_cache::ConfigCache;
use super::evaluation::PolicyEngine;
use super::github_client::GitHubApi;

/// Description stored for configured types without an evaluator.
const UNSUPPORTED_POLICY_DESCRIPTION: &str = "No evaluator available for this policy type";

/// A finished scan and, when it found violations, the remediation task it started.
pub struct ScanRun {
    pub summary: ScanSummary,
    pub remediation: Option<JoinHandle<AppResult<ActionSummary>>>,
}

struct ScanCounts {
    scanned: usize,
    removed: usize,
    violations: usize,
    unsupported: Vec<String>,
}

pub struct ScanOrchestrator {
    store: Arc<dyn ComplianceStore>,
    github: Arc<dyn GitHubApi>,
    config: Arc<ConfigCache>,
    engine: Arc<PolicyEngine>,
    executor: Arc<ActionExecutor>,
    clock: Arc<dyn Clock>,
    org: String,
    concurrency: usize,
}

impl ScanOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn ComplianceStore>,
        github: Arc<dyn GitHubApi>,
        config: Arc<ConfigCache>,
        engine: Arc<PolicyEngine>,
        executor: Arc<ActionExecutor>,
        clock: Arc<dyn Clock>,
        org: impl Into<String>,
        concurrency: usize,
    ) -> Self {
        Self {
            store,
            github,
            config,
            engine,
            executor,
            clock,
            org: org.into(),
            concurrency: concurrency.max(1),
        }
    }

    /// Run one scan; remediation continues in the background.
    pub async fn perform_scan(&self) -> AppResult<ScanSummary> {
        Ok(self.run_scan().await?.summary)
    }

    /// Run one scan and hand back the remediation task, if any.
    ///
    /// Every call creates its own scan record. Errors after the record exists mark the
    /// scan `Failed` and are reported through the summary, not returned.
    pub async fn run_scan(&self) -> AppResult<ScanRun> {
        let scan = self.store.create_scan().await?;
        let scan_id = scan.id;
        info!(scan_id = %scan_id, org = %self.org, "Scan started");

        let result = match self
            .store
            .update_scan_status(scan_id, ScanStatus::InProgress, None)
            .await
        {
            Ok(_) => self.execute_scan(scan_id).await,
            Err(e) => Err(e),
        };

        let counts = match result {
            Ok(counts) => counts,
            Err(e) => {
                error!(scan_id = %scan_id, "Scan failed: {}", e);
                self.store
                    .update_scan_status(scan_id, ScanStatus::Failed, Some(e.to_string()))
                    .await?;
                return Ok(ScanRun {
                    summary: ScanSummary {
                        scan_id,
                        status: ScanStatus::Failed,
                        repositories_scanned: 0,
                        repositories_removed: 0,
                        violations_found: 0,
                        unsupported_policies: Vec::new(),
                    },
                    remediation: None,
                });
            }
        };

        self.store
            .update_scan_status(scan_id, ScanStatus::Completed, None)
            .await?;

        info!(
            scan_id = %scan_id,
            repositories = counts.scanned,
            removed = counts.removed,
            violations = counts.violations,
            "Scan completed"
        );

        let remediation = (counts.violations > 0).then(|| {
            let executor = self.executor.clone();
            tokio::spawn(async move {
                let result = executor.process_actions_for_scan(scan_id).await;
                if let Err(e) = &result {
                    error!(scan_id = %scan_id, "Remediation failed: {}", e);
                }
                result
            })
        });

        Ok(ScanRun {
            summary: ScanSummary {
                scan_id,
                status: ScanStatus::Completed,
                repositories_scanned: counts.scanned,
                repositories_removed: counts.removed,
                violations_found: counts.violations,
                unsupported_policies: counts.unsupported,
            },
            remediation,
        })
    }

    async fn execute_scan(&self, scan_id: Uuid) -> AppResult<ScanCounts> {
        let config = self.config.get_config(false).await?;

        // Inventory reconciliation
        let live = self.github.list_org_repositories(&self.org).await?;
        let live_ids: HashSet<i64> = live.iter().map(|r| r.id).collect();
        let tracked = self.store.list_repositories().await?;

        for repo in &live {
            self.store.upsert_repository(repo.id, &repo.name).await?;
        }

        let mut removed = 0;
        for repo in tracked.iter().filter(|r| !live_ids.contains(&r.github_id)) {
            info!(scan_id = %scan_id, repository = %repo.name, "Removing repository no longer in organization");
            self.store.delete_repository(repo.github_id).await?;
            removed += 1;
        }

        // Policy catalogue
        let mut policy_ids: HashMap<String, Uuid> = HashMap::new();
        let mut unsupported = Vec::new();
        let mut evaluated: Vec<PolicyConfig> = Vec::new();

        for policy in &config.policies {
            if policy_ids.contains_key(&policy.policy_type) {
                continue;
            }

            let description = match self.engine.evaluator(&policy.policy_type) {
                Some(evaluator) => {
                    evaluated.push(policy.clone());
                    evaluator.description().to_string()
                }
                None => {
                    warn!(scan_id = %scan_id, policy = %policy.policy_type, "No evaluator for configured policy type");
                    unsupported.push(policy.policy_type.clone());
                    UNSUPPORTED_POLICY_DESCRIPTION.to_string()
                }
            };

            let stored = self
                .store
                .upsert_policy(&policy.policy_type, &description, &policy.actions)
                .await?;
            policy_ids.insert(policy.policy_type.clone(), stored.id);
        }

        // Evaluation, persisted as each repository finishes
        let engine = &self.engine;
        let evaluated = &evaluated;
        let evaluations: Vec<_> = live
            .iter()
            .map(|repo| async move {
                let repo_ref = RepositoryRef::new(repo.id, self.org.as_str(), repo.name.as_str());
                let violations = engine.evaluate_repository(&repo_ref, evaluated).await;
                (repo_ref, violations)
            })
            .collect();
        let mut results = stream::iter(evaluations).buffer_unordered(self.concurrency);

        let mut violation_count = 0;
        while let Some((repo, violations)) = results.next().await {
            // Authentication failures leave the scan without any determination
            let violations = violations?;
            for violation in &violations {
                let Some(policy_id) = policy_ids.get(&violation.policy_type) else {
                    continue;
                };
                self.store
                    .insert_violation(scan_id, repo.github_id, *policy_id)
                    .await?;
                violation_count += 1;
            }

            self.store
                .record_repository_evaluation(repo.github_id, violations.is_empty(), self.clock.now())
                .await?;
        }

        self.store
            .record_scan_repositories(scan_id, live.len())
            .await?;

        Ok(ScanCounts {
            scanned: live.len(),
            removed,
            violations: violation_count,
            unsupported,
        })
    }
}
