//! Organization-wide compliance summary.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{Scan, ViolationContext};

/// Snapshot of compliance as of the latest completed scan.
///
/// Everything is scoped to that scan: repositories tracked since, or touched by a scan
/// still running or failed, do not count.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ComplianceSummary {
    /// Latest completed scan, `None` before the first one finishes
    pub scan_id: Option<Uuid>,
    pub total_repositories: usize,
    pub compliant_repositories: usize,
    pub total_violations: usize,
    /// Violation count per policy type
    pub violations_by_policy: BTreeMap<String, usize>,
    /// Percentage of compliant repositories; `None` without a completed scan or when it
    /// evaluated no repositories
    pub compliance_percentage: Option<f64>,
}

impl ComplianceSummary {
    /// Summary before any scan has completed.
    pub fn empty() -> Self {
        Self::build(None, 0, &[])
    }

    /// Summary of a completed scan and its violations.
    pub fn for_scan(scan: &Scan, violations: &[ViolationContext]) -> Self {
        let evaluated = scan.repositories_scanned.unwrap_or_default() as usize;
        Self::build(Some(scan.id), evaluated, violations)
    }

    pub fn build(
        scan_id: Option<Uuid>,
        total_repositories: usize,
        violations: &[ViolationContext],
    ) -> Self {
        let mut violations_by_policy = BTreeMap::new();
        let mut violating = BTreeSet::new();
        for v in violations {
            *violations_by_policy
                .entry(v.policy.policy_type.clone())
                .or_insert(0) += 1;
            violating.insert(v.violation.repository_id);
        }

        let compliant_repositories = total_repositories.saturating_sub(violating.len());
        let compliance_percentage = (total_repositories > 0)
            .then(|| compliant_repositories as f64 * 100.0 / total_repositories as f64);

        Self {
            scan_id,
            total_repositories,
            compliant_repositories,
            total_violations: violations.len(),
            violations_by_policy,
            compliance_percentage,
        }
    }
}
