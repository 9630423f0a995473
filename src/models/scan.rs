//! Scan domain models and DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle of a single reconciliation run.
///
/// `Pending -> InProgress -> {Completed | Failed}`; both end states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether a scan in this state may move to `next`.
    pub fn can_transition_to(&self, next: ScanStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::InProgress)
                | (Self::Pending, Self::Failed)
                | (Self::InProgress, Self::Completed)
                | (Self::InProgress, Self::Failed)
        )
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted scan record.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Scan {
    pub id: Uuid,
    pub status: ScanStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Size of the inventory this scan evaluated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repositories_scanned: Option<u32>,
    /// Reason recorded when the scan failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Result of one `perform_scan` invocation.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ScanSummary {
    pub scan_id: Uuid,
    pub status: ScanStatus,
    pub repositories_scanned: usize,
    pub repositories_removed: usize,
    pub violations_found: usize,
    /// Configured policy types with no compiled-in evaluator
    pub unsupported_policies: Vec<String>,
}
