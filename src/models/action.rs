//! Remediation action models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Compiled-in remediation actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    CreateIssue,
    ArchiveRepo,
    CommentOnPrs,
    BlockPrs,
    LogOnly,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateIssue => "create-issue",
            Self::ArchiveRepo => "archive-repo",
            Self::CommentOnPrs => "comment-on-prs",
            Self::BlockPrs => "block-prs",
            Self::LogOnly => "log-only",
        }
    }

    /// Parse a configured action identifier; `_` and `-` are interchangeable.
    pub fn parse(s: &str) -> Option<Self> {
        match normalize_action(s).as_str() {
            "create-issue" => Some(Self::CreateIssue),
            "archive-repo" => Some(Self::ArchiveRepo),
            "comment-on-prs" => Some(Self::CommentOnPrs),
            "block-prs" => Some(Self::BlockPrs),
            "log-only" => Some(Self::LogOnly),
            _ => None,
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Canonical spelling of an action identifier.
pub fn normalize_action(s: &str) -> String {
    s.trim().to_lowercase().replace('_', "-")
}

/// Outcome recorded for one action attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Success,
    Skipped,
    Failed,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "skipped" => Some(Self::Skipped),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of executing one action, before it is written to the audit log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    pub status: ActionStatus,
    pub details: String,
}

impl ActionOutcome {
    pub fn success(details: impl Into<String>) -> Self {
        Self {
            status: ActionStatus::Success,
            details: details.into(),
        }
    }

    pub fn skipped(details: impl Into<String>) -> Self {
        Self {
            status: ActionStatus::Skipped,
            details: details.into(),
        }
    }

    pub fn failed(details: impl Into<String>) -> Self {
        Self {
            status: ActionStatus::Failed,
            details: details.into(),
        }
    }
}

/// Append-only audit entry for one (violation, action) attempt.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ActionLog {
    pub id: Uuid,
    pub violation_id: Uuid,
    /// Identifier as configured (unknown identifiers are kept verbatim)
    pub action_type: String,
    pub status: ActionStatus,
    pub details: String,
    pub created_at: DateTime<Utc>,
}

/// Counters for one batch of remediation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct ActionSummary {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ActionSummary {
    pub fn record(&mut self, status: ActionStatus) {
        match status {
            ActionStatus::Success => self.succeeded += 1,
            ActionStatus::Skipped => self.skipped += 1,
            ActionStatus::Failed => self.failed += 1,
        }
    }

    pub fn merge(&mut self, other: &ActionSummary) {
        self.succeeded += other.succeeded;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.skipped + self.failed
    }
}
