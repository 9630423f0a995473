//! Domain models for the compliance engine.

pub mod action;
pub mod app_config;
pub mod compliance;
pub mod github;
pub mod policy;
pub mod repository;
pub mod scan;
pub mod violation;

// Re-export commonly used types
pub use action::{ActionKind, ActionLog, ActionOutcome, ActionStatus, ActionSummary};
pub use app_config::{
    AppConfig, IssueSettings, PolicyConfig, PrCommentSettings, StatusCheckSettings,
};
pub use compliance::ComplianceSummary;
pub use policy::Policy;
pub use repository::{Repository, RepositoryRef};
pub use scan::{Scan, ScanStatus, ScanSummary};
pub use violation::{PolicyViolation, Violation, ViolationContext};
