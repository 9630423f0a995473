//! GitHub REST API request and response types.
//!
//! Only the fields the compliance engine reads are modelled; everything else in
//! GitHub's payloads is ignored during deserialization.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::error::GitHubError;

/// A user or app account.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GitHubUser {
    pub login: String,
    /// "User", "Bot" or "Organization"
    #[serde(rename = "type", default)]
    pub account_type: String,
}

impl GitHubUser {
    pub fn new(login: impl Into<String>, account_type: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            account_type: account_type.into(),
        }
    }

    /// Bot-like accounts: type "Bot", or a login that mentions "bot" / ends in "[bot]".
    pub fn is_bot(&self) -> bool {
        let login = self.login.to_lowercase();
        self.account_type.eq_ignore_ascii_case("bot")
            || login.contains("bot")
            || login.ends_with("[bot]")
    }
}

/// Repository as listed for the organization.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GitHubRepository {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub owner: GitHubUser,
}

impl GitHubRepository {
    pub fn new(id: i64, owner: &str, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            full_name: format!("{}/{}", owner, name),
            archived: false,
            owner: GitHubUser::new(owner, "Organization"),
        }
    }
}

/// An issue (pull requests returned by the issues endpoint carry `pull_request`).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GitHubIssue {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub pull_request: Option<serde_json::Value>,
}

/// Body of an issue creation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewIssue {
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
}

/// Raw file payload from the contents API.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FileContent {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub encoding: String,
}

impl FileContent {
    /// Wrap plain text the way the contents API returns it.
    pub fn from_text(text: &str) -> Self {
        Self {
            content: STANDARD.encode(text.as_bytes()),
            encoding: "base64".to_string(),
        }
    }

    /// Decode the payload to UTF-8 text. GitHub wraps base64 at 60 columns.
    pub fn decode(&self) -> Result<String, GitHubError> {
        if !self.encoding.is_empty() && !self.encoding.eq_ignore_ascii_case("base64") {
            return Err(GitHubError::Decode(format!(
                "unsupported content encoding '{}'",
                self.encoding
            )));
        }
        let compact: String = self
            .content
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let bytes = STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| GitHubError::Decode(format!("invalid base64 content: {}", e)))?;
        String::from_utf8(bytes)
            .map_err(|e| GitHubError::Decode(format!("content is not UTF-8: {}", e)))
    }
}

/// Default GITHUB_TOKEN permissions for workflows in a repository.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WorkflowPermissions {
    pub default_workflow_permissions: String,
    #[serde(default)]
    pub can_approve_pull_request_reviews: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PullRequestHead {
    pub sha: String,
    #[serde(rename = "ref", default)]
    pub git_ref: String,
}

/// An open pull request.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    #[serde(default)]
    pub html_url: String,
    pub head: PullRequestHead,
}

impl PullRequest {
    pub fn new(number: u64, head_sha: &str) -> Self {
        Self {
            number,
            html_url: String::new(),
            head: PullRequestHead {
                sha: head_sha.to_string(),
                git_ref: String::new(),
            },
        }
    }
}

/// A comment on an issue or pull request conversation.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct IssueComment {
    pub id: u64,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub user: Option<GitHubUser>,
    #[serde(default)]
    pub html_url: String,
}

impl IssueComment {
    pub fn is_from_bot(&self) -> bool {
        self.user.as_ref().is_some_and(GitHubUser::is_bot)
    }
}

/// A check run attached to a commit.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CheckRun {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub conclusion: Option<String>,
    #[serde(default)]
    pub head_sha: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CheckRunList {
    #[serde(default)]
    pub check_runs: Vec<CheckRun>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckRunOutput {
    pub title: String,
    pub summary: String,
}

/// Body of a check run create/update request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckRunRequest {
    pub name: String,
    /// Only sent on creation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head_sha: Option<String>,
    pub status: String,
    pub conclusion: String,
    pub output: CheckRunOutput,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TeamMembership {
    #[serde(default)]
    pub state: String,
}
