//! GitHub REST client used by evaluators, actions and the access check.
//!
//! All calls go through [`GitHubApi`] so the scan pipeline can be exercised against an
//! in-memory fake. [`GitHubClient`] is the reqwest implementation; it authenticates every
//! request with the installation token from [`TokenManager`] and follows `Link` header
//! pagination for list endpoints.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, USER_AGENT};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use secrecy::ExposeSecret;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{AppError, GitHubError};
use crate::models::RepositoryRef;
use crate::models::github::{
    CheckRun, CheckRunList, CheckRunRequest, FileContent, GitHubIssue, GitHubRepository,
    IssueComment, NewIssue, PullRequest, TeamMembership, WorkflowPermissions,
};

use super::token_manager::TokenManager;

pub const USER_AGENT_VALUE: &str = concat!("repo-compliance/", env!("CARGO_PKG_VERSION"));
const API_VERSION: &str = "2022-11-28";
const ACCEPT_VALUE: &str = "application/vnd.github+json";
const PER_PAGE: u32 = 100;
/// Upper bound on followed pages for a single list call.
const MAX_PAGES: usize = 100;

const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// GitHub operations the compliance engine needs.
#[async_trait]
pub trait GitHubApi: Send + Sync {
    /// All repositories of the organization, archived ones included.
    async fn list_org_repositories(&self, org: &str)
    -> Result<Vec<GitHubRepository>, GitHubError>;

    async fn get_repository(&self, owner: &str, name: &str)
    -> Result<GitHubRepository, GitHubError>;

    async fn archive_repository(&self, repo: &RepositoryRef) -> Result<(), GitHubError>;

    /// Open issues (not pull requests) carrying `label`.
    async fn list_open_issues_with_label(
        &self,
        repo: &RepositoryRef,
        label: &str,
    ) -> Result<Vec<GitHubIssue>, GitHubError>;

    async fn create_issue(
        &self,
        repo: &RepositoryRef,
        issue: &NewIssue,
    ) -> Result<GitHubIssue, GitHubError>;

    /// File at `path` on the default branch; `None` when it does not exist.
    async fn get_file_content(
        &self,
        repo: &RepositoryRef,
        path: &str,
    ) -> Result<Option<FileContent>, GitHubError>;

    /// Default workflow permissions; `None` when GitHub reports none for the repository.
    async fn get_workflow_permissions(
        &self,
        repo: &RepositoryRef,
    ) -> Result<Option<WorkflowPermissions>, GitHubError>;

    async fn list_open_pull_requests(
        &self,
        repo: &RepositoryRef,
    ) -> Result<Vec<PullRequest>, GitHubError>;

    async fn list_issue_comments(
        &self,
        repo: &RepositoryRef,
        number: u64,
    ) -> Result<Vec<IssueComment>, GitHubError>;

    async fn create_issue_comment(
        &self,
        repo: &RepositoryRef,
        number: u64,
        body: &str,
    ) -> Result<IssueComment, GitHubError>;

    /// Check runs on `sha`, filtered by GitHub on the exact `name`.
    async fn list_check_runs(
        &self,
        repo: &RepositoryRef,
        sha: &str,
        name: &str,
    ) -> Result<Vec<CheckRun>, GitHubError>;

    async fn create_check_run(
        &self,
        repo: &RepositoryRef,
        request: &CheckRunRequest,
    ) -> Result<CheckRun, GitHubError>;

    async fn update_check_run(
        &self,
        repo: &RepositoryRef,
        check_run_id: u64,
        request: &CheckRunRequest,
    ) -> Result<CheckRun, GitHubError>;

    /// Whether `login` is an active member of `org/team_slug`.
    async fn is_team_member(
        &self,
        org: &str,
        team_slug: &str,
        login: &str,
    ) -> Result<bool, GitHubError>;
}

/// reqwest implementation of [`GitHubApi`].
pub struct GitHubClient {
    api_url: String,
    http_client: reqwest::Client,
    tokens: Arc<TokenManager>,
}

impl GitHubClient {
    pub fn new(api_url: &str, tokens: Arc<TokenManager>) -> Result<Self, AppError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .timeout(HTTP_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                AppError::Authentication(format!("Failed to build GitHub HTTP client: {}", e))
            })?;

        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            http_client,
            tokens,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    fn repo_path(repo: &RepositoryRef) -> String {
        format!(
            "/repos/{}/{}",
            urlencoding::encode(&repo.owner),
            urlencoding::encode(&repo.name)
        )
    }

    async fn request(&self, method: Method, url: &str) -> Result<RequestBuilder, GitHubError> {
        let token = self
            .tokens
            .get_token()
            .await
            .map_err(|e| GitHubError::Authentication(e.to_string()))?;

        Ok(self
            .http_client
            .request(method, url)
            .bearer_auth(token.expose_secret())
            .header(ACCEPT, ACCEPT_VALUE)
            .header(USER_AGENT, USER_AGENT_VALUE)
            .header("X-GitHub-Api-Version", API_VERSION))
    }

    async fn send(&self, builder: RequestBuilder, url: &str) -> Result<Response, GitHubError> {
        let response = builder
            .send()
            .await
            .map_err(|e| GitHubError::Transport(e.to_string()))?;

        if response.status() == StatusCode::UNAUTHORIZED {
            // Token revoked or rotated early; next call mints a new one
            self.tokens.invalidate().await;
        }

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(error_for_response(response, url).await)
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, GitHubError> {
        let builder = self.request(Method::GET, url).await?;
        let response = self.send(builder, url).await?;
        decode_json(response, url).await
    }

    async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: &B,
    ) -> Result<T, GitHubError> {
        let builder = self.request(method, url).await?.json(body);
        let response = self.send(builder, url).await?;
        decode_json(response, url).await
    }

    /// GET every page of a list endpoint, following `rel="next"` links.
    async fn get_paginated<T: DeserializeOwned>(
        &self,
        first_url: String,
    ) -> Result<Vec<T>, GitHubError> {
        collect_pages(first_url, MAX_PAGES, |url| async move {
            let builder = self.request(Method::GET, &url).await?;
            let response = self.send(builder, &url).await?;
            let next = next_page_url(response.headers());
            let page: Vec<T> = decode_json(response, &url).await?;
            Ok((page, next))
        })
        .await
    }
}

/// Drain a paginated listing. A listing longer than `max_pages` is an error, never a
/// silently shortened result: reconciliation treats absent repositories as deleted.
async fn collect_pages<T, F, Fut>(
    first_url: String,
    max_pages: usize,
    mut fetch: F,
) -> Result<Vec<T>, GitHubError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<(Vec<T>, Option<String>), GitHubError>>,
{
    let mut items = Vec::new();
    let mut next = Some(first_url);
    let mut pages = 0;

    while let Some(url) = next.take() {
        if pages == max_pages {
            warn!(pages, "Listing exceeds the page limit at {}", url);
            return Err(GitHubError::PageLimit { pages, url });
        }
        pages += 1;

        let (mut page, following) = fetch(url).await?;
        items.append(&mut page);
        next = following;
    }

    Ok(items)
}

#[async_trait]
impl GitHubApi for GitHubClient {
    async fn list_org_repositories(
        &self,
        org: &str,
    ) -> Result<Vec<GitHubRepository>, GitHubError> {
        let url = self.url(&format!(
            "/orgs/{}/repos?type=all&per_page={}",
            urlencoding::encode(org),
            PER_PAGE
        ));
        let repos: Vec<GitHubRepository> = self.get_paginated(url).await?;
        debug!("Listed {} repositories for org {}", repos.len(), org);
        Ok(repos)
    }

    async fn get_repository(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<GitHubRepository, GitHubError> {
        let url = self.url(&format!(
            "/repos/{}/{}",
            urlencoding::encode(owner),
            urlencoding::encode(name)
        ));
        self.get_json(&url).await
    }

    async fn archive_repository(&self, repo: &RepositoryRef) -> Result<(), GitHubError> {
        let url = self.url(&Self::repo_path(repo));
        let _: serde_json::Value = self
            .send_json(Method::PATCH, &url, &serde_json::json!({ "archived": true }))
            .await?;
        Ok(())
    }

    async fn list_open_issues_with_label(
        &self,
        repo: &RepositoryRef,
        label: &str,
    ) -> Result<Vec<GitHubIssue>, GitHubError> {
        let url = self.url(&format!(
            "{}/issues?state=open&labels={}&per_page={}",
            Self::repo_path(repo),
            urlencoding::encode(label),
            PER_PAGE
        ));
        let issues: Vec<GitHubIssue> = self.get_paginated(url).await?;
        Ok(issues
            .into_iter()
            .filter(|i| i.pull_request.is_none())
            .collect())
    }

    async fn create_issue(
        &self,
        repo: &RepositoryRef,
        issue: &NewIssue,
    ) -> Result<GitHubIssue, GitHubError> {
        let url = self.url(&format!("{}/issues", Self::repo_path(repo)));
        self.send_json(Method::POST, &url, issue).await
    }

    async fn get_file_content(
        &self,
        repo: &RepositoryRef,
        path: &str,
    ) -> Result<Option<FileContent>, GitHubError> {
        let encoded_path = path
            .trim_start_matches('/')
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let url = self.url(&format!(
            "{}/contents/{}",
            Self::repo_path(repo),
            encoded_path
        ));

        match self.get_json::<FileContent>(&url).await {
            Ok(file) => Ok(Some(file)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn get_workflow_permissions(
        &self,
        repo: &RepositoryRef,
    ) -> Result<Option<WorkflowPermissions>, GitHubError> {
        let url = self.url(&format!(
            "{}/actions/permissions/workflow",
            Self::repo_path(repo)
        ));

        match self.get_json::<WorkflowPermissions>(&url).await {
            Ok(permissions) => Ok(Some(permissions)),
            // Actions disabled or unavailable for the repository
            Err(GitHubError::NotFound(_)) | Err(GitHubError::Api { status: 409, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn list_open_pull_requests(
        &self,
        repo: &RepositoryRef,
    ) -> Result<Vec<PullRequest>, GitHubError> {
        let url = self.url(&format!(
            "{}/pulls?state=open&per_page={}",
            Self::repo_path(repo),
            PER_PAGE
        ));
        self.get_paginated(url).await
    }

    async fn list_issue_comments(
        &self,
        repo: &RepositoryRef,
        number: u64,
    ) -> Result<Vec<IssueComment>, GitHubError> {
        let url = self.url(&format!(
            "{}/issues/{}/comments?per_page={}",
            Self::repo_path(repo),
            number,
            PER_PAGE
        ));
        self.get_paginated(url).await
    }

    async fn create_issue_comment(
        &self,
        repo: &RepositoryRef,
        number: u64,
        body: &str,
    ) -> Result<IssueComment, GitHubError> {
        let url = self.url(&format!(
            "{}/issues/{}/comments",
            Self::repo_path(repo),
            number
        ));
        self.send_json(Method::POST, &url, &serde_json::json!({ "body": body }))
            .await
    }

    async fn list_check_runs(
        &self,
        repo: &RepositoryRef,
        sha: &str,
        name: &str,
    ) -> Result<Vec<CheckRun>, GitHubError> {
        let url = self.url(&format!(
            "{}/commits/{}/check-runs?check_name={}&per_page={}",
            Self::repo_path(repo),
            urlencoding::encode(sha),
            urlencoding::encode(name),
            PER_PAGE
        ));
        let list: CheckRunList = self.get_json(&url).await?;
        Ok(list.check_runs)
    }

    async fn create_check_run(
        &self,
        repo: &RepositoryRef,
        request: &CheckRunRequest,
    ) -> Result<CheckRun, GitHubError> {
        let url = self.url(&format!("{}/check-runs", Self::repo_path(repo)));
        self.send_json(Method::POST, &url, request).await
    }

    async fn update_check_run(
        &self,
        repo: &RepositoryRef,
        check_run_id: u64,
        request: &CheckRunRequest,
    ) -> Result<CheckRun, GitHubError> {
        let url = self.url(&format!(
            "{}/check-runs/{}",
            Self::repo_path(repo),
            check_run_id
        ));
        self.send_json(Method::PATCH, &url, request).await
    }

    async fn is_team_member(
        &self,
        org: &str,
        team_slug: &str,
        login: &str,
    ) -> Result<bool, GitHubError> {
        let url = self.url(&format!(
            "/orgs/{}/teams/{}/memberships/{}",
            urlencoding::encode(org),
            urlencoding::encode(team_slug),
            urlencoding::encode(login)
        ));

        match self.get_json::<TeamMembership>(&url).await {
            Ok(membership) => Ok(membership.state == "active"),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

async fn decode_json<T: DeserializeOwned>(response: Response, url: &str) -> Result<T, GitHubError> {
    response
        .json::<T>()
        .await
        .map_err(|e| GitHubError::Decode(format!("{}: {}", url, e)))
}

/// Map a non-success response to a [`GitHubError`].
pub(crate) async fn error_for_response(response: Response, url: &str) -> GitHubError {
    let status = response.status();
    let rate_limited = is_rate_limited(status, response.headers());
    let reset_at = header_i64(response.headers(), "x-ratelimit-reset");
    let message = response
        .text()
        .await
        .ok()
        .and_then(|body| {
            serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
                .or(Some(body))
        })
        .unwrap_or_default();

    match status {
        StatusCode::NOT_FOUND => GitHubError::NotFound(url.to_string()),
        _ if rate_limited => {
            warn!("GitHub rate limit exhausted (reset_at={:?})", reset_at);
            GitHubError::RateLimited { reset_at }
        }
        StatusCode::FORBIDDEN => GitHubError::Forbidden(message),
        _ => GitHubError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

fn is_rate_limited(status: StatusCode, headers: &HeaderMap) -> bool {
    match status {
        StatusCode::TOO_MANY_REQUESTS => true,
        StatusCode::FORBIDDEN => header_i64(headers, "x-ratelimit-remaining") == Some(0),
        _ => false,
    }
}

fn header_i64(headers: &HeaderMap, name: &str) -> Option<i64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// URL of the `rel="next"` entry of a `Link` header.
pub fn next_page_url(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(reqwest::header::LINK)?.to_str().ok()?;
    parse_next_link(link)
}

fn parse_next_link(link: &str) -> Option<String> {
    link.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts.next()?.trim();
        let is_next = parts.any(|p| {
            let p = p.trim();
            p == "rel=\"next\"" || p == "rel=next"
        });
        if !is_next {
            return None;
        }
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::to_string)
    })
}
