//! Stateless HTTP request builder and response parser for the issues API.
//!
//! # Design
//! `IssuesClient` holds only its configuration and carries no mutable state
//! between calls. Each endpoint has a `build_*` method producing an
//! `HttpRequest`; responses are decoded by one `parse_*` method per payload
//! shape. The caller executes the HTTP round-trip in between, either by hand
//! or through `IssuesService`.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::options::{add_options, IssueListByRepoOptions, IssueListOptions, MilestoneListOptions};
use crate::types::{Issue, IssueRequest, LockIssueOptions, Milestone, MilestoneRemoval};

/// Default media type for the v3 REST API.
pub const MEDIA_TYPE_V3: &str = "application/vnd.github.v3+json";

/// Opts issue responses into the `reactions` summary.
pub const MEDIA_TYPE_REACTIONS_PREVIEW: &str = "application/vnd.github.squirrel-girl-preview+json";

/// Synchronous, stateless client for the issues and milestones endpoints.
#[derive(Debug, Clone)]
pub struct IssuesClient {
    base_url: String,
    user_agent: String,
}

impl IssuesClient {
    pub fn new(base_url: &str) -> Self {
        Self::with_config(ClientConfig::default().with_base_url(base_url))
    }

    pub fn with_config(config: ClientConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            user_agent: config.user_agent,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // -----------------------------------------------------------------------
    // Issues
    // -----------------------------------------------------------------------

    /// List issues for the authenticated user. `all` selects every visible
    /// repository (`issues`); otherwise only owned and member repositories
    /// (`user/issues`).
    pub fn build_list_issues(&self, all: bool, opts: Option<&IssueListOptions>) -> Result<HttpRequest, ApiError> {
        let path = if all { "issues" } else { "user/issues" };
        self.build_issue_listing(path.to_string(), opts)
    }

    pub fn build_list_issues_by_org(&self, org: &str, opts: Option<&IssueListOptions>) -> Result<HttpRequest, ApiError> {
        self.build_issue_listing(format!("orgs/{org}/issues"), opts)
    }

    pub fn build_list_issues_by_repo(
        &self,
        owner: &str,
        repo: &str,
        opts: Option<&IssueListByRepoOptions>,
    ) -> Result<HttpRequest, ApiError> {
        self.build_issue_listing(format!("repos/{owner}/{repo}/issues"), opts)
    }

    pub fn build_get_issue(&self, owner: &str, repo: &str, number: u64) -> HttpRequest {
        let mut req = self.request(HttpMethod::Get, &format!("repos/{owner}/{repo}/issues/{number}"), None);
        set_accept(&mut req, MEDIA_TYPE_REACTIONS_PREVIEW);
        req
    }

    pub fn build_create_issue(&self, owner: &str, repo: &str, issue: &IssueRequest) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Post, &format!("repos/{owner}/{repo}/issues"), issue)
    }

    /// PATCH with only the `Some` fields of `issue`.
    pub fn build_edit_issue(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        issue: &IssueRequest,
    ) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Patch, &format!("repos/{owner}/{repo}/issues/{number}"), issue)
    }

    /// PATCH sending `{"milestone": null}`. Omitting the field would leave the
    /// milestone untouched.
    pub fn build_remove_milestone(&self, owner: &str, repo: &str, number: u64) -> Result<HttpRequest, ApiError> {
        self.json_request(
            HttpMethod::Patch,
            &format!("repos/{owner}/{repo}/issues/{number}"),
            &MilestoneRemoval { milestone: None },
        )
    }

    /// PUT to the lock sub-resource. Without options no body is sent.
    pub fn build_lock_issue(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        opts: Option<&LockIssueOptions>,
    ) -> Result<HttpRequest, ApiError> {
        let path = format!("repos/{owner}/{repo}/issues/{number}/lock");
        match opts {
            Some(opts) => self.json_request(HttpMethod::Put, &path, opts),
            None => Ok(self.request(HttpMethod::Put, &path, None)),
        }
    }

    pub fn build_unlock_issue(&self, owner: &str, repo: &str, number: u64) -> HttpRequest {
        self.request(HttpMethod::Delete, &format!("repos/{owner}/{repo}/issues/{number}/lock"), None)
    }

    // -----------------------------------------------------------------------
    // Milestones
    // -----------------------------------------------------------------------

    pub fn build_list_milestones(
        &self,
        owner: &str,
        repo: &str,
        opts: Option<&MilestoneListOptions>,
    ) -> Result<HttpRequest, ApiError> {
        let path = add_options(format!("repos/{owner}/{repo}/milestones"), opts)?;
        Ok(self.request(HttpMethod::Get, &path, None))
    }

    pub fn build_get_milestone(&self, owner: &str, repo: &str, number: u64) -> HttpRequest {
        self.request(HttpMethod::Get, &format!("repos/{owner}/{repo}/milestones/{number}"), None)
    }

    pub fn build_create_milestone(
        &self,
        owner: &str,
        repo: &str,
        milestone: &Milestone,
    ) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Post, &format!("repos/{owner}/{repo}/milestones"), milestone)
    }

    pub fn build_edit_milestone(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        milestone: &Milestone,
    ) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Patch, &format!("repos/{owner}/{repo}/milestones/{number}"), milestone)
    }

    pub fn build_delete_milestone(&self, owner: &str, repo: &str, number: u64) -> HttpRequest {
        self.request(HttpMethod::Delete, &format!("repos/{owner}/{repo}/milestones/{number}"), None)
    }

    // -----------------------------------------------------------------------
    // Responses
    // -----------------------------------------------------------------------

    pub fn parse_issues(&self, response: HttpResponse) -> Result<Vec<Issue>, ApiError> {
        decode(&response)
    }

    pub fn parse_issue(&self, response: HttpResponse) -> Result<Issue, ApiError> {
        decode(&response)
    }

    pub fn parse_milestones(&self, response: HttpResponse) -> Result<Vec<Milestone>, ApiError> {
        decode(&response)
    }

    pub fn parse_milestone(&self, response: HttpResponse) -> Result<Milestone, ApiError> {
        decode(&response)
    }

    /// For endpoints answering 204 (lock, unlock, delete). Any body is ignored.
    pub fn parse_empty(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response)
    }

    // -----------------------------------------------------------------------
    // Request construction
    // -----------------------------------------------------------------------

    fn build_issue_listing<T: Serialize>(&self, path: String, opts: Option<&T>) -> Result<HttpRequest, ApiError> {
        let path = add_options(path, opts)?;
        let mut req = self.request(HttpMethod::Get, &path, None);
        set_accept(&mut req, MEDIA_TYPE_REACTIONS_PREVIEW);
        Ok(req)
    }

    fn json_request<B: Serialize + ?Sized>(
        &self,
        method: HttpMethod,
        path: &str,
        body: &B,
    ) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_string(body).map_err(|e| ApiError::SerializationError(e.to_string()))?;
        Ok(self.request(method, path, Some(body)))
    }

    fn request(&self, method: HttpMethod, path: &str, body: Option<String>) -> HttpRequest {
        let mut headers = vec![
            ("accept".to_string(), MEDIA_TYPE_V3.to_string()),
            ("user-agent".to_string(), self.user_agent.clone()),
        ];
        if body.is_some() {
            headers.push(("content-type".to_string(), "application/json".to_string()));
        }
        HttpRequest {
            method,
            path: format!("{}/{path}", self.base_url),
            headers,
            body,
        }
    }
}

fn set_accept(req: &mut HttpRequest, media_type: &str) {
    for (key, value) in req.headers.iter_mut() {
        if key.as_str() == "accept" {
            *value = media_type.to_string();
        }
    }
}

/// Map non-2xx statuses to `ApiError::HttpError`.
fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    Err(ApiError::from_response(response))
}

fn decode<T: DeserializeOwned>(response: &HttpResponse) -> Result<T, ApiError> {
    check_status(response)?;
    serde_json::from_str(&response.body).map_err(|e| ApiError::DeserializationError(e.to_string()))
}
