//! Transport-driven facade over `IssuesClient`.
//!
//! Each method builds the request, hands it to the injected `Transport`,
//! and parses the result. Nothing is retried or cached; every call is an
//! independent round-trip, so a service can be shared freely across threads
//! when its transport can.

use tracing::{debug, warn};

use crate::client::IssuesClient;
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse, Response, Transport};
use crate::options::{IssueListByRepoOptions, IssueListOptions, MilestoneListOptions};
use crate::types::{Issue, IssueRequest, LockIssueOptions, Milestone};

#[derive(Debug, Clone)]
pub struct IssuesService<T> {
    client: IssuesClient,
    transport: T,
}

impl<T: Transport> IssuesService<T> {
    pub fn new(client: IssuesClient, transport: T) -> Self {
        Self { client, transport }
    }

    pub fn client(&self) -> &IssuesClient {
        &self.client
    }

    pub fn list(&self, all: bool, opts: Option<&IssueListOptions>) -> Result<(Vec<Issue>, Response), ApiError> {
        let req = self.client.build_list_issues(all, opts)?;
        self.call(req, |c, r| c.parse_issues(r))
    }

    pub fn list_by_org(&self, org: &str, opts: Option<&IssueListOptions>) -> Result<(Vec<Issue>, Response), ApiError> {
        let req = self.client.build_list_issues_by_org(org, opts)?;
        self.call(req, |c, r| c.parse_issues(r))
    }

    pub fn list_by_repo(
        &self,
        owner: &str,
        repo: &str,
        opts: Option<&IssueListByRepoOptions>,
    ) -> Result<(Vec<Issue>, Response), ApiError> {
        let req = self.client.build_list_issues_by_repo(owner, repo, opts)?;
        self.call(req, |c, r| c.parse_issues(r))
    }

    pub fn get(&self, owner: &str, repo: &str, number: u64) -> Result<(Issue, Response), ApiError> {
        let req = self.client.build_get_issue(owner, repo, number);
        self.call(req, |c, r| c.parse_issue(r))
    }

    pub fn create(&self, owner: &str, repo: &str, issue: &IssueRequest) -> Result<(Issue, Response), ApiError> {
        let req = self.client.build_create_issue(owner, repo, issue)?;
        self.call(req, |c, r| c.parse_issue(r))
    }

    pub fn edit(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        issue: &IssueRequest,
    ) -> Result<(Issue, Response), ApiError> {
        let req = self.client.build_edit_issue(owner, repo, number, issue)?;
        self.call(req, |c, r| c.parse_issue(r))
    }

    pub fn remove_milestone(&self, owner: &str, repo: &str, number: u64) -> Result<(Issue, Response), ApiError> {
        let req = self.client.build_remove_milestone(owner, repo, number)?;
        self.call(req, |c, r| c.parse_issue(r))
    }

    pub fn lock(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        opts: Option<&LockIssueOptions>,
    ) -> Result<Response, ApiError> {
        let req = self.client.build_lock_issue(owner, repo, number, opts)?;
        self.call(req, |c, r| c.parse_empty(r)).map(|((), resp)| resp)
    }

    pub fn unlock(&self, owner: &str, repo: &str, number: u64) -> Result<Response, ApiError> {
        let req = self.client.build_unlock_issue(owner, repo, number);
        self.call(req, |c, r| c.parse_empty(r)).map(|((), resp)| resp)
    }

    pub fn list_milestones(
        &self,
        owner: &str,
        repo: &str,
        opts: Option<&MilestoneListOptions>,
    ) -> Result<(Vec<Milestone>, Response), ApiError> {
        let req = self.client.build_list_milestones(owner, repo, opts)?;
        self.call(req, |c, r| c.parse_milestones(r))
    }

    pub fn get_milestone(&self, owner: &str, repo: &str, number: u64) -> Result<(Milestone, Response), ApiError> {
        let req = self.client.build_get_milestone(owner, repo, number);
        self.call(req, |c, r| c.parse_milestone(r))
    }

    pub fn create_milestone(
        &self,
        owner: &str,
        repo: &str,
        milestone: &Milestone,
    ) -> Result<(Milestone, Response), ApiError> {
        let req = self.client.build_create_milestone(owner, repo, milestone)?;
        self.call(req, |c, r| c.parse_milestone(r))
    }

    pub fn edit_milestone(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        milestone: &Milestone,
    ) -> Result<(Milestone, Response), ApiError> {
        let req = self.client.build_edit_milestone(owner, repo, number, milestone)?;
        self.call(req, |c, r| c.parse_milestone(r))
    }

    pub fn delete_milestone(&self, owner: &str, repo: &str, number: u64) -> Result<Response, ApiError> {
        let req = self.client.build_delete_milestone(owner, repo, number);
        self.call(req, |c, r| c.parse_empty(r)).map(|((), resp)| resp)
    }

    fn call<R>(
        &self,
        req: HttpRequest,
        parse: impl FnOnce(&IssuesClient, HttpResponse) -> Result<R, ApiError>,
    ) -> Result<(R, Response), ApiError> {
        debug!(method = %req.method, path = %req.path, "sending request");
        let resp = self
            .transport
            .execute(&req)
            .map_err(|e| ApiError::TransportError(Box::new(e)))?;
        debug!(status = resp.status, "received response");

        let meta = Response::from(&resp);
        match parse(&self.client, resp) {
            Ok(value) => Ok((value, meta)),
            Err(err) => {
                warn!(method = %req.method, path = %req.path, error = %err, "request failed");
                Err(err)
            }
        }
    }
}
