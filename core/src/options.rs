//! Query-parameter records for the list endpoints.
//!
//! Each non-empty field maps to one query parameter; list-typed fields are
//! comma-joined. Both pagination fragments are flattened into every record,
//! so offset (`page` as an integer) and cursor style parameters are always
//! accepted even if an endpoint only honors one of them.

use serde::{Deserialize, Serialize, Serializer};

use crate::error::ApiError;
use crate::types::Timestamp;

/// Which issues to list for the authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueFilter {
    Assigned,
    Created,
    Mentioned,
    Subscribed,
    Repos,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateFilter {
    Open,
    Closed,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSort {
    Created,
    Updated,
    Comments,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneSort {
    DueOn,
    Completeness,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Asc,
    Desc,
}

/// Offset pagination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_page: Option<u32>,
}

/// Cursor pagination. `page` is an opaque string here, unlike `ListOptions`.
///
/// When decoding a flattened record the integer `page` belongs to
/// `ListOptions`, so the cursor page is never read back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListCursorOptions {
    #[serde(skip_serializing_if = "Option::is_none", skip_deserializing)]
    pub page: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// Options for `/issues`, `/user/issues` and `/orgs/{org}/issues`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueListOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<IssueFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<StateFilter>,
    #[serde(default, serialize_with = "comma_separated", skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<IssueSort>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<Timestamp>,
    #[serde(flatten)]
    pub cursor: ListCursorOptions,
    #[serde(flatten)]
    pub list: ListOptions,
}

/// Options for `/repos/{owner}/{repo}/issues`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueListByRepoOptions {
    /// A milestone number, `none` for issues without one, or `*` for any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milestone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<StateFilter>,
    /// A login, `none` for unassigned issues, or `*` for any assignee.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mentioned: Option<String>,
    #[serde(default, serialize_with = "comma_separated", skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<IssueSort>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<Timestamp>,
    #[serde(flatten)]
    pub cursor: ListCursorOptions,
    #[serde(flatten)]
    pub list: ListOptions,
}

/// Options for `/repos/{owner}/{repo}/milestones`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneListOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<StateFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<MilestoneSort>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    #[serde(flatten)]
    pub list: ListOptions,
}

fn comma_separated<S: Serializer>(values: &[String], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&values.join(","))
}

/// Append the encoded `opts` to `path`. `None` or an all-empty record leaves
/// the path untouched.
pub(crate) fn add_options<T: Serialize>(path: String, opts: Option<&T>) -> Result<String, ApiError> {
    let Some(opts) = opts else {
        return Ok(path);
    };
    let query = serde_urlencoded::to_string(opts).map_err(|e| ApiError::QueryEncodingError(e.to_string()))?;
    if query.is_empty() {
        return Ok(path);
    }
    Ok(format!("{path}?{query}"))
}
