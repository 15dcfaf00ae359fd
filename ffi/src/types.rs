//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Each type mirrors a core type but uses C-compatible representations:
//! `*mut c_char` instead of `String`, raw pointers instead of `Vec`, and
//! tagged enums with explicit discriminants. Issues and milestones are
//! flattened to their most used scalar fields; the complete record is always
//! available as JSON in the `json` field. Conversion functions live here to
//! keep `lib.rs` focused on the `extern "C"` surface.

use std::ffi::{c_void, CString};
use std::os::raw::c_char;

use issues_core::{ApiError, HttpMethod, HttpRequest, Issue, Milestone};
use serde::Serialize;

/// Opaque handle to an `IssuesClient`. C callers receive a pointer to this
/// and pass it back into every FFI function.
pub struct FfiIssuesClient {
    pub(crate) inner: issues_core::IssuesClient,
}

/// Copy `s` into a heap C string. Interior NUL bytes yield an empty string.
pub(crate) fn c_string(s: impl Into<Vec<u8>>) -> *mut c_char {
    CString::new(s).unwrap_or_default().into_raw()
}

fn opt_c_string(s: Option<String>) -> *mut c_char {
    s.map_or(std::ptr::null_mut(), c_string)
}

/// Wire name of a unit enum (`"open"`, `"not_planned"`), or null.
fn enum_c_string<T: Serialize>(value: Option<T>) -> *mut c_char {
    let name = value
        .and_then(|v| serde_json::to_value(v).ok())
        .and_then(|v| v.as_str().map(str::to_owned));
    opt_c_string(name)
}

fn json_c_string<T: Serialize>(value: &T) -> *mut c_char {
    opt_c_string(serde_json::to_string(value).ok())
}

/// Hand a vector to C as a pointer/length pair. Empty vectors become null.
fn into_raw_parts<T>(items: Vec<T>) -> (*mut T, u32) {
    let len = items.len() as u32;
    if items.is_empty() {
        return (std::ptr::null_mut(), 0);
    }
    let mut items = items.into_boxed_slice();
    let ptr = items.as_mut_ptr();
    std::mem::forget(items);
    (ptr, len)
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// HTTP method as a C enum.
#[repr(C)]
pub enum FfiHttpMethod {
    Get = 0,
    Post = 1,
    Patch = 2,
    Put = 3,
    Delete = 4,
}

impl From<HttpMethod> for FfiHttpMethod {
    fn from(m: HttpMethod) -> Self {
        match m {
            HttpMethod::Get => FfiHttpMethod::Get,
            HttpMethod::Post => FfiHttpMethod::Post,
            HttpMethod::Patch => FfiHttpMethod::Patch,
            HttpMethod::Put => FfiHttpMethod::Put,
            HttpMethod::Delete => FfiHttpMethod::Delete,
        }
    }
}

/// A single HTTP header as a key-value pair of C strings.
#[repr(C)]
pub struct FfiHeader {
    pub key: *mut c_char,
    pub value: *mut c_char,
}

/// An HTTP request described as C-compatible plain data.
///
/// Built by `issues_build_*` functions. The C caller executes the request
/// and passes the response back through `issues_parse_*`. `path` is the
/// absolute URL including the query string.
#[repr(C)]
pub struct FfiHttpRequest {
    pub method: FfiHttpMethod,
    pub path: *mut c_char,
    pub headers: *mut FfiHeader,
    pub headers_len: u32,
    pub body: *mut c_char,
}

impl FfiHttpRequest {
    /// Convert a core `HttpRequest` into a heap-allocated `FfiHttpRequest`.
    pub(crate) fn from_core(req: HttpRequest) -> *mut Self {
        let headers: Vec<FfiHeader> = req
            .headers
            .into_iter()
            .map(|(k, v)| FfiHeader {
                key: c_string(k),
                value: c_string(v),
            })
            .collect();
        let (headers, headers_len) = into_raw_parts(headers);

        Box::into_raw(Box::new(FfiHttpRequest {
            method: req.method.into(),
            path: c_string(req.path),
            headers,
            headers_len,
            body: opt_c_string(req.body),
        }))
    }
}

// ---------------------------------------------------------------------------
// Response input (caller-provided, not heap-allocated by us)
// ---------------------------------------------------------------------------

/// An HTTP response described as C-compatible plain data.
///
/// The C caller constructs this on the stack after executing an HTTP request,
/// then passes a pointer to an `issues_parse_*` function. The FFI layer reads
/// but does not free these fields. A null `body` is read as empty.
#[repr(C)]
pub struct FfiHttpResponse {
    pub status: u16,
    pub body: *const c_char,
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Error codes returned in `FfiIssuesResult` and by `issues_last_error_code`.
///
/// `Serialization` and `QueryEncoding` come from the builders, `Http` and
/// `Deserialization` from the parsers. `Transport` mirrors
/// `ApiError::TransportError`; the host performs the IO, so this library
/// never reports it itself.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    Http = 1,
    Deserialization = 2,
    Serialization = 3,
    QueryEncoding = 4,
    Transport = 5,
    Panic = 6,
    NullArg = 7,
    /// An argument was not valid UTF-8 or not the expected JSON record.
    InvalidArg = 8,
}

impl From<&ApiError> for FfiErrorCode {
    fn from(err: &ApiError) -> Self {
        match err {
            ApiError::HttpError { .. } => FfiErrorCode::Http,
            ApiError::DeserializationError(_) => FfiErrorCode::Deserialization,
            ApiError::SerializationError(_) => FfiErrorCode::Serialization,
            ApiError::QueryEncodingError(_) => FfiErrorCode::QueryEncoding,
            ApiError::TransportError(_) => FfiErrorCode::Transport,
        }
    }
}

/// Why an `issues_build_*` call returned null. Stored per thread and read
/// back through `issues_last_error_code` / `issues_last_error_message`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BuildError {
    pub(crate) code: FfiErrorCode,
    pub(crate) message: String,
}

impl BuildError {
    pub(crate) fn null_arg(name: &str) -> Self {
        BuildError {
            code: FfiErrorCode::NullArg,
            message: format!("null argument: {name}"),
        }
    }

    pub(crate) fn invalid_arg(name: &str, reason: impl std::fmt::Display) -> Self {
        BuildError {
            code: FfiErrorCode::InvalidArg,
            message: format!("invalid argument {name}: {reason}"),
        }
    }

    pub(crate) fn panic(msg: &str) -> Self {
        BuildError {
            code: FfiErrorCode::Panic,
            message: msg.to_string(),
        }
    }
}

impl From<ApiError> for BuildError {
    fn from(err: ApiError) -> Self {
        BuildError {
            code: FfiErrorCode::from(&err),
            message: err.to_string(),
        }
    }
}

/// Tag that tells `issues_free_result` what `FfiIssuesResult::data` points to.
#[repr(C)]
#[derive(Debug, PartialEq, Eq)]
pub enum FfiDataTag {
    None = 0,
    Issue = 1,
    IssueList = 2,
    Milestone = 3,
    MilestoneList = 4,
}

/// An issue exposed to C. String fields are null when the API omitted them;
/// numeric fields are 0.
#[repr(C)]
pub struct FfiIssue {
    pub id: u64,
    pub number: u64,
    pub title: *mut c_char,
    pub body: *mut c_char,
    pub state: *mut c_char,
    pub state_reason: *mut c_char,
    pub html_url: *mut c_char,
    pub comments: u64,
    pub locked: bool,
    pub is_pull_request: bool,
    /// Number of the attached milestone, 0 when there is none.
    pub milestone_number: u64,
    /// The full issue record as JSON.
    pub json: *mut c_char,
}

impl FfiIssue {
    fn from_core(issue: Issue) -> Self {
        FfiIssue {
            json: json_c_string(&issue),
            is_pull_request: issue.is_pull_request(),
            id: issue.id.unwrap_or_default(),
            number: issue.number.unwrap_or_default(),
            title: opt_c_string(issue.title),
            body: opt_c_string(issue.body),
            state: enum_c_string(issue.state),
            state_reason: enum_c_string(issue.state_reason),
            html_url: opt_c_string(issue.html_url),
            comments: issue.comments.unwrap_or_default(),
            locked: issue.locked.unwrap_or_default(),
            milestone_number: issue.milestone.and_then(|m| m.number).unwrap_or_default(),
        }
    }
}

#[repr(C)]
pub struct FfiIssueList {
    pub items: *mut FfiIssue,
    pub len: u32,
}

/// A milestone exposed to C.
#[repr(C)]
pub struct FfiMilestone {
    pub id: u64,
    pub number: u64,
    pub title: *mut c_char,
    pub description: *mut c_char,
    pub state: *mut c_char,
    pub open_issues: u64,
    pub closed_issues: u64,
    /// RFC 3339 due date, null when unset.
    pub due_on: *mut c_char,
    /// The full milestone record as JSON.
    pub json: *mut c_char,
}

impl FfiMilestone {
    fn from_core(milestone: Milestone) -> Self {
        FfiMilestone {
            json: json_c_string(&milestone),
            id: milestone.id.unwrap_or_default(),
            number: milestone.number.unwrap_or_default(),
            title: opt_c_string(milestone.title),
            description: opt_c_string(milestone.description),
            state: enum_c_string(milestone.state),
            open_issues: milestone.open_issues.unwrap_or_default(),
            closed_issues: milestone.closed_issues.unwrap_or_default(),
            due_on: opt_c_string(milestone.due_on.map(|t| t.to_rfc3339())),
        }
    }
}

#[repr(C)]
pub struct FfiMilestoneList {
    pub items: *mut FfiMilestone,
    pub len: u32,
}

/// Result envelope for all parse operations.
///
/// On success `error_code` is `Ok`, `error_message` is null, and `data`
/// points to the parsed payload (tagged by `data_tag`).
/// On failure `error_code` describes the category, `error_message` is a
/// human-readable C string, and `data` is null. `http_status` is set for
/// `Http` errors; `error_body` then holds the raw response body.
#[repr(C)]
pub struct FfiIssuesResult {
    pub error_code: FfiErrorCode,
    pub error_message: *mut c_char,
    pub http_status: u16,
    pub error_body: *mut c_char,
    pub data_tag: FfiDataTag,
    pub data: *mut c_void,
}

impl FfiIssuesResult {
    fn ok(data_tag: FfiDataTag, data: *mut c_void) -> *mut Self {
        Box::into_raw(Box::new(FfiIssuesResult {
            error_code: FfiErrorCode::Ok,
            error_message: std::ptr::null_mut(),
            http_status: 0,
            error_body: std::ptr::null_mut(),
            data_tag,
            data,
        }))
    }

    fn failure(error_code: FfiErrorCode, message: String, http_status: u16, body: Option<String>) -> *mut Self {
        Box::into_raw(Box::new(FfiIssuesResult {
            error_code,
            error_message: c_string(message),
            http_status,
            error_body: opt_c_string(body),
            data_tag: FfiDataTag::None,
            data: std::ptr::null_mut(),
        }))
    }

    pub(crate) fn ok_issue(issue: Issue) -> *mut Self {
        let data = Box::into_raw(Box::new(FfiIssue::from_core(issue)));
        Self::ok(FfiDataTag::Issue, data as *mut c_void)
    }

    pub(crate) fn ok_issue_list(issues: Vec<Issue>) -> *mut Self {
        let (items, len) = into_raw_parts(issues.into_iter().map(FfiIssue::from_core).collect());
        let data = Box::into_raw(Box::new(FfiIssueList { items, len }));
        Self::ok(FfiDataTag::IssueList, data as *mut c_void)
    }

    pub(crate) fn ok_milestone(milestone: Milestone) -> *mut Self {
        let data = Box::into_raw(Box::new(FfiMilestone::from_core(milestone)));
        Self::ok(FfiDataTag::Milestone, data as *mut c_void)
    }

    pub(crate) fn ok_milestone_list(milestones: Vec<Milestone>) -> *mut Self {
        let (items, len) = into_raw_parts(milestones.into_iter().map(FfiMilestone::from_core).collect());
        let data = Box::into_raw(Box::new(FfiMilestoneList { items, len }));
        Self::ok(FfiDataTag::MilestoneList, data as *mut c_void)
    }

    /// Build a success result with no data payload (lock, unlock, delete).
    pub(crate) fn ok_empty() -> *mut Self {
        Self::ok(FfiDataTag::None, std::ptr::null_mut())
    }

    /// Build an error result from an `ApiError`.
    pub(crate) fn from_error(err: ApiError) -> *mut Self {
        let code = FfiErrorCode::from(&err);
        let msg = err.to_string();
        match err {
            ApiError::HttpError { status, body, .. } => Self::failure(code, msg, status, Some(body)),
            _ => Self::failure(code, msg, 0, None),
        }
    }

    pub(crate) fn null_arg(name: &str) -> *mut Self {
        Self::failure(FfiErrorCode::NullArg, format!("null argument: {name}"), 0, None)
    }

    /// Build an error result for a caught panic.
    pub(crate) fn panic(msg: &str) -> *mut Self {
        Self::failure(FfiErrorCode::Panic, msg.to_string(), 0, None)
    }
}
