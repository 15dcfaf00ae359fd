//! C-ABI wrapper around `issues-core`.
//!
//! # Overview
//! Exposes every issue and milestone operation through `extern "C"`
//! functions so any language with a C FFI can build and parse HTTP
//! requests/responses without linking to serde or a Rust HTTP stack.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - `issues_build_*` mirrors the core builders 1:1. Request bodies and
//!   option records are passed as JSON C strings; null means "none".
//!   Builders return null on failure; `issues_last_error_code` and
//!   `issues_last_error_message` then report why, per calling thread.
//! - One `issues_parse_*` per response shape. A single `FfiIssuesResult`
//!   envelope with `FfiDataTag` + `void* data` conveys success payloads and
//!   errors uniformly.
//! - The C caller owns all returned pointers and must call the matching
//!   `issues_free_*` function to release them.

pub mod types;

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::panic::{catch_unwind, UnwindSafe};

use issues_core::{HttpRequest, HttpResponse, IssueRequest, IssuesClient, LockIssueOptions, Milestone};
use serde::de::DeserializeOwned;

use types::*;

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

thread_local! {
    static LAST_ERROR: RefCell<Option<BuildError>> = const { RefCell::new(None) };
}

fn set_last_error(err: Option<BuildError>) {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = err);
}

fn client_ref<'a>(client: *const FfiIssuesClient) -> Result<&'a IssuesClient, BuildError> {
    if client.is_null() {
        return Err(BuildError::null_arg("client"));
    }
    Ok(&unsafe { &*client }.inner)
}

/// Borrow a required string argument.
fn arg_str<'a>(ptr: *const c_char, name: &str) -> Result<&'a str, BuildError> {
    if ptr.is_null() {
        return Err(BuildError::null_arg(name));
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|e| BuildError::invalid_arg(name, e))
}

/// Decode an optional JSON argument. A null pointer is `Ok(None)`.
fn arg_json<T: DeserializeOwned>(ptr: *const c_char, name: &str) -> Result<Option<T>, BuildError> {
    if ptr.is_null() {
        return Ok(None);
    }
    arg_json_required(ptr, name).map(Some)
}

/// Decode a required JSON argument.
fn arg_json_required<T: DeserializeOwned>(ptr: *const c_char, name: &str) -> Result<T, BuildError> {
    serde_json::from_str(arg_str(ptr, name)?).map_err(|e| BuildError::invalid_arg(name, e))
}

/// Run a builder, recording the failure (if any) as this thread's last error.
fn build(name: &str, f: impl FnOnce() -> Result<HttpRequest, BuildError> + UnwindSafe) -> *mut FfiHttpRequest {
    let outcome = catch_unwind(f).unwrap_or_else(|_| Err(BuildError::panic(&format!("panic in {name}"))));
    match outcome {
        Ok(req) => {
            set_last_error(None);
            FfiHttpRequest::from_core(req)
        }
        Err(err) => {
            set_last_error(Some(err));
            std::ptr::null_mut()
        }
    }
}

// ---------------------------------------------------------------------------
// Client lifecycle
// ---------------------------------------------------------------------------

/// Create a new `IssuesClient` bound to `base_url`.
///
/// Returns null if `base_url` is null or if an internal panic occurs.
/// The caller must free the returned pointer with `issues_client_free`.
#[unsafe(no_mangle)]
pub extern "C" fn issues_client_new(base_url: *const c_char) -> *mut FfiIssuesClient {
    catch_unwind(|| {
        let Ok(url) = arg_str(base_url, "base_url") else {
            return std::ptr::null_mut();
        };
        let client = IssuesClient::new(url);
        Box::into_raw(Box::new(FfiIssuesClient { inner: client }))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free a client created by `issues_client_new`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn issues_client_free(client: *mut FfiIssuesClient) {
    if !client.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { Box::from_raw(client) });
        });
    }
}

// ---------------------------------------------------------------------------
// Build request functions: issues
// ---------------------------------------------------------------------------

/// List issues across all visible repositories (`all`) or only owned and
/// member repositories. `options_json` is an `IssueListOptions` record.
///
/// The caller must free the returned pointer with `issues_free_request`.
#[unsafe(no_mangle)]
pub extern "C" fn issues_build_list_issues(
    client: *const FfiIssuesClient,
    all: bool,
    options_json: *const c_char,
) -> *mut FfiHttpRequest {
    build("issues_build_list_issues", || {
        let opts = arg_json(options_json, "options_json")?;
        Ok(client_ref(client)?.build_list_issues(all, opts.as_ref())?)
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn issues_build_list_issues_by_org(
    client: *const FfiIssuesClient,
    org: *const c_char,
    options_json: *const c_char,
) -> *mut FfiHttpRequest {
    build("issues_build_list_issues_by_org", || {
        let opts = arg_json(options_json, "options_json")?;
        Ok(client_ref(client)?.build_list_issues_by_org(arg_str(org, "org")?, opts.as_ref())?)
    })
}

/// `options_json` is an `IssueListByRepoOptions` record, e.g.
/// `{"state":"all","labels":["bug"]}`.
#[unsafe(no_mangle)]
pub extern "C" fn issues_build_list_issues_by_repo(
    client: *const FfiIssuesClient,
    owner: *const c_char,
    repo: *const c_char,
    options_json: *const c_char,
) -> *mut FfiHttpRequest {
    build("issues_build_list_issues_by_repo", || {
        let opts = arg_json(options_json, "options_json")?;
        Ok(client_ref(client)?.build_list_issues_by_repo(
            arg_str(owner, "owner")?,
            arg_str(repo, "repo")?,
            opts.as_ref(),
        )?)
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn issues_build_get_issue(
    client: *const FfiIssuesClient,
    owner: *const c_char,
    repo: *const c_char,
    number: u64,
) -> *mut FfiHttpRequest {
    build("issues_build_get_issue", || {
        Ok(client_ref(client)?.build_get_issue(arg_str(owner, "owner")?, arg_str(repo, "repo")?, number))
    })
}

/// `issue_json` is a required `IssueRequest` record.
#[unsafe(no_mangle)]
pub extern "C" fn issues_build_create_issue(
    client: *const FfiIssuesClient,
    owner: *const c_char,
    repo: *const c_char,
    issue_json: *const c_char,
) -> *mut FfiHttpRequest {
    build("issues_build_create_issue", || {
        let issue: IssueRequest = arg_json_required(issue_json, "issue_json")?;
        Ok(client_ref(client)?.build_create_issue(arg_str(owner, "owner")?, arg_str(repo, "repo")?, &issue)?)
    })
}

/// `issue_json` is a required `IssueRequest` record. A `"milestone": null`
/// in it is treated as absent; use `issues_build_remove_milestone` to detach.
#[unsafe(no_mangle)]
pub extern "C" fn issues_build_edit_issue(
    client: *const FfiIssuesClient,
    owner: *const c_char,
    repo: *const c_char,
    number: u64,
    issue_json: *const c_char,
) -> *mut FfiHttpRequest {
    build("issues_build_edit_issue", || {
        let issue: IssueRequest = arg_json_required(issue_json, "issue_json")?;
        Ok(client_ref(client)?.build_edit_issue(
            arg_str(owner, "owner")?,
            arg_str(repo, "repo")?,
            number,
            &issue,
        )?)
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn issues_build_remove_milestone(
    client: *const FfiIssuesClient,
    owner: *const c_char,
    repo: *const c_char,
    number: u64,
) -> *mut FfiHttpRequest {
    build("issues_build_remove_milestone", || {
        Ok(client_ref(client)?.build_remove_milestone(arg_str(owner, "owner")?, arg_str(repo, "repo")?, number)?)
    })
}

/// `options_json` is an optional `LockIssueOptions` record; null sends no body.
#[unsafe(no_mangle)]
pub extern "C" fn issues_build_lock_issue(
    client: *const FfiIssuesClient,
    owner: *const c_char,
    repo: *const c_char,
    number: u64,
    options_json: *const c_char,
) -> *mut FfiHttpRequest {
    build("issues_build_lock_issue", || {
        let opts: Option<LockIssueOptions> = arg_json(options_json, "options_json")?;
        Ok(client_ref(client)?.build_lock_issue(
            arg_str(owner, "owner")?,
            arg_str(repo, "repo")?,
            number,
            opts.as_ref(),
        )?)
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn issues_build_unlock_issue(
    client: *const FfiIssuesClient,
    owner: *const c_char,
    repo: *const c_char,
    number: u64,
) -> *mut FfiHttpRequest {
    build("issues_build_unlock_issue", || {
        Ok(client_ref(client)?.build_unlock_issue(arg_str(owner, "owner")?, arg_str(repo, "repo")?, number))
    })
}

// ---------------------------------------------------------------------------
// Build request functions: milestones
// ---------------------------------------------------------------------------

#[unsafe(no_mangle)]
pub extern "C" fn issues_build_list_milestones(
    client: *const FfiIssuesClient,
    owner: *const c_char,
    repo: *const c_char,
    options_json: *const c_char,
) -> *mut FfiHttpRequest {
    build("issues_build_list_milestones", || {
        let opts = arg_json(options_json, "options_json")?;
        Ok(client_ref(client)?.build_list_milestones(arg_str(owner, "owner")?, arg_str(repo, "repo")?, opts.as_ref())?)
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn issues_build_get_milestone(
    client: *const FfiIssuesClient,
    owner: *const c_char,
    repo: *const c_char,
    number: u64,
) -> *mut FfiHttpRequest {
    build("issues_build_get_milestone", || {
        Ok(client_ref(client)?.build_get_milestone(arg_str(owner, "owner")?, arg_str(repo, "repo")?, number))
    })
}

/// `milestone_json` is a required `Milestone` record; only the writable
/// fields (`title`, `state`, `description`, `due_on`) are meaningful.
#[unsafe(no_mangle)]
pub extern "C" fn issues_build_create_milestone(
    client: *const FfiIssuesClient,
    owner: *const c_char,
    repo: *const c_char,
    milestone_json: *const c_char,
) -> *mut FfiHttpRequest {
    build("issues_build_create_milestone", || {
        let milestone: Milestone = arg_json_required(milestone_json, "milestone_json")?;
        Ok(client_ref(client)?.build_create_milestone(
            arg_str(owner, "owner")?,
            arg_str(repo, "repo")?,
            &milestone,
        )?)
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn issues_build_edit_milestone(
    client: *const FfiIssuesClient,
    owner: *const c_char,
    repo: *const c_char,
    number: u64,
    milestone_json: *const c_char,
) -> *mut FfiHttpRequest {
    build("issues_build_edit_milestone", || {
        let milestone: Milestone = arg_json_required(milestone_json, "milestone_json")?;
        Ok(client_ref(client)?.build_edit_milestone(
            arg_str(owner, "owner")?,
            arg_str(repo, "repo")?,
            number,
            &milestone,
        )?)
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn issues_build_delete_milestone(
    client: *const FfiIssuesClient,
    owner: *const c_char,
    repo: *const c_char,
    number: u64,
) -> *mut FfiHttpRequest {
    build("issues_build_delete_milestone", || {
        Ok(client_ref(client)?.build_delete_milestone(arg_str(owner, "owner")?, arg_str(repo, "repo")?, number))
    })
}

// ---------------------------------------------------------------------------
// Parse response functions
// ---------------------------------------------------------------------------

/// Convert an `FfiHttpResponse` to a core `HttpResponse`. A null body is
/// read as empty.
fn ffi_response_to_core(resp: &FfiHttpResponse) -> HttpResponse {
    let body = if resp.body.is_null() {
        String::new()
    } else {
        unsafe { CStr::from_ptr(resp.body) }.to_string_lossy().into_owned()
    };
    HttpResponse {
        status: resp.status,
        headers: Vec::new(),
        body,
    }
}

/// Shared null checks and panic guard for the `issues_parse_*` functions.
fn parse(
    name: &str,
    client: *const FfiIssuesClient,
    response: *const FfiHttpResponse,
    f: impl FnOnce(&IssuesClient, HttpResponse) -> *mut FfiIssuesResult + UnwindSafe,
) -> *mut FfiIssuesResult {
    catch_unwind(|| {
        let Ok(client) = client_ref(client) else {
            return FfiIssuesResult::null_arg("client");
        };
        if response.is_null() {
            return FfiIssuesResult::null_arg("response");
        }
        let resp = unsafe { &*response };
        f(client, ffi_response_to_core(resp))
    })
    .unwrap_or_else(|_| FfiIssuesResult::panic(&format!("panic in {name}")))
}

/// Parse a single-issue response (get, create, edit, remove milestone).
///
/// Returns a result with `data_tag = Issue` on success.
#[unsafe(no_mangle)]
pub extern "C" fn issues_parse_issue(
    client: *const FfiIssuesClient,
    response: *const FfiHttpResponse,
) -> *mut FfiIssuesResult {
    parse("issues_parse_issue", client, response, |c, resp| match c.parse_issue(resp) {
        Ok(issue) => FfiIssuesResult::ok_issue(issue),
        Err(e) => FfiIssuesResult::from_error(e),
    })
}

/// Parse any of the issue list responses.
///
/// Returns a result with `data_tag = IssueList` on success.
#[unsafe(no_mangle)]
pub extern "C" fn issues_parse_issue_list(
    client: *const FfiIssuesClient,
    response: *const FfiHttpResponse,
) -> *mut FfiIssuesResult {
    parse("issues_parse_issue_list", client, response, |c, resp| match c.parse_issues(resp) {
        Ok(issues) => FfiIssuesResult::ok_issue_list(issues),
        Err(e) => FfiIssuesResult::from_error(e),
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn issues_parse_milestone(
    client: *const FfiIssuesClient,
    response: *const FfiHttpResponse,
) -> *mut FfiIssuesResult {
    parse("issues_parse_milestone", client, response, |c, resp| match c.parse_milestone(resp) {
        Ok(milestone) => FfiIssuesResult::ok_milestone(milestone),
        Err(e) => FfiIssuesResult::from_error(e),
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn issues_parse_milestone_list(
    client: *const FfiIssuesClient,
    response: *const FfiHttpResponse,
) -> *mut FfiIssuesResult {
    parse("issues_parse_milestone_list", client, response, |c, resp| {
        match c.parse_milestones(resp) {
            Ok(milestones) => FfiIssuesResult::ok_milestone_list(milestones),
            Err(e) => FfiIssuesResult::from_error(e),
        }
    })
}

/// Parse a bodiless response (lock, unlock, delete milestone).
///
/// Returns a result with `data_tag = None` on success.
#[unsafe(no_mangle)]
pub extern "C" fn issues_parse_empty(
    client: *const FfiIssuesClient,
    response: *const FfiHttpResponse,
) -> *mut FfiIssuesResult {
    parse("issues_parse_empty", client, response, |c, resp| match c.parse_empty(resp) {
        Ok(()) => FfiIssuesResult::ok_empty(),
        Err(e) => FfiIssuesResult::from_error(e),
    })
}

// ---------------------------------------------------------------------------
// Last error
// ---------------------------------------------------------------------------

/// Code of the last failed `issues_build_*` call on this thread, or `Ok` if
/// the most recent build succeeded.
#[unsafe(no_mangle)]
pub extern "C" fn issues_last_error_code() -> FfiErrorCode {
    catch_unwind(|| LAST_ERROR.with(|slot| slot.borrow().as_ref().map_or(FfiErrorCode::Ok, |e| e.code)))
        .unwrap_or(FfiErrorCode::Panic)
}

/// Message of the last failed `issues_build_*` call on this thread, or null.
///
/// The caller must free the returned string with `issues_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn issues_last_error_message() -> *mut c_char {
    catch_unwind(|| {
        LAST_ERROR.with(|slot| {
            slot.borrow()
                .as_ref()
                .map_or(std::ptr::null_mut(), |e| c_string(e.message.as_str()))
        })
    })
    .unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

fn free_c_string(s: *mut c_char) {
    if !s.is_null() {
        drop(unsafe { CString::from_raw(s) });
    }
}

/// Free an `FfiHttpRequest` returned by any `issues_build_*` function.
/// Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn issues_free_request(req: *mut FfiHttpRequest) {
    if req.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let req = unsafe { Box::from_raw(req) };
        free_c_string(req.path);
        free_c_string(req.body);
        if !req.headers.is_null() && req.headers_len > 0 {
            let len = req.headers_len as usize;
            let headers = unsafe { Vec::from_raw_parts(req.headers, len, len) };
            for h in headers {
                free_c_string(h.key);
                free_c_string(h.value);
            }
        }
    });
}

/// Free an `FfiIssuesResult` returned by any `issues_parse_*` function.
/// Safe to call with null. Uses `data_tag` to determine what `data` points to.
#[unsafe(no_mangle)]
pub extern "C" fn issues_free_result(result: *mut FfiIssuesResult) {
    if result.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let result = unsafe { Box::from_raw(result) };
        free_c_string(result.error_message);
        free_c_string(result.error_body);
        if result.data.is_null() {
            return;
        }
        match result.data_tag {
            FfiDataTag::Issue => {
                let issue = unsafe { Box::from_raw(result.data as *mut FfiIssue) };
                free_ffi_issue_fields(&issue);
            }
            FfiDataTag::IssueList => {
                let list = unsafe { Box::from_raw(result.data as *mut FfiIssueList) };
                for item in &take_items(list.items, list.len) {
                    free_ffi_issue_fields(item);
                }
            }
            FfiDataTag::Milestone => {
                let milestone = unsafe { Box::from_raw(result.data as *mut FfiMilestone) };
                free_ffi_milestone_fields(&milestone);
            }
            FfiDataTag::MilestoneList => {
                let list = unsafe { Box::from_raw(result.data as *mut FfiMilestoneList) };
                for item in &take_items(list.items, list.len) {
                    free_ffi_milestone_fields(item);
                }
            }
            FfiDataTag::None => {}
        }
    });
}

/// Reclaim an item array handed out by the result constructors.
fn take_items<T>(items: *mut T, len: u32) -> Vec<T> {
    if items.is_null() || len == 0 {
        return Vec::new();
    }
    unsafe { Vec::from_raw_parts(items, len as usize, len as usize) }
}

/// Free the C-string fields of an `FfiIssue` (but not the struct itself).
fn free_ffi_issue_fields(issue: &FfiIssue) {
    for s in [issue.title, issue.body, issue.state, issue.state_reason, issue.html_url, issue.json] {
        free_c_string(s);
    }
}

fn free_ffi_milestone_fields(milestone: &FfiMilestone) {
    for s in [milestone.title, milestone.description, milestone.state, milestone.due_on, milestone.json] {
        free_c_string(s);
    }
}

/// Free a C string allocated by this library. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn issues_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = catch_unwind(|| free_c_string(s));
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    const BASE: &str = "http://localhost:3000";

    fn new_client() -> *mut FfiIssuesClient {
        let url = CString::new(BASE).unwrap();
        issues_client_new(url.as_ptr())
    }

    fn c(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    fn read(ptr: *const c_char) -> &'static str {
        unsafe { CStr::from_ptr(ptr) }.to_str().unwrap()
    }

    fn header(req: &FfiHttpRequest, key: &str) -> Option<&'static str> {
        let headers = unsafe { std::slice::from_raw_parts(req.headers, req.headers_len as usize) };
        headers.iter().find(|h| read(h.key) == key).map(|h| read(h.value))
    }

    fn respond(status: u16, body: &CString) -> FfiHttpResponse {
        FfiHttpResponse {
            status,
            body: body.as_ptr(),
        }
    }

    #[test]
    fn client_new_and_free() {
        let client = new_client();
        assert!(!client.is_null());
        issues_client_free(client);
    }

    #[test]
    fn client_new_null_returns_null() {
        assert!(issues_client_new(std::ptr::null()).is_null());
    }

    #[test]
    fn client_free_null_is_safe() {
        issues_client_free(std::ptr::null_mut());
    }

    #[test]
    fn build_list_by_repo_encodes_options() {
        let client = new_client();
        let (owner, repo) = (c("octo"), c("hello"));
        let opts = c(r#"{"state":"all","labels":["bug","p1"],"per_page":5}"#);
        let req = issues_build_list_issues_by_repo(client, owner.as_ptr(), repo.as_ptr(), opts.as_ptr());
        assert!(!req.is_null());

        let req_ref = unsafe { &*req };
        assert!(matches!(req_ref.method, FfiHttpMethod::Get));
        assert_eq!(
            read(req_ref.path),
            "http://localhost:3000/repos/octo/hello/issues?state=all&labels=bug%2Cp1&per_page=5"
        );
        assert_eq!(
            header(req_ref, "accept"),
            Some("application/vnd.github.squirrel-girl-preview+json")
        );
        assert!(req_ref.body.is_null());

        issues_free_request(req);
        issues_client_free(client);
    }

    #[test]
    fn build_list_without_options_has_bare_path() {
        let client = new_client();
        let req = issues_build_list_issues(client, false, std::ptr::null());
        let req_ref = unsafe { &*req };
        assert_eq!(read(req_ref.path), "http://localhost:3000/user/issues");
        issues_free_request(req);
        issues_client_free(client);
    }

    fn last_error_message() -> Option<String> {
        let msg = issues_last_error_message();
        if msg.is_null() {
            return None;
        }
        let text = read(msg).to_string();
        issues_free_string(msg);
        Some(text)
    }

    #[test]
    fn build_with_malformed_options_reports_invalid_arg() {
        let client = new_client();
        let org = c("acme");
        let opts = c(r#"{"state":"sideways"}"#);
        assert!(issues_build_list_issues_by_org(client, org.as_ptr(), opts.as_ptr()).is_null());
        assert_eq!(issues_last_error_code(), FfiErrorCode::InvalidArg);
        let msg = last_error_message().unwrap();
        assert!(msg.starts_with("invalid argument options_json: "), "{msg}");
        issues_client_free(client);
    }

    #[test]
    fn build_null_client_reports_null_arg() {
        let (owner, repo) = (c("o"), c("r"));
        assert!(issues_build_get_issue(std::ptr::null(), owner.as_ptr(), repo.as_ptr(), 1).is_null());
        assert_eq!(issues_last_error_code(), FfiErrorCode::NullArg);
        assert_eq!(last_error_message().as_deref(), Some("null argument: client"));
    }

    #[test]
    fn build_null_owner_names_the_argument() {
        let client = new_client();
        let repo = c("r");
        assert!(issues_build_unlock_issue(client, std::ptr::null(), repo.as_ptr(), 1).is_null());
        assert_eq!(issues_last_error_code(), FfiErrorCode::NullArg);
        assert_eq!(last_error_message().as_deref(), Some("null argument: owner"));
        issues_client_free(client);
    }

    #[test]
    fn build_non_utf8_repo_reports_invalid_arg() {
        let client = new_client();
        let owner = c("o");
        let repo = CString::new(vec![0xff, 0xfe]).unwrap();
        assert!(issues_build_get_milestone(client, owner.as_ptr(), repo.as_ptr(), 1).is_null());
        assert_eq!(issues_last_error_code(), FfiErrorCode::InvalidArg);
        assert!(last_error_message().unwrap().starts_with("invalid argument repo: "));
        issues_client_free(client);
    }

    #[test]
    fn successful_build_clears_last_error() {
        let client = new_client();
        let (owner, repo) = (c("o"), c("r"));
        assert!(issues_build_create_issue(client, owner.as_ptr(), repo.as_ptr(), std::ptr::null()).is_null());
        assert_eq!(issues_last_error_code(), FfiErrorCode::NullArg);

        let req = issues_build_get_issue(client, owner.as_ptr(), repo.as_ptr(), 1);
        assert!(!req.is_null());
        assert_eq!(issues_last_error_code(), FfiErrorCode::Ok);
        assert_eq!(last_error_message(), None);

        issues_free_request(req);
        issues_client_free(client);
    }

    #[test]
    fn last_error_is_per_thread() {
        let client = new_client();
        let org = c("acme");
        let opts = c("{");
        assert!(issues_build_list_issues_by_org(client, org.as_ptr(), opts.as_ptr()).is_null());
        assert_eq!(issues_last_error_code(), FfiErrorCode::InvalidArg);

        let other = std::thread::spawn(|| issues_last_error_code()).join().unwrap();
        assert_eq!(other, FfiErrorCode::Ok);
        issues_client_free(client);
    }

    #[test]
    fn build_create_issue_produces_post_with_json_body() {
        let client = new_client();
        let (owner, repo) = (c("o"), c("r"));
        let issue = c(r#"{"title":"Crash on start","labels":["bug"]}"#);
        let req = issues_build_create_issue(client, owner.as_ptr(), repo.as_ptr(), issue.as_ptr());
        assert!(!req.is_null());

        let req_ref = unsafe { &*req };
        assert!(matches!(req_ref.method, FfiHttpMethod::Post));
        assert_eq!(read(req_ref.path), "http://localhost:3000/repos/o/r/issues");
        assert_eq!(header(req_ref, "content-type"), Some("application/json"));
        assert_eq!(header(req_ref, "accept"), Some("application/vnd.github.v3+json"));

        let body: serde_json::Value = serde_json::from_str(read(req_ref.body)).unwrap();
        assert_eq!(body, serde_json::json!({"title": "Crash on start", "labels": ["bug"]}));

        issues_free_request(req);
        issues_client_free(client);
    }

    #[test]
    fn build_create_issue_requires_body() {
        let client = new_client();
        let (owner, repo) = (c("o"), c("r"));
        assert!(issues_build_create_issue(client, owner.as_ptr(), repo.as_ptr(), std::ptr::null()).is_null());
        assert_eq!(last_error_message().as_deref(), Some("null argument: issue_json"));
        issues_client_free(client);
    }

    #[test]
    fn build_edit_issue_uses_patch() {
        let client = new_client();
        let (owner, repo) = (c("o"), c("r"));
        let issue = c(r#"{"state":"closed","state_reason":"completed"}"#);
        let req = issues_build_edit_issue(client, owner.as_ptr(), repo.as_ptr(), 7, issue.as_ptr());
        let req_ref = unsafe { &*req };
        assert!(matches!(req_ref.method, FfiHttpMethod::Patch));
        assert_eq!(read(req_ref.path), "http://localhost:3000/repos/o/r/issues/7");
        assert_eq!(read(req_ref.body), r#"{"state":"closed","state_reason":"completed"}"#);
        issues_free_request(req);
        issues_client_free(client);
    }

    #[test]
    fn build_remove_milestone_sends_explicit_null() {
        let client = new_client();
        let (owner, repo) = (c("o"), c("r"));
        let req = issues_build_remove_milestone(client, owner.as_ptr(), repo.as_ptr(), 3);
        let req_ref = unsafe { &*req };
        assert!(matches!(req_ref.method, FfiHttpMethod::Patch));
        assert_eq!(read(req_ref.body), r#"{"milestone":null}"#);
        issues_free_request(req);
        issues_client_free(client);
    }

    #[test]
    fn build_lock_issue_with_and_without_reason() {
        let client = new_client();
        let (owner, repo) = (c("o"), c("r"));

        let bare = issues_build_lock_issue(client, owner.as_ptr(), repo.as_ptr(), 2, std::ptr::null());
        let bare_ref = unsafe { &*bare };
        assert!(matches!(bare_ref.method, FfiHttpMethod::Put));
        assert!(bare_ref.body.is_null());
        assert_eq!(header(bare_ref, "content-type"), None);

        let opts = c(r#"{"lock_reason":"off-topic"}"#);
        let with_reason = issues_build_lock_issue(client, owner.as_ptr(), repo.as_ptr(), 2, opts.as_ptr());
        assert_eq!(read(unsafe { &*with_reason }.body), r#"{"lock_reason":"off-topic"}"#);

        issues_free_request(bare);
        issues_free_request(with_reason);
        issues_client_free(client);
    }

    #[test]
    fn build_unlock_and_delete_milestone_use_delete() {
        let client = new_client();
        let (owner, repo) = (c("o"), c("r"));
        let unlock = issues_build_unlock_issue(client, owner.as_ptr(), repo.as_ptr(), 4);
        let delete = issues_build_delete_milestone(client, owner.as_ptr(), repo.as_ptr(), 1);
        assert!(matches!(unsafe { &*unlock }.method, FfiHttpMethod::Delete));
        assert_eq!(read(unsafe { &*unlock }.path), "http://localhost:3000/repos/o/r/issues/4/lock");
        assert!(matches!(unsafe { &*delete }.method, FfiHttpMethod::Delete));
        assert_eq!(read(unsafe { &*delete }.path), "http://localhost:3000/repos/o/r/milestones/1");
        issues_free_request(unlock);
        issues_free_request(delete);
        issues_client_free(client);
    }

    #[test]
    fn build_milestone_requests() {
        let client = new_client();
        let (owner, repo) = (c("o"), c("r"));
        let opts = c(r#"{"state":"closed","sort":"completeness"}"#);
        let list = issues_build_list_milestones(client, owner.as_ptr(), repo.as_ptr(), opts.as_ptr());
        assert_eq!(
            read(unsafe { &*list }.path),
            "http://localhost:3000/repos/o/r/milestones?state=closed&sort=completeness"
        );

        let get = issues_build_get_milestone(client, owner.as_ptr(), repo.as_ptr(), 2);
        assert_eq!(read(unsafe { &*get }.path), "http://localhost:3000/repos/o/r/milestones/2");

        let body = c(r#"{"title":"v1.0","due_on":"2025-06-01T00:00:00Z"}"#);
        let create = issues_build_create_milestone(client, owner.as_ptr(), repo.as_ptr(), body.as_ptr());
        assert!(matches!(unsafe { &*create }.method, FfiHttpMethod::Post));
        let sent: serde_json::Value = serde_json::from_str(read(unsafe { &*create }.body)).unwrap();
        assert_eq!(sent, serde_json::json!({"title": "v1.0", "due_on": "2025-06-01T00:00:00Z"}));

        let edit_body = c(r#"{"state":"closed"}"#);
        let edit = issues_build_edit_milestone(client, owner.as_ptr(), repo.as_ptr(), 2, edit_body.as_ptr());
        assert!(matches!(unsafe { &*edit }.method, FfiHttpMethod::Patch));

        for req in [list, get, create, edit] {
            issues_free_request(req);
        }
        issues_client_free(client);
    }

    #[test]
    fn parse_issue_list_flattens_fields() {
        let client = new_client();
        let body = c(r#"[
            {"id":11,"number":1,"title":"First","state":"open","locked":false,"milestone":{"number":4}},
            {"id":12,"number":2,"title":"Second","state":"closed","state_reason":"not_planned",
             "pull_request":{"url":"https://api.github.com/repos/o/r/pulls/2"}}
        ]"#);
        let result = issues_parse_issue_list(client, &respond(200, &body));
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::Ok);
        assert!(r.error_message.is_null());
        assert_eq!(r.data_tag, FfiDataTag::IssueList);

        let list = unsafe { &*(r.data as *const FfiIssueList) };
        assert_eq!(list.len, 2);
        let items = unsafe { std::slice::from_raw_parts(list.items, list.len as usize) };

        assert_eq!(items[0].id, 11);
        assert_eq!(read(items[0].title), "First");
        assert_eq!(read(items[0].state), "open");
        assert!(items[0].state_reason.is_null());
        assert!(items[0].body.is_null());
        assert_eq!(items[0].milestone_number, 4);
        assert!(!items[0].is_pull_request);

        assert_eq!(read(items[1].state_reason), "not_planned");
        assert_eq!(items[1].milestone_number, 0);
        assert!(items[1].is_pull_request);
        let json: serde_json::Value = serde_json::from_str(read(items[1].json)).unwrap();
        assert_eq!(json["number"], 2);

        issues_free_result(result);
        issues_client_free(client);
    }

    #[test]
    fn parse_issue_list_keeps_unknown_state_reason() {
        let client = new_client();
        let body = c(r#"[{"id":1,"number":1,"state":"closed","state_reason":"duplicate"},
                         {"id":2,"number":2,"state":"closed","state_reason":"superseded"}]"#);
        let result = issues_parse_issue_list(client, &respond(200, &body));
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::Ok);
        let list = unsafe { &*(r.data as *const FfiIssueList) };
        let items = unsafe { std::slice::from_raw_parts(list.items, list.len as usize) };
        assert_eq!(read(items[0].state_reason), "duplicate");
        assert_eq!(read(items[1].state_reason), "superseded");
        issues_free_result(result);
        issues_client_free(client);
    }

    #[test]
    fn parse_issue_list_empty() {
        let client = new_client();
        let body = c("[]");
        let result = issues_parse_issue_list(client, &respond(200, &body));
        let r = unsafe { &*result };
        assert_eq!(r.data_tag, FfiDataTag::IssueList);
        let list = unsafe { &*(r.data as *const FfiIssueList) };
        assert_eq!(list.len, 0);
        assert!(list.items.is_null());
        issues_free_result(result);
        issues_client_free(client);
    }

    #[test]
    fn parse_issue_success() {
        let client = new_client();
        let body = c(r#"{"id":1,"number":9,"title":"Test","locked":true,"comments":3}"#);
        let result = issues_parse_issue(client, &respond(201, &body));
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::Ok);
        assert_eq!(r.data_tag, FfiDataTag::Issue);

        let issue = unsafe { &*(r.data as *const FfiIssue) };
        assert_eq!(issue.number, 9);
        assert_eq!(read(issue.title), "Test");
        assert!(issue.locked);
        assert_eq!(issue.comments, 3);

        issues_free_result(result);
        issues_client_free(client);
    }

    #[test]
    fn parse_issue_not_found() {
        let client = new_client();
        let body = c(r#"{"message":"Not Found","documentation_url":"https://docs.github.com/rest"}"#);
        let result = issues_parse_issue(client, &respond(404, &body));
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::Http);
        assert_eq!(r.http_status, 404);
        assert_eq!(read(r.error_message), "HTTP 404: Not Found");
        assert!(read(r.error_body).contains("documentation_url"));
        assert!(r.data.is_null());

        issues_free_result(result);
        issues_client_free(client);
    }

    #[test]
    fn parse_issue_bad_json_is_deserialization_error() {
        let client = new_client();
        let body = c("{not json");
        let result = issues_parse_issue(client, &respond(200, &body));
        assert_eq!(unsafe { &*result }.error_code, FfiErrorCode::Deserialization);
        issues_free_result(result);
        issues_client_free(client);
    }

    #[test]
    fn parse_milestone_and_list() {
        let client = new_client();
        let body = c(
            r#"{"id":5,"number":1,"title":"v1.0","state":"open","open_issues":4,"closed_issues":8,
                "due_on":"2025-06-01T00:00:00Z"}"#,
        );
        let result = issues_parse_milestone(client, &respond(200, &body));
        let r = unsafe { &*result };
        assert_eq!(r.data_tag, FfiDataTag::Milestone);
        let m = unsafe { &*(r.data as *const FfiMilestone) };
        assert_eq!(m.number, 1);
        assert_eq!(read(m.title), "v1.0");
        assert_eq!(m.open_issues, 4);
        assert_eq!(m.closed_issues, 8);
        assert_eq!(read(m.due_on), "2025-06-01T00:00:00+00:00");
        assert!(m.description.is_null());
        issues_free_result(result);

        let body = c(r#"[{"number":1},{"number":2,"state":"closed"}]"#);
        let result = issues_parse_milestone_list(client, &respond(200, &body));
        let r = unsafe { &*result };
        assert_eq!(r.data_tag, FfiDataTag::MilestoneList);
        let list = unsafe { &*(r.data as *const FfiMilestoneList) };
        let items = unsafe { std::slice::from_raw_parts(list.items, list.len as usize) };
        assert_eq!(items.len(), 2);
        assert_eq!(read(items[1].state), "closed");
        issues_free_result(result);

        issues_client_free(client);
    }

    #[test]
    fn parse_empty_success() {
        let client = new_client();
        let body = c("");
        let result = issues_parse_empty(client, &respond(204, &body));
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::Ok);
        assert_eq!(r.data_tag, FfiDataTag::None);
        assert!(r.data.is_null());
        issues_free_result(result);
        issues_client_free(client);
    }

    #[test]
    fn parse_empty_with_null_body_reports_status() {
        let client = new_client();
        let resp = FfiHttpResponse {
            status: 403,
            body: std::ptr::null(),
        };
        let result = issues_parse_empty(client, &resp);
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::Http);
        assert_eq!(r.http_status, 403);
        issues_free_result(result);
        issues_client_free(client);
    }

    #[test]
    fn parse_null_client_returns_null_arg() {
        let body = c("[]");
        let result = issues_parse_issue_list(std::ptr::null(), &respond(200, &body));
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::NullArg);
        assert_eq!(read(r.error_message), "null argument: client");
        issues_free_result(result);
    }

    #[test]
    fn parse_null_response_returns_null_arg() {
        let client = new_client();
        let result = issues_parse_milestone(client, std::ptr::null());
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::NullArg);
        issues_free_result(result);
        issues_client_free(client);
    }

    #[test]
    fn free_request_null_is_safe() {
        issues_free_request(std::ptr::null_mut());
    }

    #[test]
    fn free_result_null_is_safe() {
        issues_free_result(std::ptr::null_mut());
    }

    #[test]
    fn free_string_null_is_safe() {
        issues_free_string(std::ptr::null_mut());
    }
}
