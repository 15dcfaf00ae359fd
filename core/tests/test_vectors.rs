//! Verify build/parse methods against JSON test vectors stored in `test-vectors/`.
//!
//! Each vector describes an operation and its inputs, the expected request,
//! a simulated response, and either the expected parse result or the
//! expected error. Comparing parsed JSON (not raw strings) avoids false
//! negatives from field-ordering differences.

use issues_core::{
    ApiError, HttpMethod, HttpRequest, HttpResponse, IssueRequest, IssuesClient, LockIssueOptions, Milestone,
};
use serde_json::Value;

const BASE_URL: &str = "https://api.github.com";

fn client() -> IssuesClient {
    IssuesClient::new(BASE_URL)
}

/// Parse the method string from test vectors into `HttpMethod`.
fn parse_method(s: &str) -> HttpMethod {
    match s {
        "GET" => HttpMethod::Get,
        "POST" => HttpMethod::Post,
        "PATCH" => HttpMethod::Patch,
        "PUT" => HttpMethod::Put,
        "DELETE" => HttpMethod::Delete,
        other => panic!("unknown method: {other}"),
    }
}

fn str_field<'a>(case: &'a Value, key: &str) -> &'a str {
    case[key].as_str().unwrap_or_else(|| panic!("missing string field {key}"))
}

fn number(case: &Value) -> u64 {
    case["number"].as_u64().unwrap()
}

fn input<T: serde::de::DeserializeOwned>(case: &Value) -> T {
    serde_json::from_value(case["input"].clone()).unwrap()
}

/// Dispatch a vector to the matching `build_*` method.
fn build(c: &IssuesClient, case: &Value) -> HttpRequest {
    let op = str_field(case, "operation");
    match op {
        "list_issues" => c.build_list_issues(case["all"].as_bool().unwrap(), None).unwrap(),
        "list_issues_by_org" => c.build_list_issues_by_org(str_field(case, "org"), None).unwrap(),
        "list_issues_by_repo" => c
            .build_list_issues_by_repo(str_field(case, "owner"), str_field(case, "repo"), None)
            .unwrap(),
        "get_issue" => c.build_get_issue(str_field(case, "owner"), str_field(case, "repo"), number(case)),
        "create_issue" => c
            .build_create_issue(str_field(case, "owner"), str_field(case, "repo"), &input::<IssueRequest>(case))
            .unwrap(),
        "edit_issue" => c
            .build_edit_issue(
                str_field(case, "owner"),
                str_field(case, "repo"),
                number(case),
                &input::<IssueRequest>(case),
            )
            .unwrap(),
        "remove_milestone" => c
            .build_remove_milestone(str_field(case, "owner"), str_field(case, "repo"), number(case))
            .unwrap(),
        "lock_issue" => {
            let opts: Option<LockIssueOptions> = case.get("input").map(|_| input(case));
            c.build_lock_issue(str_field(case, "owner"), str_field(case, "repo"), number(case), opts.as_ref())
                .unwrap()
        }
        "unlock_issue" => c.build_unlock_issue(str_field(case, "owner"), str_field(case, "repo"), number(case)),
        "list_milestones" => c
            .build_list_milestones(str_field(case, "owner"), str_field(case, "repo"), None)
            .unwrap(),
        "get_milestone" => c.build_get_milestone(str_field(case, "owner"), str_field(case, "repo"), number(case)),
        "create_milestone" => c
            .build_create_milestone(str_field(case, "owner"), str_field(case, "repo"), &input::<Milestone>(case))
            .unwrap(),
        "edit_milestone" => c
            .build_edit_milestone(
                str_field(case, "owner"),
                str_field(case, "repo"),
                number(case),
                &input::<Milestone>(case),
            )
            .unwrap(),
        "delete_milestone" => c.build_delete_milestone(str_field(case, "owner"), str_field(case, "repo"), number(case)),
        other => panic!("unknown operation: {other}"),
    }
}

/// Dispatch a simulated response to the matching `parse_*` method and
/// re-encode the result as JSON for comparison.
fn parse(c: &IssuesClient, returns: &str, response: HttpResponse) -> Result<Value, ApiError> {
    match returns {
        "issues" => c.parse_issues(response).map(|v| serde_json::to_value(v).unwrap()),
        "issue" => c.parse_issue(response).map(|v| serde_json::to_value(v).unwrap()),
        "milestones" => c.parse_milestones(response).map(|v| serde_json::to_value(v).unwrap()),
        "milestone" => c.parse_milestone(response).map(|v| serde_json::to_value(v).unwrap()),
        "empty" => c.parse_empty(response).map(|()| Value::Null),
        other => panic!("unknown return shape: {other}"),
    }
}

fn run_vectors(raw: &str) {
    let vectors: Value = serde_json::from_str(raw).unwrap();

    let c = client();
    for case in vectors["cases"].as_array().unwrap() {
        let name = str_field(case, "name");
        let expected_req = &case["expected_request"];

        // Verify build
        let req = build(&c, case);
        assert_eq!(req.method, parse_method(str_field(expected_req, "method")), "{name}: method");
        assert_eq!(req.path, format!("{BASE_URL}{}", str_field(expected_req, "path")), "{name}: path");
        assert_eq!(req.header("accept"), Some(str_field(expected_req, "accept")), "{name}: accept");

        match &expected_req["body"] {
            Value::Null => {
                assert!(req.body.is_none(), "{name}: body should be None");
                assert_eq!(req.header("content-type"), None, "{name}: content-type");
            }
            expected => {
                let body: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
                assert_eq!(&body, expected, "{name}: body");
                assert_eq!(req.header("content-type"), Some("application/json"), "{name}: content-type");
            }
        }

        // Verify parse
        let sim = &case["simulated_response"];
        let response = HttpResponse {
            status: sim["status"].as_u64().unwrap() as u16,
            headers: Vec::new(),
            body: str_field(sim, "body").to_string(),
        };
        let result = parse(&c, str_field(case, "returns"), response);

        if let Some(expected_error) = case.get("expected_error") {
            let err = result.unwrap_err();
            match err {
                ApiError::HttpError { status, message, .. } => {
                    assert_eq!(u64::from(status), expected_error["status"].as_u64().unwrap(), "{name}: status");
                    assert_eq!(message, str_field(expected_error, "message"), "{name}: message");
                }
                other => panic!("{name}: expected HttpError, got {other:?}"),
            }
        } else if let Some(expected) = case.get("expected_result") {
            assert_eq!(&result.unwrap(), expected, "{name}: parsed result");
        } else {
            assert!(result.is_ok(), "{name}: expected success");
        }
    }
}

#[test]
fn issue_test_vectors() {
    run_vectors(include_str!("../../test-vectors/issues.json"));
}

#[test]
fn milestone_test_vectors() {
    run_vectors(include_str!("../../test-vectors/milestones.json"));
}

#[test]
fn pull_request_detection_follows_vectors() {
    let raw = include_str!("../../test-vectors/issues.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();
    let case = &vectors["cases"][0];
    let response = HttpResponse {
        status: 200,
        headers: Vec::new(),
        body: str_field(&case["simulated_response"], "body").to_string(),
    };
    let issues = client().parse_issues(response).unwrap();
    assert!(!issues[0].is_pull_request());
    assert!(issues[1].is_pull_request());
}
