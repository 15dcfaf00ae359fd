use std::{collections::HashMap, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header::ACCEPT, HeaderMap, StatusCode},
    routing::{get, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;

const API_URL: &str = "https://api.github.com";
const REACTIONS_PREVIEW: &str = "squirrel-girl-preview";
const LOCK_REASONS: [&str; 4] = ["off-topic", "too heated", "resolved", "spam"];
const DEFAULT_PER_PAGE: usize = 30;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub login: String,
    pub id: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    pub color: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Reactions {
    pub total_count: u64,
    #[serde(rename = "+1")]
    pub plus_one: u64,
    #[serde(rename = "-1")]
    pub minus_one: u64,
    pub url: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Milestone {
    pub id: u64,
    pub number: u64,
    pub url: String,
    pub state: String,
    pub title: String,
    pub description: Option<String>,
    pub creator: User,
    pub open_issues: u64,
    pub closed_issues: u64,
    pub due_on: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Issue {
    pub id: u64,
    pub number: u64,
    pub url: String,
    pub repository_url: String,
    pub state: String,
    pub state_reason: Option<String>,
    pub title: String,
    pub body: Option<String>,
    pub user: User,
    pub labels: Vec<Label>,
    pub assignee: Option<User>,
    pub assignees: Vec<User>,
    pub milestone: Option<Milestone>,
    pub locked: bool,
    pub active_lock_reason: Option<String>,
    pub comments: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reactions: Option<Reactions>,
}

#[derive(Deserialize)]
pub struct CreateIssue {
    pub title: String,
    pub body: Option<String>,
    pub labels: Option<Vec<String>>,
    pub assignee: Option<String>,
    pub assignees: Option<Vec<String>>,
    pub milestone: Option<u64>,
}

/// Partial update. `milestone` is doubly optional: absent leaves it alone,
/// `null` clears it.
#[derive(Deserialize)]
pub struct EditIssue {
    pub title: Option<String>,
    pub body: Option<String>,
    pub labels: Option<Vec<String>>,
    pub assignee: Option<String>,
    pub assignees: Option<Vec<String>>,
    pub state: Option<String>,
    pub state_reason: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub milestone: Option<Option<u64>>,
}

#[derive(Deserialize)]
pub struct LockIssue {
    pub lock_reason: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateMilestone {
    pub title: String,
    pub state: Option<String>,
    pub description: Option<String>,
    pub due_on: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub struct EditMilestone {
    pub title: Option<String>,
    pub state: Option<String>,
    pub description: Option<String>,
    pub due_on: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Default)]
struct Repo {
    issues: Vec<Issue>,
    milestones: Vec<Milestone>,
}

#[derive(Default)]
pub struct Store {
    next_id: u64,
    repos: HashMap<(String, String), Repo>,
}

impl Store {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

pub type Db = Arc<RwLock<Store>>;

type ApiResult<T> = Result<T, (StatusCode, Json<ErrorBody>)>;

fn not_found() -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            message: "Not Found".to_string(),
        }),
    )
}

fn unprocessable(message: &str) -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ErrorBody {
            message: message.to_string(),
        }),
    )
}

fn mock_user() -> User {
    User {
        login: "octocat".to_string(),
        id: 1,
    }
}

fn user(login: &str) -> User {
    User {
        login: login.to_string(),
        id: 1000 + login.len() as u64,
    }
}

fn labels(names: Vec<String>) -> Vec<Label> {
    names
        .into_iter()
        .map(|name| Label {
            name,
            color: "ededed".to_string(),
        })
        .collect()
}

fn assignees(assignee: Option<String>, assignees: Option<Vec<String>>) -> Vec<User> {
    let mut logins: Vec<String> = assignees.unwrap_or_default();
    if let Some(a) = assignee {
        if !logins.contains(&a) {
            logins.insert(0, a);
        }
    }
    logins.iter().map(|l| user(l)).collect()
}

fn wants_reactions(headers: &HeaderMap) -> bool {
    headers
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains(REACTIONS_PREVIEW))
}

fn valid_state(state: &str) -> bool {
    state == "open" || state == "closed"
}

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::default()));
    Router::new()
        .route("/issues", get(list_all_issues))
        .route("/user/issues", get(list_all_issues))
        .route("/orgs/{org}/issues", get(list_org_issues))
        .route("/repos/{owner}/{repo}/issues", get(list_repo_issues).post(create_issue))
        .route("/repos/{owner}/{repo}/issues/{number}", get(get_issue).patch(edit_issue))
        .route("/repos/{owner}/{repo}/issues/{number}/lock", put(lock_issue).delete(unlock_issue))
        .route("/repos/{owner}/{repo}/milestones", get(list_milestones).post(create_milestone))
        .route(
            "/repos/{owner}/{repo}/milestones/{number}",
            get(get_milestone).patch(edit_milestone).delete(delete_milestone),
        )
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

impl Repo {
    /// Milestone with issue counts computed from the current issue set.
    fn render_milestone(&self, milestone: &Milestone) -> Milestone {
        let mut m = milestone.clone();
        let attached = self
            .issues
            .iter()
            .filter(|i| i.milestone.as_ref().is_some_and(|im| im.number == m.number));
        let (open, closed) = attached.fold((0, 0), |(o, c), i| if i.state == "open" { (o + 1, c) } else { (o, c + 1) });
        m.open_issues = open;
        m.closed_issues = closed;
        m
    }

    fn render_issue(&self, issue: &Issue, with_reactions: bool) -> Issue {
        let mut out = issue.clone();
        out.milestone = issue
            .milestone
            .as_ref()
            .and_then(|im| self.milestones.iter().find(|m| m.number == im.number))
            .map(|m| self.render_milestone(m));
        if !with_reactions {
            out.reactions = None;
        }
        out
    }

    fn milestone_stub(&self, number: u64) -> ApiResult<Milestone> {
        self.milestones
            .iter()
            .find(|m| m.number == number)
            .cloned()
            .ok_or_else(|| unprocessable("milestone does not exist"))
    }
}

fn issue_matches(issue: &Issue, query: &HashMap<String, String>) -> bool {
    let state = query.get("state").map(String::as_str).unwrap_or("open");
    if state != "all" && issue.state != state {
        return false;
    }
    if let Some(wanted) = query.get("labels").filter(|l| !l.is_empty()) {
        let all_present = wanted
            .split(',')
            .all(|name| issue.labels.iter().any(|l| l.name == name));
        if !all_present {
            return false;
        }
    }
    match query.get("milestone").map(String::as_str) {
        None => {}
        Some("*") => {
            if issue.milestone.is_none() {
                return false;
            }
        }
        Some("none") => {
            if issue.milestone.is_some() {
                return false;
            }
        }
        Some(number) => {
            let number = number.parse::<u64>().ok();
            if issue.milestone.as_ref().map(|m| m.number) != number {
                return false;
            }
        }
    }
    if let Some(login) = query.get("assignee") {
        let ok = match login.as_str() {
            "none" => issue.assignees.is_empty(),
            "*" => !issue.assignees.is_empty(),
            login => issue.assignees.iter().any(|a| a.login == login),
        };
        if !ok {
            return false;
        }
    }
    true
}

fn paginate<T>(mut items: Vec<T>, query: &HashMap<String, String>) -> Vec<T> {
    if query.get("direction").map(String::as_str) != Some("asc") {
        items.reverse();
    }
    let per_page = query
        .get("per_page")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(DEFAULT_PER_PAGE)
        .max(1);
    let page = query.get("page").and_then(|v| v.parse::<usize>().ok()).unwrap_or(1).max(1);
    items.into_iter().skip((page - 1).saturating_mul(per_page)).take(per_page).collect()
}

// ---------------------------------------------------------------------------
// Issues
// ---------------------------------------------------------------------------

async fn list_all_issues(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Vec<Issue>> {
    Json(collect_issues(&db, &headers, &query, |_| true).await)
}

async fn list_org_issues(
    State(db): State<Db>,
    Path(org): Path<String>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Vec<Issue>> {
    Json(collect_issues(&db, &headers, &query, |owner| owner == org).await)
}

async fn collect_issues(
    db: &Db,
    headers: &HeaderMap,
    query: &HashMap<String, String>,
    owner_filter: impl Fn(&str) -> bool,
) -> Vec<Issue> {
    let store = db.read().await;
    let with_reactions = wants_reactions(headers);
    let mut matched: Vec<Issue> = store
        .repos
        .iter()
        .filter(|((owner, _), _)| owner_filter(owner.as_str()))
        .flat_map(|(_, repo)| {
            repo.issues
                .iter()
                .filter(|i| issue_matches(i, query))
                .map(|i| repo.render_issue(i, with_reactions))
                .collect::<Vec<_>>()
        })
        .collect();
    matched.sort_by_key(|i| i.id);
    paginate(matched, query)
}

async fn list_repo_issues(
    State(db): State<Db>,
    Path((owner, repo)): Path<(String, String)>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Vec<Issue>> {
    let store = db.read().await;
    let Some(repo) = store.repos.get(&(owner, repo)) else {
        return Json(Vec::new());
    };
    let with_reactions = wants_reactions(&headers);
    let matched = repo
        .issues
        .iter()
        .filter(|i| issue_matches(i, &query))
        .map(|i| repo.render_issue(i, with_reactions))
        .collect();
    Json(paginate(matched, &query))
}

async fn get_issue(
    State(db): State<Db>,
    Path((owner, repo, number)): Path<(String, String, u64)>,
    headers: HeaderMap,
) -> ApiResult<Json<Issue>> {
    let store = db.read().await;
    let repo = store.repos.get(&(owner, repo)).ok_or_else(not_found)?;
    let issue = repo.issues.iter().find(|i| i.number == number).ok_or_else(not_found)?;
    Ok(Json(repo.render_issue(issue, wants_reactions(&headers))))
}

async fn create_issue(
    State(db): State<Db>,
    Path((owner, repo_name)): Path<(String, String)>,
    Json(input): Json<CreateIssue>,
) -> ApiResult<(StatusCode, Json<Issue>)> {
    let mut store = db.write().await;
    let id = store.next_id();
    let repo = store.repos.entry((owner.clone(), repo_name.clone())).or_default();

    let milestone = input.milestone.map(|n| repo.milestone_stub(n)).transpose()?;
    let number = repo.issues.len() as u64 + 1;
    let assignees = assignees(input.assignee, input.assignees);
    let repository_url = format!("{API_URL}/repos/{owner}/{repo_name}");
    let now = Utc::now();
    let issue = Issue {
        id,
        number,
        url: format!("{repository_url}/issues/{number}"),
        repository_url,
        state: "open".to_string(),
        state_reason: None,
        title: input.title,
        body: input.body,
        user: mock_user(),
        labels: labels(input.labels.unwrap_or_default()),
        assignee: assignees.first().cloned(),
        assignees,
        milestone,
        locked: false,
        active_lock_reason: None,
        comments: 0,
        created_at: now,
        updated_at: now,
        closed_at: None,
        reactions: Some(Reactions {
            url: format!("{API_URL}/repos/{owner}/{repo_name}/issues/{number}/reactions"),
            ..Default::default()
        }),
    };
    repo.issues.push(issue.clone());
    debug!(%owner, repo = %repo_name, number, "created issue");
    Ok((StatusCode::CREATED, Json(repo.render_issue(&issue, false))))
}

async fn edit_issue(
    State(db): State<Db>,
    Path((owner, repo_name, number)): Path<(String, String, u64)>,
    Json(input): Json<EditIssue>,
) -> ApiResult<Json<Issue>> {
    let mut store = db.write().await;
    let repo = store.repos.get_mut(&(owner.clone(), repo_name.clone())).ok_or_else(not_found)?;

    let milestone = match input.milestone {
        None => None,
        Some(None) => Some(None),
        Some(Some(n)) => Some(Some(repo.milestone_stub(n)?)),
    };
    if let Some(state) = &input.state {
        if !valid_state(state) {
            return Err(unprocessable("state must be open or closed"));
        }
    }

    let issue = repo.issues.iter_mut().find(|i| i.number == number).ok_or_else(not_found)?;
    if let Some(title) = input.title {
        issue.title = title;
    }
    if let Some(body) = input.body {
        issue.body = Some(body);
    }
    if let Some(names) = input.labels {
        issue.labels = labels(names);
    }
    if input.assignee.is_some() || input.assignees.is_some() {
        issue.assignees = assignees(input.assignee, input.assignees);
        issue.assignee = issue.assignees.first().cloned();
    }
    if let Some(milestone) = milestone {
        issue.milestone = milestone;
    }
    let now = Utc::now();
    if let Some(state) = input.state {
        if state == "closed" && issue.state == "open" {
            issue.closed_at = Some(now);
            issue.state_reason = Some(input.state_reason.clone().unwrap_or_else(|| "completed".to_string()));
        } else if state == "open" && issue.state == "closed" {
            issue.closed_at = None;
            issue.state_reason = Some("reopened".to_string());
        }
        issue.state = state;
    }
    if let Some(reason) = input.state_reason {
        issue.state_reason = Some(reason);
    }
    issue.updated_at = now;

    let issue = issue.clone();
    debug!(%owner, repo = %repo_name, number, "edited issue");
    Ok(Json(repo.render_issue(&issue, false)))
}

async fn lock_issue(
    State(db): State<Db>,
    Path((owner, repo_name, number)): Path<(String, String, u64)>,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let reason = if body.is_empty() {
        None
    } else {
        let input: LockIssue = serde_json::from_slice(&body).map_err(|e| unprocessable(&e.to_string()))?;
        input.lock_reason
    };
    if let Some(reason) = &reason {
        if !LOCK_REASONS.contains(&reason.as_str()) {
            return Err(unprocessable("lock_reason is not included in the list"));
        }
    }

    let mut store = db.write().await;
    let repo = store.repos.get_mut(&(owner.clone(), repo_name.clone())).ok_or_else(not_found)?;
    let issue = repo.issues.iter_mut().find(|i| i.number == number).ok_or_else(not_found)?;
    issue.locked = true;
    issue.active_lock_reason = reason;
    debug!(%owner, repo = %repo_name, number, "locked issue");
    Ok(StatusCode::NO_CONTENT)
}

async fn unlock_issue(
    State(db): State<Db>,
    Path((owner, repo_name, number)): Path<(String, String, u64)>,
) -> ApiResult<StatusCode> {
    let mut store = db.write().await;
    let repo = store.repos.get_mut(&(owner.clone(), repo_name.clone())).ok_or_else(not_found)?;
    let issue = repo.issues.iter_mut().find(|i| i.number == number).ok_or_else(not_found)?;
    issue.locked = false;
    issue.active_lock_reason = None;
    debug!(%owner, repo = %repo_name, number, "unlocked issue");
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Milestones
// ---------------------------------------------------------------------------

async fn list_milestones(
    State(db): State<Db>,
    Path((owner, repo)): Path<(String, String)>,
    Query(mut query): Query<HashMap<String, String>>,
) -> Json<Vec<Milestone>> {
    let store = db.read().await;
    let Some(repo) = store.repos.get(&(owner, repo)) else {
        return Json(Vec::new());
    };
    let state = query.get("state").cloned().unwrap_or_else(|| "open".to_string());
    let matched = repo
        .milestones
        .iter()
        .filter(|m| state == "all" || m.state == state)
        .map(|m| repo.render_milestone(m))
        .collect();
    // Milestones default to ascending order.
    query.entry("direction".to_string()).or_insert_with(|| "asc".to_string());
    Json(paginate(matched, &query))
}

async fn get_milestone(
    State(db): State<Db>,
    Path((owner, repo, number)): Path<(String, String, u64)>,
) -> ApiResult<Json<Milestone>> {
    let store = db.read().await;
    let repo = store.repos.get(&(owner, repo)).ok_or_else(not_found)?;
    let milestone = repo.milestones.iter().find(|m| m.number == number).ok_or_else(not_found)?;
    Ok(Json(repo.render_milestone(milestone)))
}

async fn create_milestone(
    State(db): State<Db>,
    Path((owner, repo_name)): Path<(String, String)>,
    Json(input): Json<CreateMilestone>,
) -> ApiResult<(StatusCode, Json<Milestone>)> {
    let state = input.state.unwrap_or_else(|| "open".to_string());
    if !valid_state(&state) {
        return Err(unprocessable("state must be open or closed"));
    }

    let mut store = db.write().await;
    let id = store.next_id();
    let repo = store.repos.entry((owner.clone(), repo_name.clone())).or_default();
    if repo.milestones.iter().any(|m| m.title == input.title) {
        return Err(unprocessable("milestone title already exists"));
    }
    let number = repo.milestones.iter().map(|m| m.number).max().unwrap_or(0) + 1;
    let now = Utc::now();
    let milestone = Milestone {
        id,
        number,
        url: format!("{API_URL}/repos/{owner}/{repo_name}/milestones/{number}"),
        closed_at: (state == "closed").then_some(now),
        state,
        title: input.title,
        description: input.description,
        creator: mock_user(),
        open_issues: 0,
        closed_issues: 0,
        due_on: input.due_on,
        created_at: now,
        updated_at: now,
    };
    repo.milestones.push(milestone.clone());
    debug!(%owner, repo = %repo_name, number, "created milestone");
    Ok((StatusCode::CREATED, Json(milestone)))
}

async fn edit_milestone(
    State(db): State<Db>,
    Path((owner, repo_name, number)): Path<(String, String, u64)>,
    Json(input): Json<EditMilestone>,
) -> ApiResult<Json<Milestone>> {
    if let Some(state) = &input.state {
        if !valid_state(state) {
            return Err(unprocessable("state must be open or closed"));
        }
    }

    let mut store = db.write().await;
    let repo = store.repos.get_mut(&(owner.clone(), repo_name.clone())).ok_or_else(not_found)?;
    let milestone = repo.milestones.iter_mut().find(|m| m.number == number).ok_or_else(not_found)?;
    let now = Utc::now();
    if let Some(title) = input.title {
        milestone.title = title;
    }
    if let Some(description) = input.description {
        milestone.description = Some(description);
    }
    if let Some(due_on) = input.due_on {
        milestone.due_on = Some(due_on);
    }
    if let Some(state) = input.state {
        milestone.closed_at = (state == "closed").then_some(now);
        milestone.state = state;
    }
    milestone.updated_at = now;

    let milestone = milestone.clone();
    debug!(%owner, repo = %repo_name, number, "edited milestone");
    Ok(Json(repo.render_milestone(&milestone)))
}

async fn delete_milestone(
    State(db): State<Db>,
    Path((owner, repo_name, number)): Path<(String, String, u64)>,
) -> ApiResult<StatusCode> {
    let mut store = db.write().await;
    let repo = store.repos.get_mut(&(owner.clone(), repo_name.clone())).ok_or_else(not_found)?;
    let before = repo.milestones.len();
    repo.milestones.retain(|m| m.number != number);
    if repo.milestones.len() == before {
        return Err(not_found());
    }
    for issue in repo.issues.iter_mut() {
        if issue.milestone.as_ref().is_some_and(|m| m.number == number) {
            issue.milestone = None;
        }
    }
    debug!(%owner, repo = %repo_name, number, "deleted milestone");
    Ok(StatusCode::NO_CONTENT)
}
