//! Typed client for the GitHub issues and milestones REST endpoints.
//!
//! # Overview
//! Builds `HttpRequest` values and parses `HttpResponse` values without
//! touching the network (host-does-IO pattern). Callers either execute the
//! round-trip themselves or inject a `Transport` into `IssuesService`.
//!
//! # Design
//! - `IssuesClient` is stateless; it holds only its configuration.
//! - One `build_*` per endpoint, one `parse_*` per response shape.
//! - Every resource field is optional, mirroring what the API may omit.
//! - Types use owned `String` / `Vec` fields so they map onto the FFI crate.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod options;
pub mod service;
pub mod types;

pub use client::{IssuesClient, MEDIA_TYPE_REACTIONS_PREVIEW, MEDIA_TYPE_V3};
pub use config::ClientConfig;
pub use error::{ApiError, ErrorDetail, ErrorResponse};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Response, Transport};
pub use options::{
    Direction, IssueFilter, IssueListByRepoOptions, IssueListOptions, IssueSort, ListCursorOptions, ListOptions,
    MilestoneListOptions, MilestoneSort, StateFilter,
};
pub use service::IssuesService;
pub use types::{
    Issue, IssueRequest, IssueType, Label, LockIssueOptions, LockReason, Milestone, PullRequestLinks, Reactions,
    Repository, State, StateReason, Timestamp, User,
};
