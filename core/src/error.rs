//! Error types for the issues API client.
//!
//! # Design
//! Nothing is retried here. Request construction fails with
//! `SerializationError` or `QueryEncodingError`; transport failures are
//! passed through untouched as `TransportError`; any non-2xx status becomes
//! `HttpError`. A 2xx body that does not decode lands in
//! `DeserializationError`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http::{find_header, HttpResponse};

/// Errors returned by `IssuesClient` and `IssuesService`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    SerializationError(String),

    /// An options record could not be encoded as a query string.
    #[error("query encoding failed: {0}")]
    QueryEncodingError(String),

    /// The transport failed before a response was received.
    #[error("transport error: {0}")]
    TransportError(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The server returned a non-2xx status. `headers` keeps the response
    /// headers (rate limits, request ids) of the failed call.
    #[error("HTTP {status}: {message}")]
    HttpError {
        status: u16,
        message: String,
        body: String,
        headers: Vec<(String, String)>,
        error: Option<ErrorResponse>,
    },

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),
}

impl ApiError {
    /// HTTP status for API-level failures, `None` otherwise.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::HttpError { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Case-insensitive response header lookup for API-level failures.
    pub fn header(&self, name: &str) -> Option<&str> {
        match self {
            ApiError::HttpError { headers, .. } => find_header(headers, name),
            _ => None,
        }
    }

    /// Build an `HttpError` from a failed response, decoding the GitHub error
    /// payload when the body has one.
    pub(crate) fn from_response(response: &HttpResponse) -> Self {
        let body = response.body.as_str();
        let error: Option<ErrorResponse> = serde_json::from_str(body).ok();
        let message = match &error {
            Some(e) if !e.message.is_empty() => e.message.clone(),
            _ if body.is_empty() => "no response body".to_string(),
            _ => body.to_string(),
        };
        ApiError::HttpError {
            status: response.status,
            message,
            body: body.to_string(),
            headers: response.headers.clone(),
            error,
        }
    }
}

/// Error payload GitHub returns alongside non-2xx statuses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorDetail>,
}

/// A single validation failure inside an `ErrorResponse`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
