//! Event log entry types.

use crate::model::{HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogEntryType {
    ReceivedRequest,
    ExpectationMatched,
    ExpectationResponse,
    NoMatchResponse,
    ForwardedRequest,
}

impl LogEntryType {
    /// Entries that pair a request with the response sent for it.
    pub fn has_response(&self) -> bool {
        matches!(
            self,
            LogEntryType::ExpectationResponse
                | LogEntryType::NoMatchResponse
                | LogEntryType::ForwardedRequest
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: u64,
    #[serde(rename = "type")]
    pub entry_type: LogEntryType,
    pub timestamp: DateTime<Utc>,
    pub http_request: HttpRequest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_response: Option<HttpResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expectation_id: Option<String>,
    /// Soft-deleted by `clear`; hidden from everything but
    /// `retrieve_log_entries_including_deleted`.
    #[serde(default)]
    pub deleted: bool,
}

impl LogEntry {
    /// New entry; the id is assigned when it is added to the log.
    pub fn new(entry_type: LogEntryType, http_request: HttpRequest) -> Self {
        Self {
            id: 0,
            entry_type,
            timestamp: Utc::now(),
            http_request,
            http_response: None,
            expectation_id: None,
            deleted: false,
        }
    }

    pub fn with_response(mut self, http_response: HttpResponse) -> Self {
        self.http_response = Some(http_response);
        self
    }

    pub fn with_expectation_id(mut self, id: impl Into<String>) -> Self {
        self.expectation_id = Some(id.into());
        self
    }
}

/// A request and the response sent for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRequestAndHttpResponse {
    pub http_request: HttpRequest,
    pub http_response: HttpResponse,
}
