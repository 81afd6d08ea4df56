//! Bounded in-memory log of requests, matches and responses.

use super::entry::{HttpRequestAndHttpResponse, LogEntry, LogEntryType};
use crate::config::EngineConfig;
use crate::expectation::{Expectation, Times};
use crate::matchers::HttpRequestPropertiesMatcher;
use crate::model::HttpRequest;
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Event log with soft deletion; the oldest entries fall off once
/// `max_log_entries` is reached.
#[derive(Debug)]
pub struct EventLog {
    entries: RwLock<VecDeque<LogEntry>>,
    next_id: AtomicU64,
    max_entries: usize,
}

impl EventLog {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            entries: RwLock::new(VecDeque::new()),
            next_id: AtomicU64::new(1),
            max_entries: config.max_log_entries,
        }
    }

    /// Append an entry, returning its id.
    pub fn add(&self, mut entry: LogEntry) -> u64 {
        entry.id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let id = entry.id;
        let mut entries = self.entries.write();
        entries.push_back(entry);
        while entries.len() > self.max_entries {
            entries.pop_front();
        }
        id
    }

    /// Visible entries of the given types whose request satisfies `filter`.
    fn select<T>(
        &self,
        filter: Option<&HttpRequest>,
        types: impl Fn(LogEntryType) -> bool,
        map: impl Fn(&LogEntry) -> Option<T>,
    ) -> Vec<T> {
        let matcher = filter.map(HttpRequestPropertiesMatcher::data_plane);
        self.entries
            .read()
            .iter()
            .filter(|e| !e.deleted && types(e.entry_type))
            .filter(|e| {
                matcher
                    .as_ref()
                    .map_or(true, |m| m.matches(None, &e.http_request))
            })
            .filter_map(map)
            .collect()
    }

    /// Received requests, oldest first.
    pub fn retrieve_requests(&self, filter: Option<&HttpRequest>) -> Vec<HttpRequest> {
        self.select(
            filter,
            |t| t == LogEntryType::ReceivedRequest,
            |e| Some(e.http_request.clone()),
        )
    }

    /// Requests paired with the response returned for them.
    pub fn retrieve_request_responses(
        &self,
        filter: Option<&HttpRequest>,
    ) -> Vec<HttpRequestAndHttpResponse> {
        self.select(
            filter,
            |t| t.has_response(),
            |e| {
                e.http_response
                    .as_ref()
                    .map(|response| HttpRequestAndHttpResponse {
                        http_request: e.http_request.clone(),
                        http_response: response.clone(),
                    })
            },
        )
    }

    /// Forwarded exchanges replayable as single-use expectations.
    pub fn retrieve_recorded_expectations(&self, filter: Option<&HttpRequest>) -> Vec<Expectation> {
        self.select(
            filter,
            |t| t == LogEntryType::ForwardedRequest,
            |e| {
                e.http_response.as_ref().map(|response| {
                    Expectation::when(e.http_request.clone())
                        .with_times(Times::once())
                        .then_respond(response.clone())
                })
            },
        )
    }

    /// Every retained entry, soft-deleted ones included.
    pub fn retrieve_log_entries_including_deleted(&self) -> Vec<LogEntry> {
        self.entries.read().iter().cloned().collect()
    }

    /// Visible entries whose request satisfies `filter`.
    pub fn retrieve_log_entries(&self, filter: Option<&HttpRequest>) -> Vec<LogEntry> {
        self.select(filter, |_| true, |e| Some(e.clone()))
    }

    /// Soft-delete entries whose request satisfies `filter` (`None` clears
    /// all). Returns the number deleted.
    pub fn clear(&self, filter: Option<&HttpRequest>) -> usize {
        let matcher = filter.map(HttpRequestPropertiesMatcher::data_plane);
        let mut cleared = 0;
        for entry in self.entries.write().iter_mut().filter(|e| !e.deleted) {
            if matcher
                .as_ref()
                .map_or(true, |m| m.matches(None, &entry.http_request))
            {
                entry.deleted = true;
                cleared += 1;
            }
        }
        debug!(cleared, "Cleared log entries");
        cleared
    }

    /// Drop every entry, deleted or not.
    pub fn reset(&self) {
        self.entries.write().clear();
    }

    /// Number of visible entries.
    pub fn len(&self) -> usize {
        self.entries.read().iter().filter(|e| !e.deleted).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{request, response, Action};

    fn log() -> EventLog {
        EventLog::new(&EngineConfig::default())
    }

    #[test]
    fn test_retrieve_requests_filtered() {
        let log = log();
        log.add(LogEntry::new(LogEntryType::ReceivedRequest, request().with_path("/a")));
        log.add(LogEntry::new(LogEntryType::ReceivedRequest, request().with_path("/b")));
        log.add(LogEntry::new(LogEntryType::ExpectationMatched, request().with_path("/a")));

        assert_eq!(log.retrieve_requests(None).len(), 2);
        let only_a = log.retrieve_requests(Some(&request().with_path("/a")));
        assert_eq!(only_a, vec![request().with_path("/a")]);
    }

    #[test]
    fn test_clear_is_soft() {
        let log = log();
        log.add(LogEntry::new(LogEntryType::ReceivedRequest, request().with_path("request_one")));
        log.add(LogEntry::new(LogEntryType::ReceivedRequest, request().with_path("request_two")));

        assert_eq!(log.clear(Some(&request().with_path("request_one"))), 1);
        assert_eq!(
            log.retrieve_requests(None),
            vec![request().with_path("request_two")]
        );
        let all = log.retrieve_log_entries_including_deleted();
        assert_eq!(all.len(), 2);
        assert!(all[0].deleted);

        log.reset();
        assert!(log.retrieve_log_entries_including_deleted().is_empty());
    }

    #[test]
    fn test_bounded() {
        let config = EngineConfig {
            max_log_entries: 2,
            ..EngineConfig::default()
        };
        let log = EventLog::new(&config);
        for path in ["/1", "/2", "/3"] {
            log.add(LogEntry::new(LogEntryType::ReceivedRequest, request().with_path(path)));
        }
        let paths: Vec<_> = log
            .retrieve_requests(None)
            .iter()
            .map(|r| r.path_str().to_string())
            .collect();
        assert_eq!(paths, vec!["/2", "/3"]);
    }

    #[test]
    fn test_recorded_expectations_from_forwards() {
        let log = log();
        log.add(
            LogEntry::new(LogEntryType::ForwardedRequest, request().with_path("/up"))
                .with_response(response().with_status_code(203)),
        );
        log.add(
            LogEntry::new(LogEntryType::ExpectationResponse, request().with_path("/mock"))
                .with_response(response().with_status_code(200)),
        );

        let recorded = log.retrieve_recorded_expectations(None);
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].times, Times::once());
        assert_eq!(
            recorded[0].action,
            Action::Response(response().with_status_code(203))
        );
        assert_eq!(log.retrieve_request_responses(None).len(), 2);
    }
}
