//! The expectation registry.
//!
//! Entries live in a copy-on-write snapshot ordered for matching (priority
//! descending, then most recently upserted first). Readers clone the `Arc`
//! of the current snapshot and never block each other; mutations build a new
//! vector and swap it in. The only per-entry mutable state is the
//! [`UsageCounter`], so a matcher is never observed half-replaced.

use super::clock::{Clock, SystemClock};
use super::listener::{Cause, ExpectationListener, ListenerId};
use super::usage::{Consumed, UsageCounter};
use crate::config::EngineConfig;
use crate::expectation::{Expectation, ExpectationValidator, ValidationErrors};
use crate::matchers::{HttpRequestPropertiesMatcher, MatchDifference};
use crate::metrics;
use crate::model::HttpRequest;
use parking_lot::{ReentrantMutex, RwLock};
use serde_json::Value;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Lifecycle state of a stored expectation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpectationState {
    Active,
    /// Its last remaining use was consumed.
    Exhausted,
    /// Its time to live elapsed.
    Expired,
}

struct StoredExpectation {
    expectation: Expectation,
    matcher: HttpRequestPropertiesMatcher,
    usage: UsageCounter,
    expires_at: Option<Instant>,
    sequence: u64,
}

impl StoredExpectation {
    fn new(expectation: Expectation, now: Instant, sequence: u64) -> Self {
        let expires_at = expectation
            .time_to_live
            .duration()
            .and_then(|ttl| now.checked_add(ttl));
        Self {
            matcher: HttpRequestPropertiesMatcher::data_plane(&expectation.http_request),
            usage: UsageCounter::new(expectation.times),
            expires_at,
            sequence,
            expectation,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }

    fn is_alive(&self, now: Instant) -> bool {
        self.usage.is_active() && !self.is_expired(now)
    }

    fn state(&self, now: Instant) -> ExpectationState {
        if !self.usage.is_active() {
            ExpectationState::Exhausted
        } else if self.is_expired(now) {
            ExpectationState::Expired
        } else {
            ExpectationState::Active
        }
    }

    /// The stored expectation with its current remaining count.
    fn current(&self) -> Expectation {
        let mut expectation = self.expectation.clone();
        expectation.times = self.usage.times();
        expectation
    }
}

type Snapshot = Arc<Vec<Arc<StoredExpectation>>>;

/// Thread-safe store of expectations with listener notification.
pub struct ExpectationStore {
    entries: RwLock<Snapshot>,
    listeners: RwLock<Vec<(ListenerId, Arc<dyn ExpectationListener>)>>,
    /// Serializes mutate-then-notify; reentrant so listeners can call back in.
    mutation: ReentrantMutex<()>,
    next_sequence: AtomicU64,
    next_listener_id: AtomicU64,
    /// This store's share of the process-wide active gauge.
    reported_active: AtomicUsize,
    clock: Arc<dyn Clock>,
    max_expectations: usize,
    detailed_match_failures: bool,
}

impl std::fmt::Debug for ExpectationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpectationStore")
            .field("entries", &self.entries.read().len())
            .field("listeners", &self.listeners.read().len())
            .field("max_expectations", &self.max_expectations)
            .finish()
    }
}

impl ExpectationStore {
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &EngineConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(Arc::new(Vec::new())),
            listeners: RwLock::new(Vec::new()),
            mutation: ReentrantMutex::new(()),
            next_sequence: AtomicU64::new(0),
            next_listener_id: AtomicU64::new(0),
            reported_active: AtomicUsize::new(0),
            clock,
            max_expectations: config.max_expectations,
            detailed_match_failures: config.detailed_match_failures,
        }
    }

    fn snapshot(&self) -> Snapshot {
        Arc::clone(&self.entries.read())
    }

    /// Insert or replace (by id) one expectation, returning its id.
    pub fn upsert(&self, expectation: Expectation) -> Result<String, ValidationErrors> {
        self.upsert_with_cause(expectation, Cause::Api)
    }

    pub fn upsert_with_cause(
        &self,
        expectation: Expectation,
        cause: Cause,
    ) -> Result<String, ValidationErrors> {
        ExpectationValidator::validate(&expectation)?;
        let _guard = self.mutation.lock();
        let mut ids = self.apply_upserts(vec![expectation], cause);
        self.notify(cause);
        Ok(ids.remove(0))
    }

    /// Validate and upsert an expectation object or array of them.
    ///
    /// Nothing is stored unless every element is valid; listeners are
    /// notified once for the whole batch.
    pub fn upsert_json(&self, value: &Value) -> Result<Vec<String>, ValidationErrors> {
        self.upsert_json_with_cause(value, Cause::Api)
    }

    pub fn upsert_json_with_cause(
        &self,
        value: &Value,
        cause: Cause,
    ) -> Result<Vec<String>, ValidationErrors> {
        let expectations = ExpectationValidator::validate_json_batch(value)?;
        let _guard = self.mutation.lock();
        let ids = self.apply_upserts(expectations, cause);
        self.notify(cause);
        Ok(ids)
    }

    fn apply_upserts(&self, expectations: Vec<Expectation>, cause: Cause) -> Vec<String> {
        let now = self.clock.now();
        let mut ids = Vec::with_capacity(expectations.len());
        let mut entries = self.entries.write();
        let mut next: Vec<Arc<StoredExpectation>> = entries.iter().cloned().collect();

        for mut expectation in expectations {
            if expectation.id.is_empty() {
                expectation.id = uuid::Uuid::new_v4().to_string();
            }
            let id = expectation.id.clone();

            if let Some(pos) = next.iter().position(|e| e.expectation.id == id) {
                let replaced = next.remove(pos);
                replaced.usage.retire();
                debug!(id = %id, "Replacing expectation");
            } else {
                debug!(id = %id, "Adding expectation");
            }

            let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
            next.push(Arc::new(StoredExpectation::new(expectation, now, sequence)));
            metrics::record_expectation_upserted(cause.as_str());
            ids.push(id);

            while next.len() > self.max_expectations {
                let Some(oldest) = next
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, e)| e.sequence)
                    .map(|(i, _)| i)
                else {
                    break;
                };
                let evicted = next.remove(oldest);
                evicted.usage.retire();
                warn!(
                    id = %evicted.expectation.id,
                    max_expectations = self.max_expectations,
                    "Expectation limit reached, evicting oldest expectation"
                );
            }
        }

        sort_for_matching(&mut next);
        *entries = Arc::new(next);
        drop(entries);

        self.refresh_active_gauge(now);
        ids
    }

    /// First live expectation matching `request`, consuming one of its uses.
    ///
    /// The returned expectation carries the remaining count after this match.
    pub fn match_request(&self, request: &HttpRequest) -> Option<Expectation> {
        self.select(request, false).0
    }

    /// Like [`match_request`](Self::match_request), and on a miss also the
    /// difference against the closest live expectation (when enabled).
    pub fn first_matching_expectation_with_difference(
        &self,
        request: &HttpRequest,
    ) -> (Option<Expectation>, Option<MatchDifference>) {
        self.select(request, self.detailed_match_failures)
    }

    fn select(
        &self,
        request: &HttpRequest,
        diagnose: bool,
    ) -> (Option<Expectation>, Option<MatchDifference>) {
        let started = Instant::now();
        let now = self.clock.now();
        let snapshot = self.snapshot();
        let mut nearest: Option<MatchDifference> = None;

        for entry in snapshot.iter() {
            if !entry.is_alive(now) {
                continue;
            }
            if entry.matcher.matches(None, request) {
                // Finite counts are consumed under `mutation` so that an
                // exhaustion is ordered with concurrent clears and upserts.
                let _guard = entry
                    .usage
                    .remaining()
                    .is_some()
                    .then(|| self.mutation.lock());
                let Some(consumed) = entry.usage.try_consume() else {
                    // Lost the race for the last use.
                    continue;
                };
                let matched = entry.current();
                debug!(
                    id = %matched.id,
                    action = matched.action.kind(),
                    "Request matched expectation"
                );
                metrics::record_match_duration(true, started.elapsed());
                if consumed == Consumed::Remaining(0) {
                    self.on_exhausted(entry, now);
                }
                return (Some(matched), None);
            }
            if diagnose {
                let mut difference = MatchDifference::for_expectation(&entry.expectation.id);
                entry.matcher.matches(Some(&mut difference), request);
                if nearest.as_ref().map_or(true, |n| difference.len() < n.len()) {
                    nearest = Some(difference);
                }
            }
        }

        metrics::record_match_duration(false, started.elapsed());
        (None, nearest)
    }

    fn on_exhausted(&self, entry: &StoredExpectation, now: Instant) {
        info!(id = %entry.expectation.id, "Expectation exhausted");
        metrics::record_expectation_exhausted(entry.expectation.action.kind());
        let _guard = self.mutation.lock();
        self.refresh_active_gauge(now);
        self.notify(Cause::Api);
    }

    /// Expectations still eligible to match, in insertion order.
    ///
    /// `filter` selects expectations whose request matcher overlaps it;
    /// `None` selects all.
    pub fn retrieve_active_expectations(&self, filter: Option<&HttpRequest>) -> Vec<Expectation> {
        let now = self.clock.now();
        self.retrieve(filter, |e| e.is_alive(now))
    }

    /// Every retained expectation, including exhausted and expired ones.
    pub fn retrieve_all_expectations(&self, filter: Option<&HttpRequest>) -> Vec<Expectation> {
        self.retrieve(filter, |_| true)
    }

    fn retrieve(
        &self,
        filter: Option<&HttpRequest>,
        keep: impl Fn(&StoredExpectation) -> bool,
    ) -> Vec<Expectation> {
        let selector = filter.map(HttpRequestPropertiesMatcher::control_plane);
        let snapshot = self.snapshot();
        let mut selected: Vec<&Arc<StoredExpectation>> = snapshot
            .iter()
            .filter(|e| keep(e))
            .filter(|e| {
                selector
                    .as_ref()
                    .map_or(true, |s| s.matches(None, &e.expectation.http_request))
            })
            .collect();
        selected.sort_by_key(|e| e.sequence);
        selected.into_iter().map(|e| e.current()).collect()
    }

    pub fn state(&self, id: &str) -> Option<ExpectationState> {
        let now = self.clock.now();
        self.snapshot()
            .iter()
            .find(|e| e.expectation.id == id)
            .map(|e| e.state(now))
    }

    /// Remove every expectation whose request matcher overlaps `filter`
    /// (`None` removes all). Returns the number removed; listeners are only
    /// notified when something was.
    pub fn clear(&self, filter: Option<&HttpRequest>) -> usize {
        let selector = filter.map(HttpRequestPropertiesMatcher::control_plane);
        let _guard = self.mutation.lock();
        let removed = self.remove_where(|e| {
            selector
                .as_ref()
                .map_or(true, |s| s.matches(None, &e.expectation.http_request))
        });
        if removed > 0 {
            debug!(removed, "Cleared expectations");
            self.notify(Cause::Api);
        }
        removed
    }

    /// Remove the expectation with `id`, returning whether it existed.
    pub fn clear_by_id(&self, id: &str) -> bool {
        let _guard = self.mutation.lock();
        let removed = self.remove_where(|e| e.expectation.id == id) > 0;
        if removed {
            self.notify(Cause::Api);
        }
        removed
    }

    /// Remove all expectations.
    pub fn reset(&self) {
        let _guard = self.mutation.lock();
        self.remove_where(|_| true);
        info!("Expectations reset");
        self.notify(Cause::Api);
    }

    fn remove_where(&self, remove: impl Fn(&StoredExpectation) -> bool) -> usize {
        let mut entries = self.entries.write();
        let (removed, kept): (Vec<_>, Vec<_>) =
            entries.iter().cloned().partition(|e| remove(e));
        for entry in &removed {
            entry.usage.retire();
        }
        *entries = Arc::new(kept);
        drop(entries);
        self.refresh_active_gauge(self.clock.now());
        removed.len()
    }

    /// Number of expectations currently eligible to match.
    pub fn size(&self) -> usize {
        let now = self.clock.now();
        self.snapshot().iter().filter(|e| e.is_alive(now)).count()
    }

    pub fn register_listener(&self, listener: Arc<dyn ExpectationListener>) -> ListenerId {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        id
    }

    pub fn unregister_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Call every listener registered at this point, isolating failures.
    ///
    /// Callers hold `mutation`, so notifications follow mutation order.
    fn notify(&self, cause: Cause) {
        let listeners: Vec<_> = self
            .listeners
            .read()
            .iter()
            .map(|(id, l)| (*id, Arc::clone(l)))
            .collect();
        for (id, listener) in listeners {
            match catch_unwind(AssertUnwindSafe(|| listener.updated(self, cause))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(listener = id.0, cause = cause.as_str(), "Expectation listener failed: {e:#}");
                }
                Err(_) => {
                    error!(listener = id.0, cause = cause.as_str(), "Expectation listener panicked");
                }
            }
        }
    }

    fn refresh_active_gauge(&self, now: Instant) {
        let active = self
            .entries
            .read()
            .iter()
            .filter(|e| e.is_alive(now))
            .count();
        let previous = self.reported_active.swap(active, Ordering::AcqRel);
        metrics::adjust_active_expectations(active as i64 - previous as i64);
    }
}

impl Drop for ExpectationStore {
    fn drop(&mut self) {
        let reported = self.reported_active.load(Ordering::Acquire);
        metrics::adjust_active_expectations(-(reported as i64));
    }
}

/// Priority descending, then most recently upserted first.
fn sort_for_matching(entries: &mut [Arc<StoredExpectation>]) {
    entries.sort_by(|a, b| {
        b.expectation
            .priority
            .cmp(&a.expectation.priority)
            .then(b.sequence.cmp(&a.sequence))
    });
}
