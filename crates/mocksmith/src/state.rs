//! Request handling façade over the store, the event log and action
//! dispatch.
//!
//! A transport decodes an inbound request into an [`HttpRequest`], calls
//! [`HttpState::handle`] and writes back whatever [`HandleOutcome`] says.

use crate::action::{
    ActionHandler, ActionOutcome, CallbackRegistry, HttpForwarder, ReqwestForwarder,
    TemplateEngines,
};
use crate::config::EngineConfig;
use crate::expectation::{Expectation, ValidationErrors};
use crate::log::{EventLog, LogEntry, LogEntryType};
use crate::matchers::MatchDifference;
use crate::metrics;
use crate::model::{HttpError, HttpRequest, HttpResponse};
use crate::store::ExpectationStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What `clear` removes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClearType {
    #[default]
    All,
    Log,
    Expectations,
}

/// Result of handling one inbound request.
#[derive(Debug, Clone, PartialEq)]
pub enum HandleOutcome {
    Responded(HttpResponse),
    /// Misbehave at the connection level.
    Error(HttpError),
    /// Nothing matched, or the matched action failed.
    NotFound {
        response: HttpResponse,
        difference: Option<MatchDifference>,
    },
}

impl HandleOutcome {
    pub fn response(&self) -> Option<&HttpResponse> {
        match self {
            HandleOutcome::Responded(response) | HandleOutcome::NotFound { response, .. } => {
                Some(response)
            }
            HandleOutcome::Error(_) => None,
        }
    }
}

#[derive(Debug)]
pub struct HttpState {
    store: Arc<ExpectationStore>,
    log: Arc<EventLog>,
    actions: ActionHandler,
}

impl HttpState {
    /// State with the built-in forwarder and template engines.
    pub fn new(config: EngineConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let forwarder = Arc::new(ReqwestForwarder::new(config.forward_timeout())?);
        Ok(Self::with_collaborators(
            config,
            forwarder,
            TemplateEngines::default(),
            Arc::new(CallbackRegistry::new()),
        ))
    }

    pub fn with_collaborators(
        config: EngineConfig,
        forwarder: Arc<dyn HttpForwarder>,
        templates: TemplateEngines,
        callbacks: Arc<CallbackRegistry>,
    ) -> Self {
        Self {
            store: Arc::new(ExpectationStore::new(&config)),
            log: Arc::new(EventLog::new(&config)),
            actions: ActionHandler::new(forwarder, templates, callbacks),
        }
    }

    pub fn store(&self) -> &Arc<ExpectationStore> {
        &self.store
    }

    pub fn log(&self) -> &Arc<EventLog> {
        &self.log
    }

    pub fn callbacks(&self) -> &Arc<CallbackRegistry> {
        self.actions.callbacks()
    }

    pub fn upsert(&self, expectation: Expectation) -> Result<String, ValidationErrors> {
        self.store.upsert(expectation)
    }

    pub fn upsert_json(&self, value: &Value) -> Result<Vec<String>, ValidationErrors> {
        self.store.upsert_json(value)
    }

    /// Match `request`, run the action and log every step.
    pub async fn handle(&self, request: &HttpRequest) -> HandleOutcome {
        self.log
            .add(LogEntry::new(LogEntryType::ReceivedRequest, request.clone()));

        let (matched, difference) = self.store.first_matching_expectation_with_difference(request);
        let Some(expectation) = matched else {
            info!(
                method = request.method_str(),
                path = request.path_str(),
                "No expectation matched request"
            );
            if let Some(difference) = &difference {
                debug!("{difference}");
            }
            metrics::record_request("not_found");
            return self.not_found(request, difference);
        };

        self.log.add(
            LogEntry::new(LogEntryType::ExpectationMatched, request.clone())
                .with_expectation_id(&expectation.id),
        );

        match self.actions.handle(&expectation.action, request).await {
            Ok(ActionOutcome::Respond(response)) => {
                metrics::record_request(expectation.action.kind());
                self.log.add(
                    LogEntry::new(LogEntryType::ExpectationResponse, request.clone())
                        .with_response(response.clone())
                        .with_expectation_id(&expectation.id),
                );
                HandleOutcome::Responded(response)
            }
            Ok(ActionOutcome::Forwarded {
                request: forwarded,
                response,
            }) => {
                metrics::record_request(expectation.action.kind());
                self.log.add(
                    LogEntry::new(LogEntryType::ForwardedRequest, forwarded)
                        .with_response(response.clone())
                        .with_expectation_id(&expectation.id),
                );
                HandleOutcome::Responded(response)
            }
            Ok(ActionOutcome::Error(error)) => {
                metrics::record_request(expectation.action.kind());
                HandleOutcome::Error(error)
            }
            Err(e) => {
                warn!(id = %expectation.id, action = expectation.action.kind(), "Action failed: {e}");
                metrics::record_request("action_failed");
                self.not_found(request, None)
            }
        }
    }

    fn not_found(&self, request: &HttpRequest, difference: Option<MatchDifference>) -> HandleOutcome {
        let response = HttpResponse::not_found();
        self.log.add(
            LogEntry::new(LogEntryType::NoMatchResponse, request.clone())
                .with_response(response.clone()),
        );
        HandleOutcome::NotFound {
            response,
            difference,
        }
    }

    pub fn retrieve_requests(&self, filter: Option<&HttpRequest>) -> Vec<HttpRequest> {
        self.log.retrieve_requests(filter)
    }

    pub fn retrieve_recorded_expectations(&self, filter: Option<&HttpRequest>) -> Vec<Expectation> {
        self.log.retrieve_recorded_expectations(filter)
    }

    pub fn retrieve_active_expectations(&self, filter: Option<&HttpRequest>) -> Vec<Expectation> {
        self.store.retrieve_active_expectations(filter)
    }

    /// Remove expectations and/or log entries whose request satisfies
    /// `filter` (`None` removes everything of that type).
    pub fn clear(&self, filter: Option<&HttpRequest>, clear_type: ClearType) {
        if matches!(clear_type, ClearType::All | ClearType::Expectations) {
            self.store.clear(filter);
        }
        if matches!(clear_type, ClearType::All | ClearType::Log) {
            self.log.clear(filter);
        }
    }

    /// Drop all expectations and the whole log.
    pub fn reset(&self) {
        self.store.reset();
        self.log.reset();
        info!("State reset");
    }
}
