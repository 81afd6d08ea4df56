//! Executing the action of a matched expectation.
//!
//! Runs after the match decision, outside any store lock. Delays are applied
//! here with `tokio::time::sleep`.
//!
//! # Module Structure
//!
//! - `forward` - `HttpForwarder` and the reqwest implementation
//! - `template` - `TemplateEngine`, the registry and the reference engine
//! - `callback` - embedder callbacks by name or client id

mod callback;
mod forward;
mod template;

pub use callback::{CallbackRegistry, ExpectationResponseCallback};
pub use forward::{HttpForwarder, ReqwestForwarder};
pub use template::{
    has_template_variables, process_template, ReferenceTemplateEngine, TemplateEngine,
    TemplateEngines,
};

use crate::model::{Action, HttpError, HttpForward, HttpRequest, HttpResponse, Scheme};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// What the surrounding server should do with the connection.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Respond(HttpResponse),
    /// The request was sent upstream; `response` is what to return.
    Forwarded {
        request: HttpRequest,
        response: HttpResponse,
    },
    /// Misbehave as described.
    Error(HttpError),
}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("forwarding to {target} failed: {source:#}")]
    Forward {
        target: String,
        source: anyhow::Error,
    },

    #[error("cannot determine where to forward request for {path}")]
    NoForwardTarget { path: String },

    #[error("no template engine registered for {0} templates")]
    NoTemplateEngine(&'static str),

    #[error("template rendering failed: {0:#}")]
    Template(anyhow::Error),

    #[error("no callback registered for {kind} '{name}'")]
    MissingCallback { kind: &'static str, name: String },

    #[error("callback '{name}' failed: {source:#}")]
    Callback { name: String, source: anyhow::Error },
}

/// Dispatches actions to the collaborators that perform them.
pub struct ActionHandler {
    forwarder: Arc<dyn HttpForwarder>,
    templates: TemplateEngines,
    callbacks: Arc<CallbackRegistry>,
}

impl std::fmt::Debug for ActionHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionHandler")
            .field("templates", &self.templates)
            .field("callbacks", &self.callbacks)
            .finish()
    }
}

impl ActionHandler {
    pub fn new(
        forwarder: Arc<dyn HttpForwarder>,
        templates: TemplateEngines,
        callbacks: Arc<CallbackRegistry>,
    ) -> Self {
        Self {
            forwarder,
            templates,
            callbacks,
        }
    }

    pub fn callbacks(&self) -> &Arc<CallbackRegistry> {
        &self.callbacks
    }

    /// Perform `action` for `request`, after the action's delay.
    pub async fn handle(
        &self,
        action: &Action,
        request: &HttpRequest,
    ) -> Result<ActionOutcome, ActionError> {
        if let Some(delay) = action.delay() {
            let duration = delay.duration();
            if !duration.is_zero() {
                debug!(delay_ms = duration.as_millis() as u64, "Delaying action");
                tokio::time::sleep(duration).await;
            }
        }

        match action {
            Action::Response(response) => Ok(ActionOutcome::Respond(response.clone())),
            Action::Forward(target) => {
                let response = self.forward(request, target).await?;
                Ok(ActionOutcome::Forwarded {
                    request: request.clone(),
                    response,
                })
            }
            Action::ForwardOverride(overrides) => {
                let request = match &overrides.request_override {
                    Some(o) => request.with_overrides(o),
                    None => request.clone(),
                };
                let target = forward_target(&request).ok_or_else(|| ActionError::NoForwardTarget {
                    path: request.path_str().to_string(),
                })?;
                let mut response = self.forward(&request, &target).await?;
                if let Some(o) = &overrides.response_override {
                    response = response.with_overrides(o);
                }
                Ok(ActionOutcome::Forwarded { request, response })
            }
            Action::Error(error) => Ok(ActionOutcome::Error(error.clone())),
            Action::ObjectCallback(callback) => {
                let handler = self.callbacks.object(&callback.client_id).ok_or_else(|| {
                    ActionError::MissingCallback {
                        kind: "object callback",
                        name: callback.client_id.clone(),
                    }
                })?;
                let response = handler
                    .handle(request)
                    .await
                    .map_err(|source| ActionError::Callback {
                        name: callback.client_id.clone(),
                        source,
                    })?;
                Ok(ActionOutcome::Respond(response))
            }
            Action::ClassCallback(callback) => {
                let handler = self.callbacks.class(&callback.callback_class).ok_or_else(|| {
                    ActionError::MissingCallback {
                        kind: "class callback",
                        name: callback.callback_class.clone(),
                    }
                })?;
                let response = handler
                    .handle(request)
                    .await
                    .map_err(|source| ActionError::Callback {
                        name: callback.callback_class.clone(),
                        source,
                    })?;
                Ok(ActionOutcome::Respond(response))
            }
            Action::Template(template) => {
                let engine = self
                    .templates
                    .get(template.template_type)
                    .ok_or(ActionError::NoTemplateEngine(template.template_type.as_str()))?;
                let response = engine
                    .render(&template.template, request)
                    .map_err(ActionError::Template)?;
                Ok(ActionOutcome::Respond(response))
            }
        }
    }

    async fn forward(
        &self,
        request: &HttpRequest,
        target: &HttpForward,
    ) -> Result<HttpResponse, ActionError> {
        self.forwarder
            .forward(request, target)
            .await
            .map_err(|source| ActionError::Forward {
                target: format!("{}:{}", target.host, target.port),
                source,
            })
    }
}

/// Upstream for an overridden request: its socket address, else its Host
/// header.
fn forward_target(request: &HttpRequest) -> Option<HttpForward> {
    let default_scheme = if request.secure == Some(true) {
        Scheme::Https
    } else {
        Scheme::Http
    };
    let default_port = |scheme: Scheme| match scheme {
        Scheme::Http => 80,
        Scheme::Https => 443,
    };

    if let Some(address) = &request.socket_address {
        if let Some(host) = address.host.as_deref().filter(|h| !h.is_empty()) {
            let scheme = address.scheme.unwrap_or(default_scheme);
            let port = address.port.unwrap_or_else(|| default_port(scheme));
            return Some(HttpForward::new(host, port, scheme));
        }
    }

    let host = request.first_header("host").filter(|h| !h.is_empty())?;
    let (host, port) = match host.rsplit_once(':') {
        Some((name, port)) => match port.parse::<u16>() {
            Ok(port) => (name, port),
            Err(_) => (host, default_port(default_scheme)),
        },
        None => (host, default_port(default_scheme)),
    };
    Some(HttpForward::new(host, port, default_scheme))
}
