// Library exports for embedding the engine in a mock server and for benchmarking

// ===== Value objects =====
pub mod model;

// ===== Matching =====
pub mod matchers;

// ===== Expectation lifecycle =====
pub mod expectation;
pub mod log;
pub mod store;

// ===== Action dispatch =====
pub mod action;
pub mod state;

// ===== Ambient =====
pub mod config;
pub mod logging;
pub mod metrics;

pub use config::EngineConfig;
pub use expectation::{Expectation, TimeToLive, Times, ValidationError, ValidationErrors};
pub use model::{
    not, optional, request, response, schema_string, string, Action, Body, HttpRequest,
    HttpResponse, NottableString,
};
pub use state::{ClearType, HandleOutcome, HttpState};
pub use store::{Cause, ExpectationListener, ExpectationStore};
