//! Value objects shared by matching, storage and dispatch.
//!
//! # Module Structure
//!
//! - `nottable` - `NottableString` with not/optional/schema flags
//! - `keys` - headers, parameters and cookies collections
//! - `body` - typed bodies (string, regex, JSON, XML, binary, form parameters, ...)
//! - `http_request` - request matcher / inbound request
//! - `http_response` - response returned by actions
//! - `action` - the closed set of actions an expectation can perform
//! - `delay` - time units and delays

pub mod action;
pub mod body;
pub mod delay;
pub mod http_request;
pub mod http_response;
pub mod keys;
pub mod nottable;

pub use action::{
    Action, HttpClassCallback, HttpError, HttpForward, HttpObjectCallback,
    HttpOverrideForwardedRequest, HttpTemplate, TemplateType,
};
pub use body::{Body, BodyKind, MatchType};
pub use delay::{Delay, TimeUnit};
pub use http_request::{request, HttpRequest, Scheme, SocketAddress};
pub use http_response::{response, HttpResponse};
pub use keys::{
    Cookies, Headers, KeyAndValue, KeyMatchStyle, KeyToMultiValue, KeysToMultiValues, Parameters,
};
pub use nottable::{not, optional, schema_string, string, NottableString};
