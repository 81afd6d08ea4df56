//! Expectations: a request matcher, one action and scheduling metadata.
//!
//! # Module Structure
//!
//! - `model` - the `Expectation` entity, its builder and JSON form
//! - `times` - remaining match count
//! - `ttl` - time to live
//! - `validation` - exhaustive validation of typed and JSON expectations

mod model;
mod times;
mod ttl;
mod validation;

pub use model::Expectation;
pub use times::Times;
pub use ttl::TimeToLive;
pub use validation::{ExpectationValidator, ValidationError, ValidationErrors};
