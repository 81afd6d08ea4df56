//! Expectation storage and lifecycle.
//!
//! # Module Structure
//!
//! - `registry` - `ExpectationStore`: upsert, match, retrieve, clear
//! - `usage` - atomic remaining-use counter
//! - `listener` - change notification
//! - `clock` - time source for TTL expiry

mod clock;
mod listener;
mod registry;
mod usage;


pub use clock::{Clock, ManualClock, SystemClock};
pub use listener::{Cause, ExpectationListener, ListenerId};
pub use registry::{ExpectationState, ExpectationStore};
pub use usage::{Consumed, UsageCounter};
