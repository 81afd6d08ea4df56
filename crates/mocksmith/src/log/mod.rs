//! Event log of received requests, matches and responses.
//!
//! # Module Structure
//!
//! - `entry` - `LogEntry` and its types
//! - `event_log` - bounded store with filtered retrieval and soft deletion

mod entry;
mod event_log;

pub use entry::{HttpRequestAndHttpResponse, LogEntry, LogEntryType};
pub use event_log::EventLog;
