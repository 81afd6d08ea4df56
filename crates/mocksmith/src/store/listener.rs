//! Observers notified after every store mutation.

use super::ExpectationStore;

/// Why the store changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cause {
    /// A caller of the public API (administrative endpoint, client).
    Api,
    /// Loading at startup, e.g. from a file initializer.
    Initialization,
}

impl Cause {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cause::Api => "api",
            Cause::Initialization => "initialization",
        }
    }
}

/// Invoked synchronously after each mutation, in mutation order.
///
/// Listeners may read the store (and even mutate it) from inside
/// `updated`. An error or panic is logged and does not affect the mutation
/// or other listeners.
pub trait ExpectationListener: Send + Sync {
    fn updated(&self, store: &ExpectationStore, cause: Cause) -> anyhow::Result<()>;
}

impl<F> ExpectationListener for F
where
    F: Fn(&ExpectationStore, Cause) -> anyhow::Result<()> + Send + Sync,
{
    fn updated(&self, store: &ExpectationStore, cause: Cause) -> anyhow::Result<()> {
        self(store, cause)
    }
}

/// Handle returned by `register_listener`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);
