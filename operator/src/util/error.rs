use std::time::Duration;

/// The end-to-end error type for the operator core. A public event sink
/// either returns `Ok`, or one of `RetryAfter`/`Permanent` bubbling up
/// through `?` — see `util::Error::into_action`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Kubernetes reported error: {source}")]
    Kube {
        #[from]
        source: kube::Error,
    },

    #[error("Invalid user input: {0}")]
    UserInput(String),

    #[error("Json error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("admin client error: {0}")]
    Admin(#[from] crate::admin::AdminError),

    /// A transient condition the caller should retry after `delay`: mutex
    /// busy, not-yet-ready, recoverable cluster state, or any diagnosis in
    /// the UNCERTAIN family.
    #[error("retry after {delay:?}: {reason}")]
    RetryAfter { delay: Duration, reason: String },

    /// A condition requiring operator intervention: SPLIT_BRAIN, INVALID.
    #[error("permanent failure: {0}")]
    Permanent(String),
}

impl Error {
    pub fn retry_after(delay: Duration, reason: impl Into<String>) -> Error {
        Error::RetryAfter {
            delay,
            reason: reason.into(),
        }
    }

    pub fn permanent(reason: impl Into<String>) -> Error {
        Error::Permanent(reason.into())
    }

    /// Maps this error onto the reconciliation framework's sentinel values
    /// (spec.md §6's "reconciliation framework interface"): retry-later with
    /// a delay, or a fixed short backoff for anything else, since
    /// `Action::await_change()` would otherwise wait forever on a transient
    /// Kubernetes API hiccup.
    pub fn into_action(&self) -> kube::runtime::controller::Action {
        use kube::runtime::controller::Action;
        match self {
            Error::RetryAfter { delay, .. } => Action::requeue(*delay),
            Error::Permanent(_) => Action::await_change(),
            _ => Action::requeue(Duration::from_secs(5)),
        }
    }
}
