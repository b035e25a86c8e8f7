use thiserror::Error;

/// Failure while calling into a host through the dynamic capability layer.
///
/// None of these ever reach a caller of the scheduler; they are recorded by
/// the fallback log and the request is re-issued on the global path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvokeError {
    #[error("host does not expose `{name}`")]
    Unresolved { name: String },

    #[error("`{target}` has no method `{method}`")]
    NoSuchMethod { target: String, method: String },

    #[error("`{method}` takes {expected} argument(s), {actual} given")]
    Arity {
        method: String,
        expected: usize,
        actual: usize,
    },

    #[error("argument {index} of `{method}` must be {expected}")]
    ArgumentType {
        method: String,
        index: usize,
        expected: &'static str,
    },

    #[error("`{method}` returned {actual}, expected {expected}")]
    UnexpectedReturn {
        method: String,
        expected: &'static str,
        actual: String,
    },

    #[error("`{method}` rejected the request: {reason}")]
    Rejected { method: String, reason: String },

    #[error("`{method}` panicked: {reason}")]
    Panicked { method: String, reason: String },
}

impl InvokeError {
    pub(crate) fn rejected(method: &str, reason: impl Into<String>) -> Self {
        InvokeError::Rejected {
            method: method.to_string(),
            reason: reason.into(),
        }
    }
}

/// Failure while starting one of the in-process host runtimes.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("failed to build async worker pool")]
    AsyncPool(#[source] std::io::Error),

    #[error("failed to spawn `{name}` thread")]
    Thread {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("host needs at least one region, got {0}")]
    NoRegions(usize),
}

/// Best-effort text of a caught panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
