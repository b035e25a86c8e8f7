use crate::dynamic::Value;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// A task object whose cancel operation is known at compile time
pub trait NativeTask: Send + Sync {
    fn id(&self) -> u64;

    /// Must be idempotent and must not fail on a finished task.
    fn cancel(&self);

    fn is_cancelled(&self) -> bool;
}

/// Which backend produced a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleBackend {
    /// A native task from the global scheduler
    Global,
    /// A task object obtained through dynamic invocation
    Region,
    /// Nothing was scheduled; cancel does nothing
    Detached,
}

#[derive(Clone)]
enum Inner {
    Native(Option<Arc<dyn NativeTask>>),
    Dynamic(Option<Value>),
}

/// Cancellable reference to a submitted task.
///
/// The contract is the same whichever backend ran the request: `cancel` never
/// fails, cancelling a finished task does nothing, and cancelling twice is the
/// same as cancelling once. Cancellation is best effort; a run that already
/// started on its owning thread still completes.
#[derive(Clone)]
pub struct TaskHandle {
    inner: Inner,
}

impl TaskHandle {
    pub fn native(task: Option<Arc<dyn NativeTask>>) -> Self {
        Self {
            inner: Inner::Native(task),
        }
    }

    pub fn dynamic(task: Option<Value>) -> Self {
        Self {
            inner: Inner::Dynamic(task),
        }
    }

    /// A handle for a request that scheduled nothing
    pub fn detached() -> Self {
        Self::native(None)
    }

    pub fn cancel(&self) {
        match &self.inner {
            Inner::Native(Some(task)) => task.cancel(),
            Inner::Native(None) => {}
            Inner::Dynamic(Some(Value::Object(task))) => {
                // finished or foreign-shaped tasks may refuse or even panic;
                // either way there is nothing left to cancel
                let _ = panic::catch_unwind(AssertUnwindSafe(|| task.invoke("cancel", &[])));
            }
            Inner::Dynamic(_) => {}
        }
    }

    pub fn backend(&self) -> HandleBackend {
        match &self.inner {
            Inner::Native(Some(_)) => HandleBackend::Global,
            Inner::Dynamic(Some(value)) if !value.is_unit() => HandleBackend::Region,
            _ => HandleBackend::Detached,
        }
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Inner::Native(Some(task)) => f
                .debug_struct("TaskHandle")
                .field("backend", &"global")
                .field("id", &task.id())
                .field("cancelled", &task.is_cancelled())
                .finish(),
            Inner::Dynamic(Some(value)) => f
                .debug_struct("TaskHandle")
                .field("backend", &"region")
                .field("task", value)
                .finish(),
            _ => f
                .debug_struct("TaskHandle")
                .field("backend", &"detached")
                .finish(),
        }
    }
}
