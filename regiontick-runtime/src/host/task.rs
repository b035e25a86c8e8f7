use crate::dynamic::{no_such_method, DynObject, Value};
use crate::error::{panic_message, InvokeError};
use crate::runnable::Task;
use crate::task::{NativeTask, TaskState, TaskStatus};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Run a task, keeping a panic from unwinding into the host thread
pub(crate) fn run_guarded(task: &Task, id: u64) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| task.run())) {
        warn!(
            task_id = id,
            reason = %panic_message(payload.as_ref()),
            "Scheduled task panicked"
        );
    }
}

/// Task record shared between a host and the handles it gives out
pub(crate) struct HostTask {
    id: u64,
    state: Arc<TaskState>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl HostTask {
    pub(crate) fn new(id: u64) -> Arc<Self> {
        Arc::new(Self {
            id,
            state: Arc::new(TaskState::new()),
            join: Mutex::new(None),
        })
    }

    pub(crate) fn state(&self) -> &Arc<TaskState> {
        &self.state
    }

    /// Remember the async driver of this task so cancel can stop it early
    pub(crate) fn attach(&self, handle: JoinHandle<()>) {
        if self.state.is_cancelled() {
            handle.abort();
            return;
        }
        *self.join.lock() = Some(handle);
    }
}

impl NativeTask for HostTask {
    fn id(&self) -> u64 {
        self.id
    }

    fn cancel(&self) {
        if self.state.cancel() {
            debug!(task_id = self.id, "Cancelled task");
        }
        if let Some(handle) = self.join.lock().take() {
            handle.abort();
        }
    }

    fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }
}

/// The same task, as handed out through the dynamic layer
pub(crate) struct TaskObject(pub(crate) Arc<HostTask>);

impl DynObject for TaskObject {
    fn type_name(&self) -> &'static str {
        "ScheduledTask"
    }

    fn invoke(&self, method: &str, _args: &[Value]) -> Result<Value, InvokeError> {
        match method {
            "cancel" => {
                let was_live = !matches!(
                    self.0.state.status(),
                    TaskStatus::Completed | TaskStatus::Cancelled
                );
                self.0.cancel();
                Ok(Value::Bool(was_live))
            }
            "is_cancelled" => Ok(Value::Bool(self.0.is_cancelled())),
            "id" => Ok(Value::long(self.0.id)),
            _ => Err(no_such_method(self.type_name(), method)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_object_cancel_reports_first_cancel_only() {
        let task = HostTask::new(9);
        let object = TaskObject(task.clone());

        assert!(matches!(object.invoke("cancel", &[]), Ok(Value::Bool(true))));
        assert!(matches!(object.invoke("cancel", &[]), Ok(Value::Bool(false))));
        assert!(matches!(object.invoke("is_cancelled", &[]), Ok(Value::Bool(true))));
        assert!(matches!(object.invoke("id", &[]), Ok(Value::Long(9))));
        assert!(object.invoke("reschedule", &[]).is_err());
    }

    #[test]
    fn guarded_run_contains_panics() {
        let task: Task = Arc::new(|| panic!("boom"));
        run_guarded(&task, 1);
    }
}
