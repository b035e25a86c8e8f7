use crate::runnable::{Affinity, Repeat, Task, TaskSpec};
use crate::task::{NativeTask, TaskHandle};
use std::sync::Arc;

/// The single-loop scheduling API, known at compile time.
///
/// Sync calls run on the host's authoritative tick context, async calls on a
/// background pool. Delays and periods are in ticks. A `None` return means the
/// host refused the work (for example because it is shutting down).
pub trait GlobalScheduler: Send + Sync {
    fn run_task(&self, task: Task) -> Option<Arc<dyn NativeTask>>;

    fn run_task_later(&self, task: Task, delay: u64) -> Option<Arc<dyn NativeTask>>;

    fn run_task_timer(&self, task: Task, delay: u64, period: u64) -> Option<Arc<dyn NativeTask>>;

    fn run_task_async(&self, task: Task) -> Option<Arc<dyn NativeTask>>;

    fn run_task_later_async(&self, task: Task, delay: u64) -> Option<Arc<dyn NativeTask>>;

    fn run_task_timer_async(
        &self,
        task: Task,
        delay: u64,
        period: u64,
    ) -> Option<Arc<dyn NativeTask>>;
}

/// Runs task specs against a [`GlobalScheduler`].
///
/// Entity affinity has no meaning here and is dropped; the task still runs on
/// the authoritative context.
#[derive(Clone)]
pub struct GlobalPath {
    scheduler: Arc<dyn GlobalScheduler>,
}

impl GlobalPath {
    pub fn new(scheduler: Arc<dyn GlobalScheduler>) -> Self {
        Self { scheduler }
    }

    pub fn submit(&self, spec: &TaskSpec) -> TaskHandle {
        let task = spec.task.clone();
        let delay = spec.timing.delay;
        let scheduler = self.scheduler.as_ref();

        let native = match (&spec.affinity, spec.timing.repeat) {
            (Affinity::Async, Repeat::Once) if delay == 0 => scheduler.run_task_async(task),
            (Affinity::Async, Repeat::Once) => scheduler.run_task_later_async(task, delay),
            (Affinity::Async, Repeat::Every(period)) => {
                scheduler.run_task_timer_async(task, delay, period)
            }
            (_, Repeat::Once) if delay == 0 => scheduler.run_task(task),
            (_, Repeat::Once) => scheduler.run_task_later(task, delay),
            (_, Repeat::Every(period)) => scheduler.run_task_timer(task, delay, period),
        };

        TaskHandle::native(native)
    }
}
