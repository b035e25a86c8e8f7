use crate::dynamic::{DynObject, Entity, HostSurface, Value};
use crate::error::{panic_message, InvokeError};
use crate::probe::{ASYNC_SCHEDULER, GLOBAL_REGION_SCHEDULER};
use crate::runnable::{Affinity, Repeat, Task, TaskSpec, Timing};
use crate::task::TaskHandle;
use crate::time_unit::{ticks_to_millis, TimeUnit};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// The handful of region-threaded operations the scheduler needs.
///
/// Every call can fail; the orchestrator answers a failure by re-issuing the
/// request on the global path.
pub trait RegionApi: Send + Sync {
    /// Work that belongs to no entity, on the host's global region
    fn run_global(&self, task: Task, timing: Timing) -> Result<TaskHandle, InvokeError>;

    /// Work bound to `entity`, on whichever worker owns it when it runs.
    /// `retired` runs instead if the entity is removed first.
    fn run_at_entity(
        &self,
        entity: &Entity,
        task: Task,
        retired: Task,
        timing: Timing,
    ) -> Result<TaskHandle, InvokeError>;

    fn run_async(&self, task: Task, timing: Timing) -> Result<TaskHandle, InvokeError>;

    fn dispatch(&self, spec: &TaskSpec) -> Result<TaskHandle, InvokeError> {
        match &spec.affinity {
            Affinity::Global => self.run_global(spec.task.clone(), spec.timing),
            Affinity::Entity(entity) => self.run_at_entity(
                entity,
                spec.task.clone(),
                spec.retired_callback(),
                spec.timing,
            ),
            Affinity::Async => self.run_async(spec.task.clone(), spec.timing),
        }
    }
}

/// [`RegionApi`] reached by name through a [`HostSurface`].
///
/// Region hosts count delays from the next tick, so a zero initial delay on a
/// repeating task is sent as one tick. Async delays are sent in milliseconds.
pub struct DynamicRegionApi {
    surface: Arc<dyn HostSurface>,
}

impl DynamicRegionApi {
    pub fn new(surface: Arc<dyn HostSurface>) -> Self {
        Self { surface }
    }

    fn service(&self, name: &str) -> Result<Arc<dyn DynObject>, InvokeError> {
        let operation = self
            .surface
            .resolve(name)
            .ok_or_else(|| InvokeError::Unresolved {
                name: name.to_string(),
            })?;
        expect_object(name, operation()?)
    }
}

fn expect_object(method: &str, value: Value) -> Result<Arc<dyn DynObject>, InvokeError> {
    match value {
        Value::Object(object) => Ok(object),
        other => Err(InvokeError::UnexpectedReturn {
            method: method.to_string(),
            expected: "an object",
            actual: other.shape(),
        }),
    }
}

fn task_handle(method: &str, value: Value) -> Result<TaskHandle, InvokeError> {
    let task = expect_object(method, value)?;
    Ok(TaskHandle::dynamic(Some(Value::Object(task))))
}

fn millis(ticks: u64) -> Value {
    Value::long(ticks_to_millis(ticks))
}

impl RegionApi for DynamicRegionApi {
    fn run_global(&self, task: Task, timing: Timing) -> Result<TaskHandle, InvokeError> {
        let scheduler = self.service(GLOBAL_REGION_SCHEDULER)?;
        let task = Value::Task(task);

        let (method, args) = match timing.repeat {
            Repeat::Once if timing.delay == 0 => ("run", vec![task]),
            Repeat::Once => ("run_delayed", vec![task, Value::long(timing.delay)]),
            Repeat::Every(period) => (
                "run_at_fixed_rate",
                vec![task, Value::long(timing.delay.max(1)), Value::long(period)],
            ),
        };

        trace!(method, "Invoking global region scheduler");
        task_handle(method, scheduler.invoke(method, &args)?)
    }

    fn run_at_entity(
        &self,
        entity: &Entity,
        task: Task,
        retired: Task,
        timing: Timing,
    ) -> Result<TaskHandle, InvokeError> {
        let scheduler = expect_object("scheduler", entity.object().invoke("scheduler", &[])?)?;
        let mut args = vec![Value::Task(task), Value::Task(retired.clone())];

        let method = match timing.repeat {
            Repeat::Once if timing.delay == 0 => "run",
            Repeat::Once => {
                args.push(Value::long(timing.delay));
                "run_delayed"
            }
            Repeat::Every(period) => {
                args.push(Value::long(timing.delay.max(1)));
                args.push(Value::long(period));
                "run_at_fixed_rate"
            }
        };

        trace!(method, ?entity, "Invoking entity scheduler");
        match scheduler.invoke(method, &args)? {
            Value::Unit => {
                debug!(?entity, "Entity already retired, running its retired callback");
                // the entity is gone whatever the callback does
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| retired.run())) {
                    warn!(
                        ?entity,
                        reason = %panic_message(payload.as_ref()),
                        "Retired callback panicked"
                    );
                }
                Ok(TaskHandle::detached())
            }
            returned => task_handle(method, returned),
        }
    }

    fn run_async(&self, task: Task, timing: Timing) -> Result<TaskHandle, InvokeError> {
        let scheduler = self.service(ASYNC_SCHEDULER)?;
        let task = Value::Task(task);
        let unit = Value::TimeUnit(TimeUnit::Milliseconds);

        let (method, args) = match timing.repeat {
            Repeat::Once if timing.delay == 0 => ("run_now", vec![task]),
            Repeat::Once => ("run_delayed", vec![task, millis(timing.delay), unit]),
            Repeat::Every(period) => (
                "run_at_fixed_rate",
                vec![task, millis(timing.delay), millis(period), unit],
            ),
        };

        trace!(method, "Invoking async scheduler");
        task_handle(method, scheduler.invoke(method, &args)?)
    }
}
