use super::fallback::{FallbackLog, OperationKind};
use super::global::GlobalPath;
use super::region::RegionApi;
use crate::dynamic::Entity;
use crate::error::{panic_message, InvokeError};
use crate::probe::Capability;
use crate::runnable::{Runnable, TaskSpec};
use crate::task::TaskHandle;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::trace;

/// Entry point for all scheduling.
///
/// Picks the region path when the host has one and falls back to the global
/// path for any single request the region path fails. Every method returns a
/// handle immediately and none of them report an error: a request that could
/// not be scheduled anywhere yields a detached handle.
///
/// ```no_run
/// use regiontick_runtime::{GlobalLoop, HostSettings, SchedulerBuilder};
/// use std::sync::Arc;
///
/// let host = Arc::new(GlobalLoop::new(&HostSettings::default()).unwrap());
/// let scheduler = SchedulerBuilder::new(host.clone()).build();
///
/// let heartbeat = scheduler.run_timer(|| println!("tick"), 0, 20);
/// host.advance(100);
/// heartbeat.cancel();
/// ```
#[derive(Clone)]
pub struct Scheduler {
    pub(crate) capability: Capability,
    pub(crate) global: GlobalPath,
    pub(crate) region: Option<Arc<dyn RegionApi>>,
    pub(crate) fallbacks: Arc<FallbackLog>,
}

impl Scheduler {
    pub fn capability(&self) -> Capability {
        self.capability
    }

    pub fn fallbacks(&self) -> &FallbackLog {
        &self.fallbacks
    }

    pub fn submit(&self, spec: TaskSpec) -> TaskHandle {
        let region = match &self.region {
            Some(region) if self.capability.is_region_threaded() => region,
            _ => return self.global.submit(&spec),
        };

        let kind = OperationKind::of(&spec);
        let attempt = panic::catch_unwind(AssertUnwindSafe(|| region.dispatch(&spec)))
            .unwrap_or_else(|payload| {
                Err(InvokeError::Panicked {
                    method: kind.to_string(),
                    reason: panic_message(payload.as_ref()),
                })
            });

        match attempt {
            Ok(handle) => {
                trace!(operation = %kind, "Scheduled on region path");
                handle
            }
            Err(error) => {
                self.fallbacks.record(kind, &error);
                self.global.submit(&spec)
            }
        }
    }

    /// Run on the authoritative context at the next opportunity
    pub fn run_now<R>(&self, task: R) -> TaskHandle
    where
        R: Runnable + 'static,
    {
        self.submit(TaskSpec::builder(task).build())
    }

    /// Same as [`run_now`](Self::run_now)
    pub fn run_sync<R>(&self, task: R) -> TaskHandle
    where
        R: Runnable + 'static,
    {
        self.run_now(task)
    }

    pub fn run_later<R>(&self, task: R, delay: u64) -> TaskHandle
    where
        R: Runnable + 'static,
    {
        self.submit(TaskSpec::builder(task).delay(delay).build())
    }

    /// A zero period schedules the task once
    pub fn run_timer<R>(&self, task: R, delay: u64, period: u64) -> TaskHandle
    where
        R: Runnable + 'static,
    {
        self.submit(TaskSpec::builder(task).delay(delay).period(period).build())
    }

    pub fn run_async<R>(&self, task: R) -> TaskHandle
    where
        R: Runnable + 'static,
    {
        self.submit(TaskSpec::builder(task).asynchronous().build())
    }

    pub fn run_async_later<R>(&self, task: R, delay: u64) -> TaskHandle
    where
        R: Runnable + 'static,
    {
        self.submit(TaskSpec::builder(task).asynchronous().delay(delay).build())
    }

    /// Background work every `period` ticks, converted to wall-clock time
    pub fn run_async_repeating<R>(&self, task: R, delay: u64, period: u64) -> TaskHandle
    where
        R: Runnable + 'static,
    {
        self.submit(
            TaskSpec::builder(task)
                .asynchronous()
                .delay(delay)
                .period(period)
                .build(),
        )
    }

    pub fn run_at_entity_now<R>(&self, entity: &Entity, task: R) -> TaskHandle
    where
        R: Runnable + 'static,
    {
        self.submit(TaskSpec::builder(task).at_entity(entity.clone()).build())
    }

    pub fn run_at_entity_later<R>(&self, entity: &Entity, task: R, delay: u64) -> TaskHandle
    where
        R: Runnable + 'static,
    {
        self.submit(
            TaskSpec::builder(task)
                .at_entity(entity.clone())
                .delay(delay)
                .build(),
        )
    }

    pub fn run_at_entity_timer<R>(
        &self,
        entity: &Entity,
        task: R,
        delay: u64,
        period: u64,
    ) -> TaskHandle
    where
        R: Runnable + 'static,
    {
        self.submit(
            TaskSpec::builder(task)
                .at_entity(entity.clone())
                .delay(delay)
                .period(period)
                .build(),
        )
    }
}
