use super::RegionInner;
use crate::dynamic::{no_such_method, Args, DynObject, Value};
use crate::error::InvokeError;
use crate::host::task::{HostTask, TaskObject};
use std::sync::Arc;
use std::time::Duration;

fn task_value(record: Arc<HostTask>) -> Value {
    Value::object(TaskObject(record))
}

fn at_least_one(method: &str, what: &str, value: i64) -> Result<u64, InvokeError> {
    u64::try_from(value)
        .ok()
        .filter(|ticks| *ticks >= 1)
        .ok_or_else(|| {
            InvokeError::rejected(method, format!("{what} must be at least 1 tick, got {value}"))
        })
}

fn non_negative(method: &str, what: &str, value: i64) -> Result<u64, InvokeError> {
    u64::try_from(value)
        .map_err(|_| InvokeError::rejected(method, format!("{what} must not be negative, got {value}")))
}

/// Scheduler for work that belongs to no region
pub(super) struct GlobalRegionSchedulerObject {
    pub(super) host: Arc<RegionInner>,
}

impl DynObject for GlobalRegionSchedulerObject {
    fn type_name(&self) -> &'static str {
        "GlobalRegionScheduler"
    }

    fn invoke(&self, method: &str, args: &[Value]) -> Result<Value, InvokeError> {
        let (task, delay, period) = match method {
            "run" => {
                let args = Args::new(method, args).exact(1)?;
                (args.task(0)?, 1, None)
            }
            "run_delayed" => {
                let args = Args::new(method, args).exact(2)?;
                (args.task(0)?, at_least_one(method, "delay", args.long(1)?)?, None)
            }
            "run_at_fixed_rate" => {
                let args = Args::new(method, args).exact(3)?;
                (
                    args.task(0)?,
                    at_least_one(method, "initial delay", args.long(1)?)?,
                    Some(at_least_one(method, "period", args.long(2)?)?),
                )
            }
            _ => return Err(no_such_method(self.type_name(), method)),
        };

        let record = self.host.schedule_global(method, task, delay, period)?;
        Ok(task_value(record))
    }
}

/// Entity as seen through the dynamic layer
pub(super) struct RegionEntity {
    pub(super) host: Arc<RegionInner>,
    pub(super) id: u64,
}

impl DynObject for RegionEntity {
    fn type_name(&self) -> &'static str {
        "Entity"
    }

    fn invoke(&self, method: &str, args: &[Value]) -> Result<Value, InvokeError> {
        Args::new(method, args).exact(0)?;
        match method {
            "id" => Ok(Value::long(self.id)),
            "is_valid" => Ok(Value::Bool(
                self.host
                    .entity_record(self.id, |record| !record.removed)
                    .unwrap_or(false),
            )),
            "region" => Ok(self
                .host
                .entity_record(self.id, |record| (!record.removed).then_some(record.region))
                .flatten()
                .map(|region| Value::long(region as u64))
                .unwrap_or(Value::Unit)),
            "scheduler" => Ok(Value::object(EntitySchedulerObject {
                host: self.host.clone(),
                entity: self.id,
            })),
            _ => Err(no_such_method(self.type_name(), method)),
        }
    }
}

/// Per-entity scheduler. Every call takes the task and the callback to run
/// if the entity is removed before the task is done; a unit return means the
/// entity is already gone and nothing was scheduled.
pub(super) struct EntitySchedulerObject {
    host: Arc<RegionInner>,
    entity: u64,
}

impl DynObject for EntitySchedulerObject {
    fn type_name(&self) -> &'static str {
        "EntityScheduler"
    }

    fn invoke(&self, method: &str, args: &[Value]) -> Result<Value, InvokeError> {
        let (args, delay, period) = match method {
            "run" => (Args::new(method, args).exact(2)?, 1, None),
            "run_delayed" => {
                let args = Args::new(method, args).exact(3)?;
                let delay = at_least_one(method, "delay", args.long(2)?)?;
                (args, delay, None)
            }
            "run_at_fixed_rate" => {
                let args = Args::new(method, args).exact(4)?;
                let delay = at_least_one(method, "initial delay", args.long(2)?)?;
                let period = at_least_one(method, "period", args.long(3)?)?;
                (args, delay, Some(period))
            }
            _ => return Err(no_such_method(self.type_name(), method)),
        };

        let scheduled = self.host.schedule_entity(
            method,
            self.entity,
            args.task(0)?,
            args.task(1)?,
            delay,
            period,
        )?;
        Ok(scheduled.map(task_value).unwrap_or(Value::Unit))
    }
}

/// Background scheduler; delays are wall-clock with an explicit unit
pub(super) struct AsyncSchedulerObject {
    pub(super) host: Arc<RegionInner>,
}

impl DynObject for AsyncSchedulerObject {
    fn type_name(&self) -> &'static str {
        "AsyncScheduler"
    }

    fn invoke(&self, method: &str, args: &[Value]) -> Result<Value, InvokeError> {
        let (task, delay, period) = match method {
            "run_now" => {
                let args = Args::new(method, args).exact(1)?;
                (args.task(0)?, Duration::ZERO, None)
            }
            "run_delayed" => {
                let args = Args::new(method, args).exact(3)?;
                let unit = args.time_unit(2)?;
                let delay = non_negative(method, "delay", args.long(1)?)?;
                (args.task(0)?, unit.to_duration(delay), None)
            }
            "run_at_fixed_rate" => {
                let args = Args::new(method, args).exact(4)?;
                let unit = args.time_unit(3)?;
                let delay = non_negative(method, "initial delay", args.long(1)?)?;
                let period = u64::try_from(args.long(2)?)
                    .ok()
                    .filter(|period| *period >= 1)
                    .ok_or_else(|| InvokeError::rejected(method, "period must be positive"))?;
                (
                    args.task(0)?,
                    unit.to_duration(delay),
                    Some(unit.to_duration(period)),
                )
            }
            _ => return Err(no_such_method(self.type_name(), method)),
        };

        let record = self.host.schedule_async(method, task, delay, period)?;
        Ok(task_value(record))
    }
}

#[cfg(test)]
mod tests {
    use super::super::RegionHost;
    use crate::config::HostSettings;
    use crate::dynamic::{HostSurface, Value};
    use crate::error::InvokeError;
    use crate::probe::{ASYNC_SCHEDULER, GLOBAL_REGION_SCHEDULER};
    use crate::runnable::Task;
    use crate::time_unit::TimeUnit;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn host() -> RegionHost {
        RegionHost::new(&HostSettings {
            regions: 2,
            ..HostSettings::default()
        })
        .unwrap()
    }

    fn counting() -> (Arc<AtomicUsize>, Task) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let task: Task = Arc::new(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (count, task)
    }

    fn resolve(host: &RegionHost, name: &str) -> Value {
        (host.resolve(name).unwrap())().unwrap()
    }

    #[test]
    fn global_region_scheduler_validates_delays() {
        let host = host();
        let scheduler = resolve(&host, GLOBAL_REGION_SCHEDULER);
        let scheduler = scheduler.as_object().unwrap();
        let (count, task) = counting();

        let zero = scheduler.invoke("run_delayed", &[Value::Task(task.clone()), Value::Long(0)]);
        assert!(matches!(zero, Err(InvokeError::Rejected { .. })));

        let handle = scheduler
            .invoke("run_at_fixed_rate", &[Value::Task(task), Value::Long(1), Value::Long(2)])
            .unwrap();
        host.advance(5);
        assert_eq!(count.load(Ordering::SeqCst), 3);

        handle.as_object().unwrap().invoke("cancel", &[]).unwrap();
        host.advance(5);
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn entity_scheduler_returns_unit_for_removed_entity() {
        let host = host();
        let entity = host.spawn_entity(0);
        let scheduler = entity.object().invoke("scheduler", &[]).unwrap();
        let scheduler = scheduler.as_object().unwrap().clone();
        let (count, task) = counting();
        let retired: Task = Arc::new(|| {});

        let scheduled = scheduler
            .invoke("run", &[Value::Task(task.clone()), Value::Task(retired.clone())])
            .unwrap();
        assert!(scheduled.as_object().is_some());
        host.tick();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        host.remove_entity(&entity);
        assert!(matches!(entity.object().invoke("is_valid", &[]), Ok(Value::Bool(false))));
        let late = scheduler
            .invoke("run", &[Value::Task(task), Value::Task(retired)])
            .unwrap();
        assert!(late.is_unit());
    }

    #[test]
    fn entity_scheduler_checks_arguments() {
        let host = host();
        let entity = host.spawn_entity(1);
        let scheduler = entity.object().invoke("scheduler", &[]).unwrap();
        let scheduler = scheduler.as_object().unwrap();
        let (_, task) = counting();

        assert!(matches!(
            scheduler.invoke("run", &[Value::Task(task.clone())]),
            Err(InvokeError::Arity { expected: 2, actual: 1, .. })
        ));
        assert!(matches!(
            scheduler.invoke("run_delayed", &[Value::Task(task.clone()), Value::Long(3), Value::Long(3)]),
            Err(InvokeError::ArgumentType { index: 1, .. })
        ));
        assert!(matches!(
            scheduler.invoke("execute", &[Value::Task(task)]),
            Err(InvokeError::NoSuchMethod { .. })
        ));
    }

    #[test]
    fn async_scheduler_runs_off_the_tick_threads() {
        let host = host();
        let scheduler = resolve(&host, ASYNC_SCHEDULER);
        let scheduler = scheduler.as_object().unwrap();
        let (tx, rx) = std::sync::mpsc::channel();
        let tx = parking_lot::Mutex::new(tx);
        let task: Task = Arc::new(move || {
            let name = std::thread::current().name().map(str::to_string);
            let _ = tx.lock().send(name);
        });

        scheduler
            .invoke(
                "run_delayed",
                &[Value::Task(task), Value::Long(10), Value::TimeUnit(TimeUnit::Milliseconds)],
            )
            .unwrap();

        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(name.as_deref(), Some("async-worker"));
    }

    #[test]
    fn async_scheduler_rejects_zero_period() {
        let host = host();
        let scheduler = resolve(&host, ASYNC_SCHEDULER);
        let scheduler = scheduler.as_object().unwrap();
        let (_, task) = counting();

        let result = scheduler.invoke(
            "run_at_fixed_rate",
            &[
                Value::Task(task),
                Value::Long(0),
                Value::Long(0),
                Value::TimeUnit(TimeUnit::Milliseconds),
            ],
        );
        assert!(matches!(result, Err(InvokeError::Rejected { .. })));
    }
}
