//! Region-threaded host.
//!
//! The world is split into regions, each ticked by its own worker thread.
//! Entities live in exactly one region and their tasks run on that region's
//! worker; a separate `global-region` thread runs work that belongs to no
//! entity. The scheduling API is only reachable through [`HostSurface`], the
//! same way a host that is not linked at compile time would be reached.

mod objects;

use self::objects::{AsyncSchedulerObject, GlobalRegionSchedulerObject, RegionEntity};
use super::async_pool::AsyncPool;
use super::driver::TickDriver;
use super::queue::{QueuedTask, TickQueue};
use super::task::HostTask;
use crate::config::HostSettings;
use crate::dynamic::{Entity, HostOperation, HostSurface, Value};
use crate::error::{HostError, InvokeError};
use crate::probe::{ASYNC_SCHEDULER, GLOBAL_REGION_SCHEDULER};
use crate::runnable::Task;
use crate::scheduler::GlobalScheduler;
use crate::task::NativeTask;
use crate::time_unit::ticks_to_duration;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::cell::Cell;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

thread_local! {
    // address of the host whose worker is running on this thread, 0 elsewhere
    static WORKER_OF: Cell<usize> = const { Cell::new(0) };
}

enum Command {
    Tick { tick: u64, done: Sender<()> },
    Stop,
}

#[derive(Debug, Clone, Copy)]
enum Role {
    Global,
    Region(usize),
}

impl Role {
    fn thread_name(&self) -> String {
        match self {
            Role::Global => "global-region".to_string(),
            Role::Region(index) => format!("region-worker-{}", index),
        }
    }
}

struct Worker {
    commands: Sender<Command>,
    thread: Option<thread::JoinHandle<()>>,
}

struct EntityRecord {
    region: usize,
    removed: bool,
    queue: TickQueue,
}

/// State shared by the host, its worker threads and the objects it hands out
pub(crate) struct RegionInner {
    regions: usize,
    tick: AtomicU64,
    ids: AtomicU64,
    seq: AtomicU64,
    shut_down: AtomicBool,
    global_queue: Mutex<TickQueue>,
    entities: Mutex<BTreeMap<u64, EntityRecord>>,
    async_pool: AsyncPool,
}

impl RegionInner {
    fn now(&self) -> u64 {
        self.tick.load(Ordering::Acquire)
    }

    fn next_id(&self) -> u64 {
        self.ids.fetch_add(1, Ordering::Relaxed)
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    fn ensure_running(&self, method: &str) -> Result<(), InvokeError> {
        if self.is_shut_down() {
            Err(InvokeError::rejected(method, "region host is shut down"))
        } else {
            Ok(())
        }
    }

    fn schedule_global(
        &self,
        method: &str,
        task: Task,
        delay: u64,
        period: Option<u64>,
    ) -> Result<Arc<HostTask>, InvokeError> {
        self.ensure_running(method)?;
        let record = HostTask::new(self.next_id());
        let entry = QueuedTask::new(record.clone(), task, period);

        let mut queue = self.global_queue.lock();
        let due = self.now().saturating_add(delay.max(1));
        queue.push(due, self.next_seq(), entry);
        trace!(task_id = record.id(), due, "Queued global region task");
        Ok(record)
    }

    /// `Ok(None)` when the entity is gone: nothing is scheduled
    fn schedule_entity(
        &self,
        method: &str,
        entity: u64,
        task: Task,
        retired: Task,
        delay: u64,
        period: Option<u64>,
    ) -> Result<Option<Arc<HostTask>>, InvokeError> {
        self.ensure_running(method)?;

        let mut entities = self.entities.lock();
        let Some(record) = entities.get_mut(&entity).filter(|record| !record.removed) else {
            debug!(entity, "Entity is retired, not scheduling");
            return Ok(None);
        };

        let handle = HostTask::new(self.next_id());
        let due = self.now().saturating_add(delay.max(1));
        let entry = QueuedTask::new(handle.clone(), task, period).with_retired(retired);
        record.queue.push(due, self.next_seq(), entry);
        trace!(task_id = handle.id(), entity, region = record.region, due, "Queued entity task");
        Ok(Some(handle))
    }

    fn schedule_async(
        &self,
        method: &str,
        task: Task,
        delay: Duration,
        period: Option<Duration>,
    ) -> Result<Arc<HostTask>, InvokeError> {
        self.ensure_running(method)?;
        let record = HostTask::new(self.next_id());
        let accepted = match period {
            Some(period) => self.async_pool.spawn_repeating(&record, task, delay, period),
            None => self.async_pool.spawn_once(&record, task, delay),
        };
        if accepted {
            Ok(record)
        } else {
            Err(InvokeError::rejected(method, "async pool is shut down"))
        }
    }

    fn entity_record<R>(&self, entity: u64, read: impl FnOnce(&EntityRecord) -> R) -> Option<R> {
        self.entities.lock().get(&entity).map(read)
    }

    fn run_global(&self, tick: u64) {
        let due = self.global_queue.lock().take_due(tick);
        for (_, entry) in due {
            if let Some(entry) = entry.execute(tick) {
                let next = entry.next_due(tick);
                if self.is_shut_down() {
                    entry.discard();
                } else {
                    self.global_queue.lock().push(next, self.next_seq(), entry);
                }
            }
        }
    }

    fn run_region(&self, region: usize, tick: u64) {
        let mut retired = Vec::new();
        let mut due = Vec::new();
        {
            let mut entities = self.entities.lock();
            entities.retain(|&id, record| {
                if record.region != region {
                    return true;
                }
                if record.removed {
                    retired.extend(record.queue.drain());
                    return false;
                }
                due.extend(
                    record
                        .queue
                        .take_due(tick)
                        .into_iter()
                        .map(|(key, entry)| (key, id, entry)),
                );
                true
            });
        }

        if !retired.is_empty() {
            debug!(region, tick, tasks = retired.len(), "Retiring tasks of removed entities");
        }
        retired.into_iter().for_each(QueuedTask::retire);

        // one region, one ordering: by due tick, then submission
        due.sort_by_key(|(key, _, _)| *key);
        for (_, entity, entry) in due {
            if let Some(entry) = entry.execute(tick) {
                let next = entry.next_due(tick);
                self.requeue_entity(entity, next, entry);
            }
        }
    }

    fn requeue_entity(&self, entity: u64, due: u64, entry: QueuedTask) {
        if self.is_shut_down() {
            entry.discard();
            return;
        }
        let orphaned = {
            let mut entities = self.entities.lock();
            match entities.get_mut(&entity) {
                // a removed entity keeps its record until its worker retires it
                Some(record) => {
                    record.queue.push(due, self.next_seq(), entry);
                    None
                }
                None => Some(entry),
            }
        };
        if let Some(entry) = orphaned {
            entry.retire();
        }
    }
}

fn worker_loop(inner: Weak<RegionInner>, role: Role, commands: Receiver<Command>) {
    WORKER_OF.with(|owner| owner.set(inner.as_ptr() as usize));
    debug!(?role, "Region worker started");
    while let Ok(command) = commands.recv() {
        match command {
            Command::Tick { tick, done } => {
                if let Some(inner) = inner.upgrade() {
                    match role {
                        Role::Global => inner.run_global(tick),
                        Role::Region(region) => inner.run_region(region, tick),
                    }
                }
                let _ = done.send(());
            }
            Command::Stop => break,
        }
    }
    debug!(?role, "Region worker exiting");
}

fn spawn_worker(inner: &Arc<RegionInner>, role: Role) -> Result<Worker, HostError> {
    let name = role.thread_name();
    let (commands, receiver) = crossbeam_channel::unbounded();
    let weak = Arc::downgrade(inner);
    let thread = thread::Builder::new()
        .name(name.clone())
        .spawn(move || worker_loop(weak, role, receiver))
        .map_err(|source| HostError::Thread { name, source })?;

    Ok(Worker {
        commands,
        thread: Some(thread),
    })
}

/// In-process region-threaded host.
///
/// Advance it with [`tick`](Self::tick), which ticks every region in parallel
/// and returns once all of them are done, or let [`start`](Self::start) tick
/// it in real time. Tasks running on the host's own workers cannot drive it:
/// `tick`, `advance`, `stop` and `shutdown` called from one of them would wait
/// on the very tick that is running, so they log a warning and do nothing.
pub struct RegionHost {
    inner: Arc<RegionInner>,
    workers: Mutex<Vec<Worker>>,
    tick_lock: Mutex<()>,
    tick_interval: Duration,
    driver: Mutex<Option<TickDriver>>,
}

impl RegionHost {
    pub fn new(settings: &HostSettings) -> Result<Self, HostError> {
        if settings.regions == 0 {
            return Err(HostError::NoRegions(settings.regions));
        }

        let inner = Arc::new(RegionInner {
            regions: settings.regions,
            tick: AtomicU64::new(0),
            ids: AtomicU64::new(1),
            seq: AtomicU64::new(0),
            shut_down: AtomicBool::new(false),
            global_queue: Mutex::new(TickQueue::new()),
            entities: Mutex::new(BTreeMap::new()),
            async_pool: AsyncPool::new(settings.async_workers, "async-worker")?,
        });

        let mut workers = Vec::with_capacity(settings.regions + 1);
        workers.push(spawn_worker(&inner, Role::Global)?);
        for region in 0..settings.regions {
            workers.push(spawn_worker(&inner, Role::Region(region))?);
        }

        info!(
            regions = settings.regions,
            async_workers = settings.async_workers,
            "Region host created"
        );

        Ok(Self {
            inner,
            workers: Mutex::new(workers),
            tick_lock: Mutex::new(()),
            tick_interval: settings.tick_duration(),
            driver: Mutex::new(None),
        })
    }

    pub fn regions(&self) -> usize {
        self.inner.regions
    }

    pub fn current_tick(&self) -> u64 {
        self.inner.now()
    }

    fn on_own_worker(&self, operation: &'static str) -> bool {
        let own = WORKER_OF.with(Cell::get) == Arc::as_ptr(&self.inner) as usize;
        if own {
            warn!(operation, "Ignoring host control call from its own worker thread");
        }
        own
    }

    /// Tick every region once and wait for all of them
    pub fn tick(&self) -> u64 {
        if self.on_own_worker("tick") {
            return self.inner.now();
        }
        let _serial = self.tick_lock.lock();
        if self.inner.is_shut_down() {
            return self.inner.now();
        }

        let tick = self.inner.tick.fetch_add(1, Ordering::AcqRel) + 1;
        let workers = self.workers.lock();
        let (done, finished) = crossbeam_channel::bounded(workers.len());
        let dispatched = workers
            .iter()
            .filter(|worker| {
                worker
                    .commands
                    .send(Command::Tick {
                        tick,
                        done: done.clone(),
                    })
                    .is_ok()
            })
            .count();
        drop(workers);
        drop(done);

        for _ in 0..dispatched {
            if finished.recv().is_err() {
                break;
            }
        }
        trace!(tick, "Region tick");
        tick
    }

    pub fn advance(&self, ticks: u64) {
        if self.on_own_worker("advance") {
            return;
        }
        for _ in 0..ticks {
            self.tick();
        }
    }

    /// Tick on a dedicated `region-tick` thread at the configured interval
    pub fn start(self: &Arc<Self>) -> Result<(), HostError> {
        let mut driver = self.driver.lock();
        if driver.is_some() {
            return Ok(());
        }

        let host = Arc::downgrade(self);
        *driver = Some(TickDriver::spawn(
            "region-tick",
            self.tick_interval,
            move || match host.upgrade() {
                Some(host) => {
                    host.tick();
                    true
                }
                None => false,
            },
        )?);
        Ok(())
    }

    pub fn stop(&self) {
        if self.on_own_worker("stop") {
            return;
        }
        let driver = self.driver.lock().take();
        if let Some(driver) = driver {
            driver.stop();
        }
    }

    /// Stop every worker, drop all queued work and refuse anything new
    pub fn shutdown(&self) {
        if self.on_own_worker("shutdown") {
            return;
        }
        self.stop();
        let _serial = self.tick_lock.lock();
        if self.inner.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }

        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in &workers {
            let _ = worker.commands.send(Command::Stop);
        }
        for mut worker in workers {
            if let Some(thread) = worker.thread.take() {
                if thread.thread().id() != thread::current().id() {
                    let _ = thread.join();
                }
            }
        }

        let mut dropped = self.inner.global_queue.lock().drain();
        for record in self.inner.entities.lock().values_mut() {
            dropped.extend(record.queue.drain());
        }
        let count = dropped.len();
        dropped.into_iter().for_each(QueuedTask::discard);
        self.inner.async_pool.shutdown();
        info!(dropped = count, "Region host shut down");
    }

    /// Create an entity owned by `region` (taken modulo the region count)
    pub fn spawn_entity(&self, region: usize) -> Entity {
        let id = self.inner.next_id();
        let region = region % self.inner.regions;
        self.inner.entities.lock().insert(
            id,
            EntityRecord {
                region,
                removed: false,
                queue: TickQueue::new(),
            },
        );
        debug!(entity = id, region, "Spawned entity");
        Entity::new(Arc::new(RegionEntity {
            host: self.inner.clone(),
            id,
        }))
    }

    /// Hand an entity, and every task bound to it, to another region
    pub fn move_entity(&self, entity: &Entity, region: usize) -> bool {
        let Some(id) = entity_id(entity) else {
            return false;
        };
        let region = region % self.inner.regions;
        let mut entities = self.inner.entities.lock();
        match entities.get_mut(&id) {
            Some(record) if !record.removed => {
                debug!(entity = id, from = record.region, to = region, "Moved entity");
                record.region = region;
                true
            }
            _ => false,
        }
    }

    /// Remove an entity from the world. Its pending tasks are retired by its
    /// owning worker on the next tick.
    pub fn remove_entity(&self, entity: &Entity) -> bool {
        let Some(id) = entity_id(entity) else {
            return false;
        };
        let mut entities = self.inner.entities.lock();
        match entities.get_mut(&id) {
            Some(record) if !record.removed => {
                record.removed = true;
                debug!(entity = id, region = record.region, "Removed entity");
                true
            }
            _ => false,
        }
    }

    pub fn entity_region(&self, entity: &Entity) -> Option<usize> {
        let id = entity_id(entity)?;
        self.inner
            .entity_record(id, |record| (!record.removed).then_some(record.region))
            .flatten()
    }

    /// Pending tasks bound to `entity`
    pub fn entity_tasks(&self, entity: &Entity) -> usize {
        entity_id(entity)
            .and_then(|id| self.inner.entity_record(id, |record| record.queue.len()))
            .unwrap_or(0)
    }
}

fn entity_id(entity: &Entity) -> Option<u64> {
    entity.id().and_then(|id| u64::try_from(id).ok())
}

impl HostSurface for RegionHost {
    fn resolve(&self, name: &str) -> Option<HostOperation> {
        let host = self.inner.clone();
        match name {
            GLOBAL_REGION_SCHEDULER => Some(Arc::new(move || {
                Ok::<_, InvokeError>(Value::object(GlobalRegionSchedulerObject {
                    host: host.clone(),
                }))
            })),
            ASYNC_SCHEDULER => Some(Arc::new(move || {
                Ok::<_, InvokeError>(Value::object(AsyncSchedulerObject { host: host.clone() }))
            })),
            _ => None,
        }
    }
}

/// Native access for callers that link against the host directly. Sync work
/// runs on the `global-region` thread; delays are clamped rather than rejected.
impl GlobalScheduler for RegionHost {
    fn run_task(&self, task: Task) -> Option<Arc<dyn NativeTask>> {
        self.run_task_later(task, 1)
    }

    fn run_task_later(&self, task: Task, delay: u64) -> Option<Arc<dyn NativeTask>> {
        let record = self.inner.schedule_global("run_task", task, delay, None).ok()?;
        Some(record)
    }

    fn run_task_timer(&self, task: Task, delay: u64, period: u64) -> Option<Arc<dyn NativeTask>> {
        let record = self
            .inner
            .schedule_global("run_task_timer", task, delay, Some(period.max(1)))
            .ok()?;
        Some(record)
    }

    fn run_task_async(&self, task: Task) -> Option<Arc<dyn NativeTask>> {
        self.run_task_later_async(task, 0)
    }

    fn run_task_later_async(&self, task: Task, delay: u64) -> Option<Arc<dyn NativeTask>> {
        let record = self
            .inner
            .schedule_async("run_task_async", task, ticks_to_duration(delay), None)
            .ok()?;
        Some(record)
    }

    fn run_task_timer_async(
        &self,
        task: Task,
        delay: u64,
        period: u64,
    ) -> Option<Arc<dyn NativeTask>> {
        let record = self
            .inner
            .schedule_async(
                "run_task_timer_async",
                task,
                ticks_to_duration(delay),
                Some(ticks_to_duration(period.max(1))),
            )
            .ok()?;
        Some(record)
    }
}

impl Drop for RegionHost {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.get_mut().take() {
            driver.stop();
        }
        for worker in self.workers.get_mut().iter() {
            let _ = worker.commands.send(Command::Stop);
        }
    }
}
