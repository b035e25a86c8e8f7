use super::async_pool::AsyncPool;
use super::driver::TickDriver;
use super::queue::{QueuedTask, TickQueue};
use super::task::HostTask;
use crate::config::HostSettings;
use crate::dynamic::{no_such_method, DynObject, Entity, Value};
use crate::error::{HostError, InvokeError};
use crate::runnable::Task;
use crate::scheduler::GlobalScheduler;
use crate::task::NativeTask;
use crate::time_unit::ticks_to_duration;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace};

enum Due {
    At(u64),
    After(u64),
}

struct LoopState {
    tick: u64,
    seq: u64,
    queue: TickQueue,
    shut_down: bool,
}

/// Single authoritative tick loop with a separate background pool.
///
/// Sync work runs on whichever thread calls [`tick`](Self::tick): either the
/// embedding application's main loop, or the `global-tick` thread started by
/// [`start`](Self::start).
pub struct GlobalLoop {
    state: Mutex<LoopState>,
    ids: AtomicU64,
    async_pool: AsyncPool,
    tick_interval: Duration,
    driver: Mutex<Option<TickDriver>>,
}

impl GlobalLoop {
    pub fn new(settings: &HostSettings) -> Result<Self, HostError> {
        let async_pool = AsyncPool::new(settings.async_workers, "async-worker")?;
        info!(
            async_workers = settings.async_workers,
            tick_interval = %settings.tick_interval,
            "Global loop created"
        );

        Ok(Self {
            state: Mutex::new(LoopState {
                tick: 0,
                seq: 0,
                queue: TickQueue::new(),
                shut_down: false,
            }),
            ids: AtomicU64::new(1),
            async_pool,
            tick_interval: settings.tick_duration(),
            driver: Mutex::new(None),
        })
    }

    pub fn current_tick(&self) -> u64 {
        self.state.lock().tick
    }

    /// Queued sync tasks, including cancelled ones not yet skipped
    pub fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Advance one tick and run everything due, on the calling thread.
    /// Returns the number of tasks that ran.
    pub fn tick(&self) -> usize {
        let (now, due) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            if state.shut_down {
                return 0;
            }
            state.tick += 1;
            (state.tick, state.queue.take_due(state.tick))
        };

        let mut ran = 0;
        for (_, entry) in due {
            let live = !entry.record.is_cancelled();
            if let Some(entry) = entry.execute(now) {
                let due = entry.next_due(now);
                self.enqueue(Due::At(due), entry);
            }
            if live {
                ran += 1;
            }
        }

        trace!(tick = now, ran, "Global tick");
        ran
    }

    /// Run `ticks` ticks back to back
    pub fn advance(&self, ticks: u64) -> usize {
        (0..ticks).map(|_| self.tick()).sum()
    }

    /// Tick on a dedicated `global-tick` thread at the configured interval
    pub fn start(self: &Arc<Self>) -> Result<(), HostError> {
        let mut driver = self.driver.lock();
        if driver.is_some() {
            return Ok(());
        }

        let host = Arc::downgrade(self);
        *driver = Some(TickDriver::spawn(
            "global-tick",
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

    /// Stop the driver thread, if any; manual ticking keeps working
    pub fn stop(&self) {
        let driver = self.driver.lock().take();
        if let Some(driver) = driver {
            driver.stop();
        }
    }

    /// Stop ticking, drop queued work, and refuse anything new
    pub fn shutdown(&self) {
        self.stop();
        let dropped = {
            let mut state = self.state.lock();
            state.shut_down = true;
            state.queue.drain()
        };
        let count = dropped.len();
        dropped.into_iter().for_each(QueuedTask::discard);
        self.async_pool.shutdown();
        info!(dropped = count, "Global loop shut down");
    }

    /// An entity handle for callers that need one. It has no scheduler of its own.
    pub fn spawn_entity(&self) -> Entity {
        let id = self.ids.fetch_add(1, Ordering::Relaxed);
        Entity::new(Arc::new(LoopEntity { id }))
    }

    fn next_record(&self) -> Arc<HostTask> {
        HostTask::new(self.ids.fetch_add(1, Ordering::Relaxed))
    }

    /// Queue at an absolute tick, or `delay` ticks after the current one
    fn enqueue(&self, due: Due, entry: QueuedTask) -> bool {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if state.shut_down {
            entry.discard();
            return false;
        }
        let due = match due {
            Due::At(tick) => tick,
            Due::After(delay) => state.tick.saturating_add(delay.max(1)),
        };
        state.seq += 1;
        state.queue.push(due, state.seq, entry);
        true
    }

    fn schedule(&self, task: Task, delay: u64, period: Option<u64>) -> Option<Arc<dyn NativeTask>> {
        let record = self.next_record();
        let entry = QueuedTask::new(record.clone(), task, period);
        if !self.enqueue(Due::After(delay), entry) {
            debug!("Global loop is shut down, refusing task");
            return None;
        }
        Some(record)
    }

    fn schedule_async(
        &self,
        task: Task,
        delay: u64,
        period: Option<u64>,
    ) -> Option<Arc<dyn NativeTask>> {
        let record = self.next_record();
        let accepted = match period {
            Some(period) => self.async_pool.spawn_repeating(
                &record,
                task,
                ticks_to_duration(delay),
                ticks_to_duration(period.max(1)),
            ),
            None => self
                .async_pool
                .spawn_once(&record, task, ticks_to_duration(delay)),
        };
        if !accepted {
            debug!("Async pool is shut down, refusing task");
            return None;
        }
        Some(record)
    }
}

impl GlobalScheduler for GlobalLoop {
    fn run_task(&self, task: Task) -> Option<Arc<dyn NativeTask>> {
        self.schedule(task, 0, None)
    }

    fn run_task_later(&self, task: Task, delay: u64) -> Option<Arc<dyn NativeTask>> {
        self.schedule(task, delay, None)
    }

    fn run_task_timer(&self, task: Task, delay: u64, period: u64) -> Option<Arc<dyn NativeTask>> {
        self.schedule(task, delay, Some(period.max(1)))
    }

    fn run_task_async(&self, task: Task) -> Option<Arc<dyn NativeTask>> {
        self.schedule_async(task, 0, None)
    }

    fn run_task_later_async(&self, task: Task, delay: u64) -> Option<Arc<dyn NativeTask>> {
        self.schedule_async(task, delay, None)
    }

    fn run_task_timer_async(
        &self,
        task: Task,
        delay: u64,
        period: u64,
    ) -> Option<Arc<dyn NativeTask>> {
        self.schedule_async(task, delay, Some(period))
    }
}

impl Drop for GlobalLoop {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.get_mut().take() {
            driver.stop();
        }
    }
}

/// Entity handed out by the global loop: it only knows its id
struct LoopEntity {
    id: u64,
}

impl DynObject for LoopEntity {
    fn type_name(&self) -> &'static str {
        "LoopEntity"
    }

    fn invoke(&self, method: &str, _args: &[Value]) -> Result<Value, InvokeError> {
        match method {
            "id" => Ok(Value::long(self.id)),
            _ => Err(no_such_method(self.type_name(), method)),
        }
    }
}
