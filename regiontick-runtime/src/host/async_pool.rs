use super::task::{run_guarded, HostTask};
use crate::error::HostError;
use crate::runnable::Task;
use crate::task::NativeTask;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Background worker pool shared by both hosts.
///
/// Work never runs on a tick thread. Repeating work awaits each run before
/// waiting for the next period, so one task never overlaps itself.
pub(crate) struct AsyncPool {
    runtime: Mutex<Option<Runtime>>,
}

impl AsyncPool {
    pub(crate) fn new(workers: usize, thread_name: &str) -> Result<Self, HostError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(workers.max(1))
            .thread_name(thread_name)
            .enable_time()
            .build()
            .map_err(HostError::AsyncPool)?;

        Ok(Self {
            runtime: Mutex::new(Some(runtime)),
        })
    }

    pub(crate) fn is_running(&self) -> bool {
        self.runtime.lock().is_some()
    }

    /// Run once after `delay`. Returns false once the pool is shut down.
    pub(crate) fn spawn_once(&self, record: &Arc<HostTask>, task: Task, delay: Duration) -> bool {
        let runtime = self.runtime.lock();
        let Some(runtime) = runtime.as_ref() else {
            return false;
        };

        let id = record.id();
        let state = record.state().clone();
        let join = runtime.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let _ = tokio::task::spawn_blocking(move || {
                if state.begin_run() {
                    run_guarded(&task, id);
                    state.finish(false);
                }
            })
            .await;
        });
        record.attach(join);
        true
    }

    /// Run every `period` after `delay` until cancelled
    pub(crate) fn spawn_repeating(
        &self,
        record: &Arc<HostTask>,
        task: Task,
        delay: Duration,
        period: Duration,
    ) -> bool {
        let runtime = self.runtime.lock();
        let Some(runtime) = runtime.as_ref() else {
            return false;
        };

        let id = record.id();
        let state = record.state().clone();
        let period = period.max(Duration::from_millis(1));
        let join = runtime.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                if !state.begin_run() {
                    break;
                }

                let task = task.clone();
                let ran = tokio::task::spawn_blocking(move || run_guarded(&task, id)).await;
                if ran.is_err() || !state.finish(true) {
                    break;
                }
            }
            debug!(task_id = id, "Async repeating task stopped");
        });
        record.attach(join);
        true
    }

    pub(crate) fn shutdown(&self) {
        if let Some(runtime) = self.runtime.lock().take() {
            runtime.shutdown_background();
        }
    }
}

impl Drop for AsyncPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
