use super::task::{run_guarded, HostTask};
use crate::runnable::Task;
use crate::task::NativeTask;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::trace;

/// Queue position: due tick first, then submission order
pub(crate) type QueueKey = (u64, u64);

/// One pending entry in a tick queue
pub(crate) struct QueuedTask {
    pub(crate) record: Arc<HostTask>,
    pub(crate) task: Task,
    pub(crate) period: Option<u64>,
    pub(crate) retired: Option<Task>,
}

impl QueuedTask {
    pub(crate) fn new(record: Arc<HostTask>, task: Task, period: Option<u64>) -> Self {
        Self {
            record,
            task,
            period: period.map(|p| p.max(1)),
            retired: None,
        }
    }

    pub(crate) fn with_retired(mut self, retired: Task) -> Self {
        self.retired = Some(retired);
        self
    }

    /// Run once on the calling thread. Hands the entry back if it repeats.
    pub(crate) fn execute(self, tick: u64) -> Option<Self> {
        let id = self.record.id();
        if !self.record.state().begin_run() {
            trace!(task_id = id, tick, "Dropping cancelled task");
            return None;
        }

        run_guarded(&self.task, id);

        if self.record.state().finish(self.period.is_some()) {
            Some(self)
        } else {
            None
        }
    }

    /// Next due tick for a repeating entry that just ran at `tick`
    pub(crate) fn next_due(&self, tick: u64) -> u64 {
        tick.saturating_add(self.period.unwrap_or(1))
    }

    /// Drop the entry because its owner went away; runs the retired callback
    /// unless the task was already cancelled
    pub(crate) fn retire(self) {
        if self.record.state().cancel() {
            if let Some(retired) = &self.retired {
                run_guarded(retired, self.record.id());
            }
        }
    }

    pub(crate) fn discard(self) {
        self.record.state().cancel();
    }
}

/// Timer queue ordered by due tick, then submission sequence.
///
/// Cancelled entries are not removed eagerly; they are skipped when due.
#[derive(Default)]
pub(crate) struct TickQueue {
    entries: BTreeMap<QueueKey, QueuedTask>,
}

impl TickQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, due: u64, seq: u64, task: QueuedTask) {
        self.entries.insert((due, seq), task);
    }

    /// Remove and return every entry due at or before `now`, in run order
    pub(crate) fn take_due(&mut self, now: u64) -> Vec<(QueueKey, QueuedTask)> {
        let later = self.entries.split_off(&(now.saturating_add(1), 0));
        let due = std::mem::replace(&mut self.entries, later);
        due.into_iter().collect()
    }

    pub(crate) fn drain(&mut self) -> Vec<QueuedTask> {
        std::mem::take(&mut self.entries).into_values().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
