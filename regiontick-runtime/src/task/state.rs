use std::sync::atomic::{AtomicU8, Ordering};

const PENDING: u8 = 0;
const RUNNING: u8 = 1;
const COMPLETED: u8 = 2;
const CANCELLED: u8 = 3;

/// Where a submitted task is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Cancelled,
}

/// Lifecycle shared between a host queue and the handles pointing at it.
///
/// One-shot: `Pending -> Running -> Completed`.
/// Repeating: `Pending -> Running -> Pending -> ...` until cancelled.
/// `Cancelled` is terminal and reachable from every state except `Completed`.
#[derive(Debug)]
pub struct TaskState(AtomicU8);

impl Default for TaskState {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskState {
    pub fn new() -> Self {
        Self(AtomicU8::new(PENDING))
    }

    pub fn status(&self) -> TaskStatus {
        match self.0.load(Ordering::Acquire) {
            PENDING => TaskStatus::Pending,
            RUNNING => TaskStatus::Running,
            COMPLETED => TaskStatus::Completed,
            _ => TaskStatus::Cancelled,
        }
    }

    /// Claim the next run. Fails if the task was cancelled or already finished.
    pub fn begin_run(&self) -> bool {
        self.0
            .compare_exchange(PENDING, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Close out a run. Returns true when a repeating task should be requeued.
    ///
    /// A cancel that lands while the task is running wins.
    pub fn finish(&self, repeating: bool) -> bool {
        let next = if repeating { PENDING } else { COMPLETED };
        self.0
            .compare_exchange(RUNNING, next, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
            && repeating
    }

    /// Returns true if this call moved the task to `Cancelled`.
    pub fn cancel(&self) -> bool {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            if current == COMPLETED || current == CANCELLED {
                return false;
            }
            match self.0.compare_exchange_weak(
                current,
                CANCELLED,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.status() == TaskStatus::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_shot_lifecycle() {
        let state = TaskState::new();
        assert_eq!(state.status(), TaskStatus::Pending);
        assert!(state.begin_run());
        assert_eq!(state.status(), TaskStatus::Running);
        assert!(!state.finish(false));
        assert_eq!(state.status(), TaskStatus::Completed);

        assert!(!state.cancel());
        assert_eq!(state.status(), TaskStatus::Completed);
        assert!(!state.begin_run());
    }

    #[test]
    fn repeating_lifecycle_until_cancelled() {
        let state = TaskState::new();
        for _ in 0..3 {
            assert!(state.begin_run());
            assert!(state.finish(true));
            assert_eq!(state.status(), TaskStatus::Pending);
        }

        assert!(state.cancel());
        assert!(!state.cancel());
        assert!(!state.begin_run());
        assert!(state.is_cancelled());
    }

    #[test]
    fn cancel_during_run_stops_requeue() {
        let state = TaskState::new();
        assert!(state.begin_run());
        assert!(state.cancel());
        assert!(!state.finish(true));
        assert_eq!(state.status(), TaskStatus::Cancelled);
    }
}
