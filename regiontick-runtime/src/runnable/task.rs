use super::r#trait::Runnable;
use crate::dynamic::Entity;
use once_cell::sync::Lazy;
use std::fmt;
use std::sync::Arc;

/// Shared, type-erased unit of work
pub type Task = Arc<dyn Runnable>;

static RETIRED: Lazy<Task> = Lazy::new(|| {
    let noop: Task = Arc::new(|| {});
    noop
});

/// The default abandonment callback: does nothing.
///
/// Handed to region-threaded hosts so an entity task whose entity disappears
/// before it runs is dropped quietly.
pub fn retired() -> Task {
    RETIRED.clone()
}

/// Whether a task runs once or keeps running every `n` ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    Once,
    /// Period in ticks, always greater than zero
    Every(u64),
}

/// When a task first runs and whether it repeats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub delay: u64,
    pub repeat: Repeat,
}

impl Timing {
    pub fn now() -> Self {
        Self {
            delay: 0,
            repeat: Repeat::Once,
        }
    }

    pub fn later(delay: u64) -> Self {
        Self {
            delay,
            repeat: Repeat::Once,
        }
    }

    /// A zero period means "run once", matching how a missing period is read.
    pub fn timer(delay: u64, period: u64) -> Self {
        Self {
            delay,
            repeat: if period == 0 {
                Repeat::Once
            } else {
                Repeat::Every(period)
            },
        }
    }

    pub fn is_repeating(&self) -> bool {
        matches!(self.repeat, Repeat::Every(_))
    }
}

/// Where a task must execute
#[derive(Clone)]
pub enum Affinity {
    /// The authoritative tick context
    Global,
    /// Whichever worker currently owns this entity's region
    Entity(Entity),
    /// A background worker, never the authoritative context
    Async,
}

impl fmt::Debug for Affinity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Affinity::Global => f.write_str("Global"),
            Affinity::Entity(entity) => f.debug_tuple("Entity").field(entity).finish(),
            Affinity::Async => f.write_str("Async"),
        }
    }
}

/// Everything the scheduler needs to know about one submission.
///
/// Every convenience method on [`Scheduler`](crate::Scheduler) builds one of
/// these and hands it to `submit`.
#[derive(Clone)]
pub struct TaskSpec {
    pub task: Task,
    pub timing: Timing,
    pub affinity: Affinity,
    pub on_retired: Option<Task>,
}

impl TaskSpec {
    /// Create a new builder; defaults to "run once on the global context, next tick"
    pub fn builder<R>(task: R) -> TaskSpecBuilder
    where
        R: Runnable + 'static,
    {
        Self::from_task(Arc::new(task))
    }

    /// Same as `builder`, for work that is already shared
    pub fn from_task(task: Task) -> TaskSpecBuilder {
        TaskSpecBuilder {
            task,
            delay: 0,
            period: 0,
            affinity: Affinity::Global,
            on_retired: None,
        }
    }

    /// Abandonment callback for this task, or the shared no-op
    pub fn retired_callback(&self) -> Task {
        self.on_retired.clone().unwrap_or_else(retired)
    }
}

impl fmt::Debug for TaskSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSpec")
            .field("timing", &self.timing)
            .field("affinity", &self.affinity)
            .field("on_retired", &self.on_retired.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for TaskSpec
pub struct TaskSpecBuilder {
    task: Task,
    delay: u64,
    period: u64,
    affinity: Affinity,
    on_retired: Option<Task>,
}

impl TaskSpecBuilder {
    pub fn delay(mut self, ticks: u64) -> Self {
        self.delay = ticks;
        self
    }

    /// Repeat every `ticks`; zero keeps the task one-shot
    pub fn period(mut self, ticks: u64) -> Self {
        self.period = ticks;
        self
    }

    pub fn at_entity(mut self, entity: Entity) -> Self {
        self.affinity = Affinity::Entity(entity);
        self
    }

    pub fn asynchronous(mut self) -> Self {
        self.affinity = Affinity::Async;
        self
    }

    pub fn on_retired<R>(mut self, callback: R) -> Self
    where
        R: Runnable + 'static,
    {
        self.on_retired = Some(Arc::new(callback));
        self
    }

    pub fn build(self) -> TaskSpec {
        TaskSpec {
            task: self.task,
            timing: Timing::timer(self.delay, self.period),
            affinity: self.affinity,
            on_retired: self.on_retired,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn zero_period_is_one_shot() {
        assert_eq!(Timing::timer(5, 0).repeat, Repeat::Once);
        assert_eq!(Timing::timer(5, 3).repeat, Repeat::Every(3));
        assert!(!Timing::later(10).is_repeating());
    }

    #[test]
    fn builder_defaults_to_global_now() {
        let spec = TaskSpec::builder(|| {}).build();
        assert_eq!(spec.timing, Timing::now());
        assert!(matches!(spec.affinity, Affinity::Global));
        assert!(spec.on_retired.is_none());
    }

    #[test]
    fn builder_collects_every_field() {
        let retired_calls = Arc::new(AtomicUsize::new(0));
        let counter = retired_calls.clone();
        let spec = TaskSpec::builder(|| {})
            .delay(20)
            .period(40)
            .asynchronous()
            .on_retired(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .build();

        assert_eq!(spec.timing, Timing::timer(20, 40));
        assert!(matches!(spec.affinity, Affinity::Async));

        spec.retired_callback().run();
        assert_eq!(retired_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn default_retired_callback_is_shared() {
        let spec = TaskSpec::builder(|| {}).build();
        assert!(Arc::ptr_eq(&spec.retired_callback(), &retired()));
    }
}
