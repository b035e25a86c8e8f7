use crate::error::InvokeError;
use crate::runnable::{Affinity, Repeat, TaskSpec};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, warn};

/// Category of a scheduling request, as named in fallback warnings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    GlobalNow,
    GlobalLater,
    GlobalTimer,
    EntityNow,
    EntityLater,
    EntityTimer,
    AsyncNow,
    AsyncLater,
    AsyncTimer,
}

impl OperationKind {
    pub const ALL: [OperationKind; 9] = [
        OperationKind::GlobalNow,
        OperationKind::GlobalLater,
        OperationKind::GlobalTimer,
        OperationKind::EntityNow,
        OperationKind::EntityLater,
        OperationKind::EntityTimer,
        OperationKind::AsyncNow,
        OperationKind::AsyncLater,
        OperationKind::AsyncTimer,
    ];

    pub fn of(spec: &TaskSpec) -> Self {
        let delayed = spec.timing.delay > 0;
        match (&spec.affinity, spec.timing.repeat) {
            (Affinity::Global, Repeat::Every(_)) => OperationKind::GlobalTimer,
            (Affinity::Global, Repeat::Once) if delayed => OperationKind::GlobalLater,
            (Affinity::Global, Repeat::Once) => OperationKind::GlobalNow,
            (Affinity::Entity(_), Repeat::Every(_)) => OperationKind::EntityTimer,
            (Affinity::Entity(_), Repeat::Once) if delayed => OperationKind::EntityLater,
            (Affinity::Entity(_), Repeat::Once) => OperationKind::EntityNow,
            (Affinity::Async, Repeat::Every(_)) => OperationKind::AsyncTimer,
            (Affinity::Async, Repeat::Once) if delayed => OperationKind::AsyncLater,
            (Affinity::Async, Repeat::Once) => OperationKind::AsyncNow,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::GlobalNow => "global-now",
            OperationKind::GlobalLater => "global-later",
            OperationKind::GlobalTimer => "global-timer",
            OperationKind::EntityNow => "entity-now",
            OperationKind::EntityLater => "entity-later",
            OperationKind::EntityTimer => "entity-timer",
            OperationKind::AsyncNow => "async-now",
            OperationKind::AsyncLater => "async-later",
            OperationKind::AsyncTimer => "async-timer",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Region-path failures seen so far, per operation kind.
///
/// Only the first failure of each kind is logged at `warn`; the rest go to
/// `debug` and are counted.
#[derive(Debug, Default)]
pub struct FallbackLog {
    warned: [AtomicBool; 9],
    occurrences: [AtomicU64; 9],
}

impl FallbackLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, kind: OperationKind, error: &InvokeError) {
        let index = kind.index();
        let seen = self.occurrences[index].fetch_add(1, Ordering::Relaxed) + 1;

        if !self.warned[index].swap(true, Ordering::AcqRel) {
            warn!(
                operation = %kind,
                error = %error,
                "Region scheduling failed, falling back to the global scheduler"
            );
        } else {
            debug!(operation = %kind, error = %error, occurrences = seen, "Region scheduling failed again");
        }
    }

    pub fn occurrences(&self, kind: OperationKind) -> u64 {
        self.occurrences[kind.index()].load(Ordering::Relaxed)
    }

    pub fn warned(&self, kind: OperationKind) -> bool {
        self.warned[kind.index()].load(Ordering::Acquire)
    }

    /// Failures across every kind
    pub fn total(&self) -> u64 {
        OperationKind::ALL.iter().map(|kind| self.occurrences(*kind)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamic::{DynObject, Entity, Value};

    struct Nothing;

    impl DynObject for Nothing {
        fn type_name(&self) -> &'static str {
            "Nothing"
        }

        fn invoke(&self, method: &str, _args: &[Value]) -> Result<Value, InvokeError> {
            Err(crate::dynamic::no_such_method(self.type_name(), method))
        }
    }

    #[test]
    fn classifies_every_shape() {
        let entity = Entity::new(std::sync::Arc::new(Nothing));
        let cases = [
            (TaskSpec::builder(|| {}).build(), "global-now"),
            (TaskSpec::builder(|| {}).delay(2).build(), "global-later"),
            (TaskSpec::builder(|| {}).period(2).build(), "global-timer"),
            (TaskSpec::builder(|| {}).at_entity(entity.clone()).build(), "entity-now"),
            (TaskSpec::builder(|| {}).at_entity(entity.clone()).delay(1).build(), "entity-later"),
            (TaskSpec::builder(|| {}).at_entity(entity).delay(1).period(5).build(), "entity-timer"),
            (TaskSpec::builder(|| {}).asynchronous().build(), "async-now"),
            (TaskSpec::builder(|| {}).asynchronous().delay(9).build(), "async-later"),
            (TaskSpec::builder(|| {}).asynchronous().period(9).build(), "async-timer"),
        ];

        for (spec, expected) in &cases {
            assert_eq!(OperationKind::of(spec).to_string(), *expected);
        }
    }

    #[test]
    fn counts_every_failure_but_warns_once() {
        let log = FallbackLog::new();
        let error = InvokeError::Unresolved {
            name: "async_scheduler".into(),
        };

        assert!(!log.warned(OperationKind::AsyncNow));
        log.record(OperationKind::AsyncNow, &error);
        log.record(OperationKind::AsyncNow, &error);
        log.record(OperationKind::EntityTimer, &error);

        assert!(log.warned(OperationKind::AsyncNow));
        assert_eq!(log.occurrences(OperationKind::AsyncNow), 2);
        assert_eq!(log.occurrences(OperationKind::EntityTimer), 1);
        assert_eq!(log.occurrences(OperationKind::GlobalNow), 0);
        assert_eq!(log.total(), 3);
    }
}
