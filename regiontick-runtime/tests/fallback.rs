//! Behaviour when the region path is missing or broken.

use regiontick_runtime::{
    no_such_method, Capability, DynObject, GlobalLoop, HandleBackend, HostOperation, HostSettings,
    HostSurface, InvokeError, OperationKind, RegionHost, SchedulerBuilder, Value,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::prelude::*;

/// Keeps every warning emitted while installed
struct WarningRecorder {
    warnings: Arc<Mutex<Vec<String>>>,
}

impl<S: Subscriber> Layer<S> for WarningRecorder {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::WARN {
            self.warnings.lock().unwrap().push(format!("{:?}", event));
        }
    }
}

/// Object that answers no method at all
struct Hollow;

impl DynObject for Hollow {
    fn type_name(&self) -> &'static str {
        "Hollow"
    }

    fn invoke(&self, method: &str, _args: &[Value]) -> Result<Value, InvokeError> {
        Err(no_such_method(self.type_name(), method))
    }
}

/// Surface that passes the probe but whose schedulers are hollow
struct BrokenSurface;

impl HostSurface for BrokenSurface {
    fn resolve(&self, name: &str) -> Option<HostOperation> {
        match name {
            "global_region_scheduler" | "async_scheduler" => {
                Some(Arc::new(|| Ok::<_, InvokeError>(Value::object(Hollow))))
            }
            _ => None,
        }
    }
}

fn counting() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + Clone + 'static) {
    let count = Arc::new(AtomicUsize::new(0));
    let seen = count.clone();
    (count, move || {
        seen.fetch_add(1, Ordering::SeqCst);
    })
}

#[test]
fn simple_capability_sends_entity_work_to_global_path() {
    let host = Arc::new(GlobalLoop::new(&HostSettings::default()).unwrap());
    let scheduler = SchedulerBuilder::new(host.clone())
        .capability(Capability::simple())
        .build();
    let entity = host.spawn_entity();
    let (count, task) = counting();

    let handles = [
        scheduler.run_at_entity_now(&entity, task.clone()),
        scheduler.run_at_entity_later(&entity, task.clone(), 2),
        scheduler.run_at_entity_timer(&entity, task, 1, 4),
    ];
    assert!(handles.iter().all(|h| h.backend() == HandleBackend::Global));

    host.advance(5);
    // now at 1, later at 2, timer at 1 and 5
    assert_eq!(count.load(Ordering::SeqCst), 4);
    assert_eq!(scheduler.fallbacks().total(), 0);
}

#[test]
fn simple_capability_ignores_region_host_surface() {
    let settings = HostSettings {
        regions: 2,
        ..HostSettings::default()
    };
    let region = Arc::new(RegionHost::new(&settings).unwrap());
    let global = Arc::new(GlobalLoop::new(&settings).unwrap());
    let scheduler = SchedulerBuilder::new(global.clone())
        .surface(region.clone())
        .capability(Capability::simple())
        .build();

    let entity = region.spawn_entity(1);
    let threads = Arc::new(Mutex::new(Vec::new()));
    let seen = threads.clone();
    scheduler.run_at_entity_now(&entity, move || {
        let name = std::thread::current().name().map(str::to_string);
        seen.lock().unwrap().push(name);
    });

    region.advance(2);
    assert!(threads.lock().unwrap().is_empty());
    assert_eq!(region.entity_tasks(&entity), 0);

    global.tick();
    let threads = threads.lock().unwrap();
    assert_eq!(threads.len(), 1);
    assert_ne!(threads[0].as_deref(), Some("region-worker-1"));
}

#[test]
fn failing_region_path_falls_back_and_warns_once_per_kind() {
    let warnings = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry().with(WarningRecorder {
        warnings: warnings.clone(),
    });

    tracing::subscriber::with_default(subscriber, || {
        let host = Arc::new(GlobalLoop::new(&HostSettings::default()).unwrap());
        let scheduler = SchedulerBuilder::new(host.clone())
            .surface(Arc::new(BrokenSurface))
            .build();
        assert!(scheduler.capability().is_region_threaded());

        let (once_count, once_task) = counting();
        for _ in 0..3 {
            let handle = scheduler.run_now(once_task.clone());
            assert_eq!(handle.backend(), HandleBackend::Global);
        }

        let (timer_count, timer_task) = counting();
        let timer = scheduler.run_timer(timer_task, 0, 5);
        scheduler.run_later(|| {}, 1);

        // loop entities have no scheduler, so every entity call fails too
        let entity = host.spawn_entity();
        let (entity_count, entity_task) = counting();
        for _ in 0..2 {
            scheduler.run_at_entity_now(&entity, entity_task.clone());
            scheduler.run_at_entity_later(&entity, entity_task.clone(), 3);
        }
        let entity_timer = scheduler.run_at_entity_timer(&entity, entity_task, 1, 5);
        assert_eq!(entity_timer.backend(), HandleBackend::Global);

        let (threads, names) = crossbeam_channel::unbounded();
        let async_handles: Vec<_> = (0..2)
            .flat_map(|_| {
                let (now, later, repeating) = (threads.clone(), threads.clone(), threads.clone());
                [
                    scheduler.run_async(move || {
                        let _ = now.send(std::thread::current().name().map(str::to_string));
                    }),
                    scheduler.run_async_later(
                        move || {
                            let _ = later.send(std::thread::current().name().map(str::to_string));
                        },
                        1,
                    ),
                    scheduler.run_async_repeating(
                        move || {
                            let _ =
                                repeating.send(std::thread::current().name().map(str::to_string));
                        },
                        0,
                        1,
                    ),
                ]
            })
            .collect();
        assert!(async_handles
            .iter()
            .all(|h| h.backend() == HandleBackend::Global));

        host.advance(10);
        timer.cancel();
        entity_timer.cancel();
        host.advance(10);

        // each one-shot ran exactly once, the timers at their period
        assert_eq!(once_count.load(Ordering::SeqCst), 3);
        assert_eq!(timer_count.load(Ordering::SeqCst), 2);
        // two now, two later, timer at 1 and 6 before the cancel
        assert_eq!(entity_count.load(Ordering::SeqCst), 4 + 2);

        // enough runs to cover both one-shots of each kind and the repeaters
        for _ in 0..6 {
            let name = names.recv_timeout(Duration::from_secs(5)).unwrap();
            assert_eq!(name.as_deref(), Some("async-worker"));
        }
        async_handles.iter().for_each(|h| h.cancel());

        let fallbacks = scheduler.fallbacks();
        assert_eq!(fallbacks.occurrences(OperationKind::GlobalNow), 3);
        assert_eq!(fallbacks.occurrences(OperationKind::GlobalTimer), 1);
        assert_eq!(fallbacks.occurrences(OperationKind::GlobalLater), 1);
        assert_eq!(fallbacks.occurrences(OperationKind::EntityNow), 2);
        assert_eq!(fallbacks.occurrences(OperationKind::EntityLater), 2);
        assert_eq!(fallbacks.occurrences(OperationKind::EntityTimer), 1);
        assert_eq!(fallbacks.occurrences(OperationKind::AsyncNow), 2);
        assert_eq!(fallbacks.occurrences(OperationKind::AsyncLater), 2);
        assert_eq!(fallbacks.occurrences(OperationKind::AsyncTimer), 2);
        assert!(OperationKind::ALL.iter().all(|kind| fallbacks.warned(*kind)));
        assert!(scheduler.capability().is_region_threaded());
    });

    let warnings = warnings.lock().unwrap();
    let count_for = |kind: &str| warnings.iter().filter(|w| w.contains(kind)).count();
    assert_eq!(count_for("global-now"), 1);
    assert_eq!(count_for("global-timer"), 1);
    assert_eq!(count_for("global-later"), 1);
    for kind in [
        "entity-now",
        "entity-later",
        "entity-timer",
        "async-now",
        "async-later",
        "async-timer",
    ] {
        assert_eq!(count_for(kind), 1, "{}", kind);
    }
    assert_eq!(warnings.len(), 9);
}

#[test]
fn entity_without_scheduler_falls_back() {
    let host = Arc::new(GlobalLoop::new(&HostSettings::default()).unwrap());
    let scheduler = SchedulerBuilder::new(host.clone())
        .surface(Arc::new(BrokenSurface))
        .build();
    // loop entities have no scheduler method
    let entity = host.spawn_entity();
    let (count, task) = counting();

    let handle = scheduler.run_at_entity_timer(&entity, task, 2, 3);
    assert_eq!(handle.backend(), HandleBackend::Global);
    host.advance(8);
    handle.cancel();

    assert_eq!(count.load(Ordering::SeqCst), 3);
    assert_eq!(scheduler.fallbacks().occurrences(OperationKind::EntityTimer), 1);
}
