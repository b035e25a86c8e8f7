//! Regiontick Runtime - cross-runtime task scheduling
//!
//! Application code submits work (now, later, repeating, async, or bound to
//! an entity) without knowing whether the host runs a single global tick loop
//! or a region-threaded world. The region-threaded API is never linked against:
//! it is found by name at run time through [`HostSurface`], and any request it
//! fails is re-issued on the always-present [`GlobalScheduler`].

mod config;
mod dynamic;
mod error;
mod host;
mod probe;
mod registry;
mod runnable;
mod scheduler;
mod task;
mod time_unit;

// Re-export public API
pub use config::{load_toml_config, load_yaml_config, HostSettings};
pub use dynamic::{no_such_method, Args, DynObject, Entity, HostOperation, HostSurface, Value};
pub use error::{HostError, InvokeError};
pub use host::{GlobalLoop, RegionHost};
pub use linkme;
pub use probe::{Capability, ASYNC_SCHEDULER, GLOBAL_REGION_SCHEDULER};
pub use registry::{HostExport, LinkedSurface, HOST_EXPORTS};
pub use runnable::{retired, Affinity, Repeat, Runnable, Task, TaskSpec, TaskSpecBuilder, Timing};
pub use scheduler::{
    DynamicRegionApi, FallbackLog, GlobalPath, GlobalScheduler, OperationKind, RegionApi,
    Scheduler, SchedulerBuilder,
};
pub use task::{HandleBackend, NativeTask, TaskHandle, TaskState, TaskStatus};
pub use time_unit::{ticks_to_duration, ticks_to_millis, TimeUnit, MILLIS_PER_TICK};
