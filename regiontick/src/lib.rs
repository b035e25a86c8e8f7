//! # Regiontick - Tick Scheduling for Global-Loop and Region-Threaded Hosts
//!
//! Submit work once and have it run correctly whichever way the host is
//! threaded:
//!
//! - **Single global loop**: all sync work runs on one authoritative tick
//!   context, async work on a background pool.
//! - **Region-threaded**: the world is split into regions, each ticked by its
//!   own worker; work bound to an entity runs on the worker that owns it.
//!
//! The backend is chosen by probing the host at run time. Nothing in your code
//! or configuration names it.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use regiontick::{GlobalLoop, HostSettings, SchedulerBuilder};
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let host = Arc::new(GlobalLoop::new(&HostSettings::default())?);
//!     host.start()?;
//!
//!     let scheduler = SchedulerBuilder::new(host.clone()).build();
//!     let autosave = scheduler.run_timer(|| println!("saving"), 20, 6000);
//!     scheduler.run_async(|| println!("off the tick thread"));
//!
//!     // ...
//!     autosave.cancel();
//!     host.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! ## Exposing a Region-Threaded Host
//!
//! A region-threaded host publishes its schedulers by name. The scheduler
//! finds them through the link-time export registry, so neither side depends
//! on the other:
//!
//! ```rust,ignore
//! use regiontick::{host_export, InvokeError, Value};
//!
//! #[host_export]
//! fn global_region_scheduler() -> Result<Value, InvokeError> {
//!     Ok(Value::object(MyGlobalRegionScheduler::current()))
//! }
//!
//! #[host_export]
//! fn async_scheduler() -> Result<Value, InvokeError> {
//!     Ok(Value::object(MyAsyncScheduler::current()))
//! }
//! ```
//!
//! ## Configuration
//!
//! The bundled hosts are sized from a `[host]` table:
//!
//! ```toml
//! [host]
//! tick_interval = "50ms"
//! regions = 4
//! async_workers = 2
//! ```
//!
//! Environment variables with the `REGIONTICK__` prefix override the file,
//! e.g. `REGIONTICK__HOST__REGIONS=8`.

// Re-export macros
pub use regiontick_macro::host_export;

// Re-export core types
pub use regiontick_runtime::{
    load_toml_config, load_yaml_config, retired, ticks_to_duration, ticks_to_millis, Capability,
    DynObject, Entity, GlobalLoop, GlobalScheduler, HandleBackend, HostError, HostSettings,
    HostSurface, InvokeError, OperationKind, RegionApi, RegionHost, Runnable, Scheduler,
    SchedulerBuilder, Task, TaskHandle, TaskSpec, TimeUnit, Value, MILLIS_PER_TICK,
};

// Make regiontick_runtime available for macro expansion
pub use regiontick_runtime;
