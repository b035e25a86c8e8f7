mod builder;
mod fallback;
mod global;
mod region;
mod scheduler;

pub use builder::SchedulerBuilder;
pub use fallback::{FallbackLog, OperationKind};
pub use global::{GlobalPath, GlobalScheduler};
pub use region::{DynamicRegionApi, RegionApi};
pub use scheduler::Scheduler;
