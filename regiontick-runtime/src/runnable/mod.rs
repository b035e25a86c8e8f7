mod r#trait;
mod task;

pub use r#trait::Runnable;
pub use task::{retired, Affinity, Repeat, Task, TaskSpec, TaskSpecBuilder, Timing};
