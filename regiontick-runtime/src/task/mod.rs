mod handle;
mod state;

pub use handle::{HandleBackend, NativeTask, TaskHandle};
pub use state::{TaskState, TaskStatus};
