/// A unit of work the scheduler can run, once or repeatedly.
///
/// Implemented for every `Fn() + Send + Sync` closure, so most callers never
/// name this trait:
///
/// ```rust
/// use regiontick_runtime::{Runnable, Task};
/// use std::sync::Arc;
///
/// struct Heartbeat;
///
/// impl Runnable for Heartbeat {
///     fn run(&self) {
///         println!("tick");
///     }
/// }
///
/// let explicit: Task = Arc::new(Heartbeat);
/// let closure: Task = Arc::new(|| println!("tick"));
/// explicit.run();
/// closure.run();
/// ```
pub trait Runnable: Send + Sync {
    /// Execute the scheduled work
    fn run(&self);
}

impl<F> Runnable for F
where
    F: Fn() + Send + Sync,
{
    fn run(&self) {
        self()
    }
}
