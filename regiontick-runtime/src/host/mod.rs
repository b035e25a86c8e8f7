//! In-process host runtimes.
//!
//! [`GlobalLoop`] models a host with one authoritative tick loop and
//! [`RegionHost`] one that splits the world into independently ticked regions.
//! Both can be ticked by hand, which is how the tests drive them, or in real
//! time from a driver thread.

mod async_pool;
mod driver;
mod global_loop;
mod queue;
mod region;
mod task;

pub use global_loop::GlobalLoop;
pub use region::RegionHost;
