use crate::error::HostError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Dedicated thread calling a tick function at a fixed wall-clock interval.
///
/// The tick function returns false to stop the driver from inside, which is
/// what happens once the host it drives has been dropped.
pub(crate) struct TickDriver {
    name: String,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl TickDriver {
    pub(crate) fn spawn<F>(name: &str, interval: Duration, mut tick: F) -> Result<Self, HostError>
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();

        let thread = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                while !flag.load(Ordering::Acquire) {
                    let started = Instant::now();
                    if !tick() {
                        break;
                    }
                    if let Some(rest) = interval.checked_sub(started.elapsed()) {
                        thread::sleep(rest);
                    }
                }
                debug!("Tick driver exiting");
            })
            .map_err(|source| HostError::Thread {
                name: name.to_string(),
                source,
            })?;

        info!(thread = name, interval_ms = interval.as_millis() as u64, "Tick driver started");
        Ok(Self {
            name: name.to_string(),
            stop,
            thread: Some(thread),
        })
    }

    /// Stop ticking and wait for the thread, unless called from the driver itself
    pub(crate) fn stop(mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.thread().id() != thread::current().id() {
                let _ = thread.join();
            }
        }
        info!(thread = %self.name, "Tick driver stopped");
    }
}
