use crate::dynamic::HostSurface;
use crate::registry::LinkedSurface;
use once_cell::sync::OnceCell;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, info};

/// Top-level operation handing out the region-threaded host's global scheduler
pub const GLOBAL_REGION_SCHEDULER: &str = "global_region_scheduler";

/// Top-level operation handing out the region-threaded host's async scheduler
pub const ASYNC_SCHEDULER: &str = "async_scheduler";

static DETECTED: OnceCell<Capability> = OnceCell::new();

/// Which scheduling model the host exposes.
///
/// Computed once and then passed around by value; nothing flips it after the
/// probe, not even repeated invocation failures on the region path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capability {
    region_threaded: bool,
}

impl Capability {
    /// Single global tick loop only
    pub const fn simple() -> Self {
        Self {
            region_threaded: false,
        }
    }

    pub const fn region_threaded() -> Self {
        Self {
            region_threaded: true,
        }
    }

    pub fn is_region_threaded(&self) -> bool {
        self.region_threaded
    }

    /// Look for both region scheduler operations on `surface`.
    ///
    /// Never fails: anything that goes wrong while resolving means "simple".
    pub fn probe(surface: &dyn HostSurface) -> Self {
        let resolved = |name: &str| {
            panic::catch_unwind(AssertUnwindSafe(|| surface.resolve(name).is_some()))
                .unwrap_or(false)
        };

        let global = resolved(GLOBAL_REGION_SCHEDULER);
        let asynchronous = resolved(ASYNC_SCHEDULER);
        debug!(global, asynchronous, "Probed host surface");

        Self {
            region_threaded: global && asynchronous,
        }
    }

    /// Probe the link-time export registry, once per process
    pub fn detect() -> Self {
        *DETECTED.get_or_init(|| {
            let capability = Self::probe(&LinkedSurface);
            info!(backend = capability.backend_name(), "Selected scheduling backend");
            capability
        })
    }

    pub fn backend_name(&self) -> &'static str {
        if self.region_threaded {
            "region-threaded"
        } else {
            "global-loop"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamic::{HostOperation, Value};
    use crate::error::InvokeError;
    use std::collections::HashSet;
    use std::sync::Arc;

    struct Names(HashSet<&'static str>);

    impl HostSurface for Names {
        fn resolve(&self, name: &str) -> Option<HostOperation> {
            if self.0.contains(name) {
                Some(Arc::new(|| Ok::<_, InvokeError>(Value::Unit)))
            } else {
                None
            }
        }
    }

    struct Exploding;

    impl HostSurface for Exploding {
        fn resolve(&self, _name: &str) -> Option<HostOperation> {
            panic!("surface unavailable");
        }
    }

    fn surface(names: &[&'static str]) -> Names {
        Names(names.iter().copied().collect())
    }

    #[test]
    fn needs_both_operations() {
        assert!(
            Capability::probe(&surface(&[GLOBAL_REGION_SCHEDULER, ASYNC_SCHEDULER]))
                .is_region_threaded()
        );
        assert!(!Capability::probe(&surface(&[GLOBAL_REGION_SCHEDULER])).is_region_threaded());
        assert!(!Capability::probe(&surface(&[ASYNC_SCHEDULER])).is_region_threaded());
        assert!(!Capability::probe(&surface(&[])).is_region_threaded());
    }

    #[test]
    fn panicking_surface_means_simple() {
        assert_eq!(Capability::probe(&Exploding), Capability::simple());
    }

    #[test]
    fn detect_is_memoized() {
        // nothing in this crate's test binary exports the region names
        let first = Capability::detect();
        assert_eq!(first, Capability::simple());
        assert_eq!(Capability::detect(), first);
    }
}
