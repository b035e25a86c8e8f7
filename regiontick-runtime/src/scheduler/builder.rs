use super::fallback::FallbackLog;
use super::global::{GlobalPath, GlobalScheduler};
use super::region::{DynamicRegionApi, RegionApi};
use super::scheduler::Scheduler;
use crate::dynamic::HostSurface;
use crate::probe::Capability;
use crate::registry::LinkedSurface;
use std::sync::Arc;
use tracing::info;

/// Builder for the scheduler
///
/// The global scheduler is always required: it is the fallback for every
/// request. Everything else defaults to probing the exports linked into the
/// binary.
pub struct SchedulerBuilder {
    global: Arc<dyn GlobalScheduler>,
    surface: Option<Arc<dyn HostSurface>>,
    capability: Option<Capability>,
    region_api: Option<Arc<dyn RegionApi>>,
}

impl SchedulerBuilder {
    pub fn new(global: Arc<dyn GlobalScheduler>) -> Self {
        Self {
            global,
            surface: None,
            capability: None,
            region_api: None,
        }
    }

    /// Reach the region-threaded host through `surface` instead of the linked exports
    pub fn surface(mut self, surface: Arc<dyn HostSurface>) -> Self {
        self.surface = Some(surface);
        self
    }

    /// Skip the probe and use this capability
    pub fn capability(mut self, capability: Capability) -> Self {
        self.capability = Some(capability);
        self
    }

    /// Use a custom region path instead of dynamic invocation on the surface
    pub fn region_api(mut self, region_api: Arc<dyn RegionApi>) -> Self {
        self.region_api = Some(region_api);
        self
    }

    /// Build the scheduler.
    ///
    /// Without an explicit capability, an injected surface is probed here and
    /// the linked exports are probed once per process.
    pub fn build(self) -> Scheduler {
        let capability = match (self.capability, &self.surface) {
            (Some(capability), _) => capability,
            (None, Some(surface)) => Capability::probe(surface.as_ref()),
            (None, None) => Capability::detect(),
        };

        let region = capability.is_region_threaded().then(|| {
            self.region_api.unwrap_or_else(|| {
                let surface = self
                    .surface
                    .unwrap_or_else(|| Arc::new(LinkedSurface) as Arc<dyn HostSurface>);
                Arc::new(DynamicRegionApi::new(surface)) as Arc<dyn RegionApi>
            })
        });

        info!(
            backend = capability.backend_name(),
            region_path = region.is_some(),
            "Building scheduler"
        );

        Scheduler {
            capability,
            global: GlobalPath::new(self.global),
            region,
            fallbacks: Arc::new(FallbackLog::new()),
        }
    }
}
