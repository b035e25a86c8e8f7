use crate::dynamic::{HostOperation, HostSurface, Value};
use crate::error::InvokeError;
use std::fmt;
use std::sync::Arc;

/// One named top-level operation contributed by a host crate
pub struct HostExport {
    pub name: &'static str,
    pub resolve: fn() -> Result<Value, InvokeError>,
}

impl fmt::Debug for HostExport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostExport").field("name", &self.name).finish()
    }
}

/// Global distributed slice collecting every host export linked into the binary.
///
/// Populated by the `#[host_export]` macro; the scheduler never names the host
/// crate, it only looks entries up here by name.
#[linkme::distributed_slice]
pub static HOST_EXPORTS: [HostExport] = [..];

/// The surface formed by everything in [`HOST_EXPORTS`]
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkedSurface;

impl LinkedSurface {
    pub fn names(&self) -> impl Iterator<Item = &'static str> {
        HOST_EXPORTS.iter().map(|export| export.name)
    }
}

impl HostSurface for LinkedSurface {
    fn resolve(&self, name: &str) -> Option<HostOperation> {
        let export = HOST_EXPORTS.iter().find(|export| export.name == name)?;
        let resolve = export.resolve;
        Some(Arc::new(resolve))
    }
}
