//! Shared per-request state.

use matterlink_core::Controller;

use crate::mirror::Mirror;

/// Everything a route handler needs, cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub controller: Controller,
    pub mirror: Mirror,
}

impl AppState {
    pub fn new(controller: Controller, mirror: Mirror) -> Self {
        Self { controller, mirror }
    }

    /// Mirror the current registry snapshot. Best-effort: failures are
    /// logged and never surfaced to the request that triggered them.
    ///
    /// An empty registry (no bridge session yet, or nothing commissioned)
    /// is never mirrored: pruning against it would erase every persisted
    /// row, including operator-assigned names.
    pub async fn mirror_registry(&self) {
        let devices = self.controller.list_devices();
        if devices.is_empty() {
            return;
        }
        if let Err(e) = self.mirror.sync(&devices).await {
            tracing::warn!(error = %e, "mirror sync failed");
        }
    }
}
