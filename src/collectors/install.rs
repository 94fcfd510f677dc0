//! Installer and release-upgrade telemetry left behind on disk.

use serde_json::Value;
use tracing::{debug, info};

use super::ProbeContext;

/// Written by the installer at the end of installation.
pub const INSTALL_TELEMETRY: &str = "/var/log/installer/telemetry";

/// Written by the release upgrader.
pub const UPGRADE_TELEMETRY: &str = "/var/log/upgrade/telemetry";

/// How the system was installed.
pub fn collect_install(ctx: &ProbeContext) -> Option<Value> {
    read_telemetry(ctx, INSTALL_TELEMETRY)
}

/// How the system was last upgraded.
pub fn collect_upgrade(ctx: &ProbeContext) -> Option<Value> {
    read_telemetry(ctx, UPGRADE_TELEMETRY)
}

fn read_telemetry(ctx: &ProbeContext, file: &str) -> Option<Value> {
    let path = ctx.path(file);
    let content = match std::fs::read(&path) {
        Ok(content) => content,
        Err(e) => {
            info!("No telemetry at {}: {}", path.display(), e);
            return None;
        }
    };

    match serde_json::from_slice::<Value>(&content) {
        Ok(value) => {
            debug!("Loaded {} bytes from {}", content.len(), path.display());
            Some(value)
        }
        Err(e) => {
            info!("Ignoring unparsable {}: {}", path.display(), e);
            None
        }
    }
}
