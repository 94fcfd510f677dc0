//! Software probes: OS release, desktop session, locale and timezone.

use serde_json::{json, Map, Value};
use std::collections::HashMap;
use sysinfo::System;
use tracing::debug;

use super::ProbeContext;
use crate::store::CacheKey;

const OS_RELEASE_PATHS: &[&str] = &["/etc/os-release", "/usr/lib/os-release"];

/// Which OS release this host runs. Scopes the stored decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsIdentity {
    /// Distribution id, e.g. `ubuntu`.
    pub id: String,
    /// Release version, e.g. `24.04`.
    pub version_id: String,
    /// Human readable name, when known.
    pub pretty_name: Option<String>,
}

impl OsIdentity {
    /// Read the OS identity from os-release under the probe root, falling
    /// back to what the running kernel reports.
    pub fn detect(ctx: &ProbeContext) -> Self {
        for path in OS_RELEASE_PATHS {
            if let Some(content) = ctx.read(path) {
                let fields = parse_os_release(&content);
                if let Some(id) = fields.get("ID") {
                    debug!("OS identity from {}", path);
                    return Self {
                        id: id.clone(),
                        version_id: fields
                            .get("VERSION_ID")
                            .cloned()
                            .unwrap_or_else(|| "unknown".to_string()),
                        pretty_name: fields.get("PRETTY_NAME").cloned(),
                    };
                }
            }
        }

        debug!("No usable os-release, asking the system");
        Self {
            id: non_empty(System::distribution_id()).unwrap_or_else(|| "unknown".to_string()),
            version_id: System::os_version()
                .and_then(non_empty)
                .unwrap_or_else(|| "unknown".to_string()),
            pretty_name: System::long_os_version(),
        }
    }

    /// Cache key for this release.
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(&self.id, &self.version_id)
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Parse `KEY=value` lines, unquoting values.
pub fn parse_os_release(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
            (key.trim().to_string(), value.to_string())
        })
        .collect()
}

/// Distribution and release.
pub fn collect_os(ctx: &ProbeContext) -> Option<Value> {
    let identity = OsIdentity::detect(ctx);
    let mut info = json!({
        "Distribution": identity.id,
        "Release": identity.version_id,
        "Kernel": System::kernel_version(),
    });
    if let Some(name) = identity.pretty_name {
        info["Name"] = json!(name);
    }
    Some(info)
}

/// Desktop environment and display server type.
pub fn collect_session(_ctx: &ProbeContext) -> Option<Value> {
    session_from(|name| std::env::var(name).ok())
}

fn session_from(lookup: impl Fn(&str) -> Option<String>) -> Option<Value> {
    let mut map = Map::new();
    for (key, var) in [
        ("DE", "XDG_CURRENT_DESKTOP"),
        ("Name", "XDG_SESSION_DESKTOP"),
        ("Type", "XDG_SESSION_TYPE"),
    ] {
        if let Some(value) = lookup(var).filter(|v| !v.is_empty()) {
            map.insert(key.to_string(), Value::String(value));
        }
    }

    if map.is_empty() {
        debug!("Not running in a desktop session");
        None
    } else {
        Some(Value::Object(map))
    }
}

/// Locale without encoding, e.g. `en_US`.
pub fn collect_language(_ctx: &ProbeContext) -> Option<Value> {
    let lang = std::env::var("LANG").ok()?;
    language_from(&lang).map(Value::String)
}

fn language_from(lang: &str) -> Option<String> {
    let base = lang.split(['.', '@']).next().unwrap_or_default().trim();
    if base.is_empty() || base == "C" || base == "POSIX" {
        None
    } else {
        Some(base.to_string())
    }
}

/// Configured timezone name.
pub fn collect_timezone(ctx: &ProbeContext) -> Option<Value> {
    if let Some(tz) = ctx.read("/etc/timezone").filter(|tz| !tz.is_empty()) {
        return Some(Value::String(tz));
    }

    let link = std::fs::read_link(ctx.path("/etc/localtime")).ok()?;
    let target = link.to_string_lossy();
    match target.split_once("zoneinfo/") {
        Some((_, zone)) if !zone.is_empty() => Some(Value::String(zone.to_string())),
        _ => {
            debug!("Can't tell timezone from {}", target);
            None
        }
    }
}
