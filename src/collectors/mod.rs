//! Host fact probes.
//!
//! Each probe is a named function returning an optional JSON blob. A probe
//! that finds nothing (missing file, missing tool, unsupported platform)
//! returns `None` and the category is left out of the report.

pub mod display;
pub mod hardware;
pub mod install;
pub mod software;

pub use software::OsIdentity;

use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Command;
use tracing::debug;

/// Where probes look for files.
#[derive(Debug, Clone)]
pub struct ProbeContext {
    root: PathBuf,
}

impl ProbeContext {
    /// Probes reading under `root` instead of `/`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Probes reading the live system.
    pub fn system() -> Self {
        Self::new("/")
    }

    /// Resolve an absolute system path under the root.
    pub fn path(&self, absolute: &str) -> PathBuf {
        self.root.join(absolute.trim_start_matches('/'))
    }

    /// Read a file under the root, trimmed. `None` if absent or unreadable.
    pub fn read(&self, absolute: &str) -> Option<String> {
        let path = self.path(absolute);
        match std::fs::read_to_string(&path) {
            Ok(content) => Some(content.trim().to_string()),
            Err(e) => {
                debug!("Can't read {}: {}", path.display(), e);
                None
            }
        }
    }
}

impl Default for ProbeContext {
    fn default() -> Self {
        Self::system()
    }
}

/// Signature every probe implements.
pub type ProbeFn = fn(&ProbeContext) -> Option<Value>;

/// One named category of facts.
#[derive(Clone, Copy)]
pub struct Probe {
    /// Category name in the report.
    pub name: &'static str,
    /// Producer for the category.
    pub collect: ProbeFn,
}

impl Probe {
    /// Pair a category name with its producer.
    pub const fn new(name: &'static str, collect: ProbeFn) -> Self {
        Self { name, collect }
    }
}

impl std::fmt::Debug for Probe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Probe").field("name", &self.name).finish()
    }
}

/// Every probe this tool knows about, in report order.
pub fn default_probes() -> Vec<Probe> {
    vec![
        Probe::new("OS", software::collect_os),
        Probe::new("OEM", hardware::collect_oem),
        Probe::new("BIOS", hardware::collect_bios),
        Probe::new("CPU", hardware::collect_cpu),
        Probe::new("Arch", hardware::collect_arch),
        Probe::new("RAM", hardware::collect_ram),
        Probe::new("Partitions", hardware::collect_partitions),
        Probe::new("GPU", display::collect_gpu),
        Probe::new("Screens", display::collect_screens),
        Probe::new("Autologin", display::collect_autologin),
        Probe::new("Session", software::collect_session),
        Probe::new("Language", software::collect_language),
        Probe::new("Timezone", software::collect_timezone),
        Probe::new("Install", install::collect_install),
        Probe::new("Upgrade", install::collect_upgrade),
    ]
}

/// Run every probe and gather what they found.
pub fn collect(probes: &[Probe], ctx: &ProbeContext) -> BTreeMap<String, Value> {
    let mut facts = BTreeMap::new();
    for probe in probes {
        match (probe.collect)(ctx) {
            Some(data) => {
                debug!("{}: {}", probe.name, data);
                facts.insert(probe.name.to_string(), data);
            }
            None => debug!("{}: no data", probe.name),
        }
    }
    facts
}

/// Run an external tool and return its stdout.
pub(crate) fn run_command(program: &str, args: &[&str]) -> Result<String, String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| format!("couldn't run {}: {}", program, e))?;

    if !output.status.success() {
        return Err(format!(
            "{} exited with {}: {}",
            program,
            output.status,
            String::from_utf8_lossy(&output.stderr)
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}
