//! Hardware probes: OEM, BIOS, CPU, memory and disks.

use serde_json::{json, Map, Value};
use sysinfo::{Disks, System};
use tracing::debug;

use super::ProbeContext;

const DMI_DIR: &str = "/sys/class/dmi/id";

/// Machine maker from DMI.
pub fn collect_oem(ctx: &ProbeContext) -> Option<Value> {
    dmi_fields(
        ctx,
        &[
            ("Vendor", "sys_vendor"),
            ("Product", "product_name"),
            ("Family", "product_family"),
        ],
    )
}

/// Firmware vendor and version from DMI.
pub fn collect_bios(ctx: &ProbeContext) -> Option<Value> {
    dmi_fields(ctx, &[("Vendor", "bios_vendor"), ("Version", "bios_version")])
}

fn dmi_fields(ctx: &ProbeContext, fields: &[(&str, &str)]) -> Option<Value> {
    let mut map = Map::new();
    for (key, file) in fields {
        if let Some(value) = ctx.read(&format!("{}/{}", DMI_DIR, file)) {
            if !value.is_empty() {
                map.insert((*key).to_string(), Value::String(value));
            }
        }
    }

    if map.is_empty() {
        debug!("No DMI data under {}", ctx.path(DMI_DIR).display());
        None
    } else {
        Some(Value::Object(map))
    }
}

/// Processor model and topology.
pub fn collect_cpu(_ctx: &ProbeContext) -> Option<Value> {
    let mut sys = System::new();
    sys.refresh_cpu();

    let cpus = sys.cpus();
    let first = match cpus.first() {
        Some(cpu) => cpu,
        None => {
            debug!("No CPU information available");
            return None;
        }
    };

    let mut info = json!({
        "Vendor": first.vendor_id(),
        "Name": first.brand().trim(),
        "Threads": cpus.len(),
    });
    if let Some(cores) = sys.physical_core_count() {
        info["Cores"] = json!(cores);
    }
    Some(info)
}

/// Architecture this binary runs on.
pub fn collect_arch(_ctx: &ProbeContext) -> Option<Value> {
    Some(Value::String(std::env::consts::ARCH.to_string()))
}

/// Installed memory in GB.
pub fn collect_ram(_ctx: &ProbeContext) -> Option<Value> {
    let mut sys = System::new();
    sys.refresh_memory();

    match sys.total_memory() {
        0 => {
            debug!("Total memory reported as zero");
            None
        }
        bytes => Some(json!(to_gb(bytes))),
    }
}

/// Sizes in GB of fixed disks.
pub fn collect_partitions(_ctx: &ProbeContext) -> Option<Value> {
    let disks = Disks::new_with_refreshed_list();
    let sizes: Vec<f64> = disks
        .iter()
        .filter(|disk| !disk.is_removable() && disk.total_space() > 0)
        .map(|disk| {
            debug!(
                "Disk {} ({}) mounted on {}",
                disk.name().to_string_lossy(),
                disk.file_system().to_string_lossy(),
                disk.mount_point().display()
            );
            to_gb(disk.total_space())
        })
        .collect();

    if sizes.is_empty() {
        None
    } else {
        Some(json!(sizes))
    }
}

/// Bytes to GB with one decimal.
pub fn to_gb(bytes: u64) -> f64 {
    const GB: f64 = 1_000_000_000.0;
    (bytes as f64 / GB * 10.0).round() / 10.0
}
