//! Graphics probes: GPUs, connected screens and login manager autologin.

use regex::Regex;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{run_command, ProbeContext};

const GDM_CONFIG: &str = "/etc/gdm3/custom.conf";

/// Display controllers as PCI vendor and device ids.
pub fn collect_gpu(_ctx: &ProbeContext) -> Option<Value> {
    let output = match run_command("lspci", &["-n"]) {
        Ok(output) => output,
        Err(e) => {
            info!("GPU info unavailable: {}", e);
            return None;
        }
    };

    let gpus = parse_lspci(&output);
    if gpus.is_empty() {
        info!("No GPU info found in lspci output");
        None
    } else {
        Some(Value::Array(gpus))
    }
}

/// Pick display controller lines (PCI class 03xx) out of `lspci -n`.
///
/// Lines look like `00:02.0 0300: 8086:0126 (rev 09)`.
pub fn parse_lspci(output: &str) -> Vec<Value> {
    let re = Regex::new(r"^\S+\s+03[0-9a-fA-F]{2}:\s+([0-9a-fA-F]{4}):([0-9a-fA-F]{4})")
        .expect("Invalid lspci regex");

    output
        .lines()
        .filter_map(|line| re.captures(line.trim()))
        .map(|caps| {
            json!({
                "Vendor": caps[1].to_lowercase(),
                "Model": caps[2].to_lowercase(),
            })
        })
        .collect()
}

/// Connected screens with their physical size and active mode.
pub fn collect_screens(_ctx: &ProbeContext) -> Option<Value> {
    let output = match run_command("xrandr", &["-q", "--current"]) {
        Ok(output) => output,
        Err(e) => {
            info!("Screen info unavailable: {}", e);
            return None;
        }
    };

    let screens = parse_xrandr(&output);
    if screens.is_empty() {
        info!("No Screen info found in xrandr output");
        None
    } else {
        Some(Value::Array(screens))
    }
}

/// Parse `xrandr -q` output.
///
/// A connected output line is followed by its indented modes; the active
/// one carries a `*` next to its refresh rate.
pub fn parse_xrandr(output: &str) -> Vec<Value> {
    let size_re = Regex::new(r"(\d+mm x \d+mm)").expect("Invalid size regex");
    let mode_re = Regex::new(r"^\s+(\d+x\d+)\S*\s+(.*)$").expect("Invalid mode regex");

    let mut screens = Vec::new();
    let mut current: Option<Value> = None;

    for line in output.lines() {
        if !line.starts_with(char::is_whitespace) {
            if let Some(screen) = current.take() {
                screens.push(screen);
            }
            let mut fields = line.split_whitespace();
            let _name = fields.next();
            if fields.next() == Some("connected") {
                let mut screen = json!({});
                if let Some(caps) = size_re.captures(line) {
                    screen["Size"] = json!(&caps[1]);
                }
                current = Some(screen);
            }
            continue;
        }

        if let (Some(screen), Some(caps)) = (current.as_mut(), mode_re.captures(line)) {
            let active = caps[2]
                .split_whitespace()
                .find(|rate| rate.contains('*'));
            if let Some(rate) = active {
                screen["Resolution"] = json!(&caps[1]);
                screen["Frequency"] = json!(rate.trim_end_matches(['*', '+']));
            }
        }
    }

    if let Some(screen) = current {
        screens.push(screen);
    }

    screens
}

/// Whether GDM logs a user in automatically.
pub fn collect_autologin(ctx: &ProbeContext) -> Option<Value> {
    let path = ctx.path(GDM_CONFIG);
    match std::fs::read_to_string(&path) {
        Ok(content) => {
            let enabled = parse_gdm_autologin(&content);
            debug!("Autologin enabled: {}", enabled);
            Some(Value::Bool(enabled))
        }
        Err(e) => {
            info!("No autologin information in {}: {}", path.display(), e);
            None
        }
    }
}

/// `AutomaticLoginEnable` from the `[daemon]` section, false when unset.
pub fn parse_gdm_autologin(content: &str) -> bool {
    let mut in_daemon = false;
    for line in content.lines().map(str::trim) {
        if line.starts_with('[') {
            in_daemon = line.eq_ignore_ascii_case("[daemon]");
            continue;
        }
        if !in_daemon || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            if key.trim() == "AutomaticLoginEnable" {
                let value = value.trim().to_ascii_lowercase();
                return value == "true" || value == "1";
            }
        }
    }
    false
}
