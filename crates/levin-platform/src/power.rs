//! AC power detection via the power-supply sysfs tree.

use std::path::Path;

const POWER_SUPPLY_DIR: &str = "/sys/class/power_supply";

/// Whether the host is running on mains power.
///
/// Hosts without any `Mains`-type supply (desktops, servers, containers) are
/// treated as on AC.
#[must_use]
pub fn is_on_ac_power() -> bool {
    ac_state(Path::new(POWER_SUPPLY_DIR))
}

fn ac_state(supply_dir: &Path) -> bool {
    let Ok(entries) = std::fs::read_dir(supply_dir) else {
        return true;
    };

    let mut found_mains = false;
    for entry in entries.flatten() {
        let base = entry.path();
        if read_sysfs(&base.join("type")).as_deref() != Some("Mains") {
            continue;
        }
        found_mains = true;
        if read_sysfs(&base.join("online")).as_deref() == Some("1") {
            // One online mains supply is enough.
            return true;
        }
    }

    !found_mains
}

/// First line of a sysfs attribute, trimmed.
fn read_sysfs(path: &Path) -> Option<String> {
    let contents = std::fs::read_to_string(path).ok()?;
    Some(contents.trim().to_string())
}
