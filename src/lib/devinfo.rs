// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::{
    ConfigEntry, DeviceConfig, ErrorKind, NetfabError, NetworkConfig,
    SubnetConfig, SubnetType,
};

/// Host device enumeration. Injected so callers and tests can supply
/// something other than the live sysfs tree.
pub trait DeviceInfo {
    fn devices(&self) -> Vec<String>;
    fn mac_address(&self, name: &str) -> Option<String>;
    fn owns_mac(&self, name: &str) -> bool;
    fn is_bridge(&self, name: &str) -> bool;
    fn has_carrier(&self, name: &str) -> bool;
    fn is_dormant(&self, name: &str) -> bool;
    fn operstate(&self, name: &str) -> String;
}

/// Reads device facts from a `/sys/class/net` style tree.
#[derive(Debug, Clone)]
pub struct SysfsDeviceInfo {
    root: PathBuf,
}

impl Default for SysfsDeviceInfo {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/sys/class/net"),
        }
    }
}

impl SysfsDeviceInfo {
    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    fn read_attr(&self, name: &str, attr: &str) -> Option<String> {
        let content =
            std::fs::read_to_string(self.root.join(name).join(attr)).ok()?;
        let content = content.trim().to_string();
        if content.is_empty() {
            None
        } else {
            Some(content)
        }
    }
}

impl DeviceInfo for SysfsDeviceInfo {
    fn devices(&self) -> Vec<String> {
        let mut names = Vec::new();
        if let Ok(entries) = std::fs::read_dir(&self.root) {
            for entry in entries.flatten() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort_unstable();
        names
    }

    fn mac_address(&self, name: &str) -> Option<String> {
        self.read_attr(name, "address")
    }

    fn owns_mac(&self, name: &str) -> bool {
        // addr_assign_type 2 marks an address taken over from another
        // device (bond or vlan over a slave); 0/1/3 and a missing
        // attribute mean the hardware address is the device's own.
        self.read_attr(name, "addr_assign_type").as_deref() != Some("2")
    }

    fn is_bridge(&self, name: &str) -> bool {
        self.root.join(name).join("bridge").is_dir()
    }

    fn has_carrier(&self, name: &str) -> bool {
        self.read_attr(name, "carrier").as_deref() == Some("1")
    }

    fn is_dormant(&self, name: &str) -> bool {
        self.read_attr(name, "dormant").as_deref() == Some("1")
    }

    fn operstate(&self, name: &str) -> String {
        self.read_attr(name, "operstate")
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// MAC to interface-name table over MAC-owning, non-bridge devices.
/// Devices without a hardware address are silently left out; two
/// devices reporting the same address is fatal.
pub fn interfaces_by_mac(
    info: &dyn DeviceInfo,
) -> Result<BTreeMap<String, String>, NetfabError> {
    let mut table: BTreeMap<String, String> = BTreeMap::new();
    for name in info.devices() {
        if info.is_bridge(&name) || !info.owns_mac(&name) {
            continue;
        }
        let mac = match info.mac_address(&name) {
            Some(mac) => mac,
            None => continue,
        };
        if let Some(other) = table.get(&mac) {
            return Err(NetfabError::new(
                ErrorKind::DuplicateMac,
                format!(
                    "Duplicate mac found: {mac} on both {other} and {name}"
                ),
            ));
        }
        table.insert(mac, name);
    }
    Ok(table)
}

const POSSIBLY_CONNECTED_STATES: [&str; 4] =
    ["dormant", "down", "lowerlayerdown", "unknown"];

/// Pick a likely-connected NIC and build a minimal DHCP document for
/// it. `None` when no candidate device exists.
pub fn generate_fallback_config(
    info: &dyn DeviceInfo,
) -> Option<NetworkConfig> {
    let mut connected = Vec::new();
    let mut possible = Vec::new();
    for name in info.devices() {
        if name == "lo" || name.starts_with("veth") || info.is_bridge(&name) {
            continue;
        }
        if info.has_carrier(&name) {
            connected.push(name);
        } else if info.is_dormant(&name)
            || POSSIBLY_CONNECTED_STATES
                .contains(&info.operstate(&name).as_str())
        {
            possible.push(name);
        }
    }
    let mut names = if connected.is_empty() { possible } else { connected };
    names.sort_unstable();
    if let Some(pos) = names.iter().position(|n| n == "eth0") {
        names.remove(pos);
        names.insert(0, "eth0".to_string());
    }
    for name in names {
        let mac = match info.mac_address(&name) {
            Some(mac) => mac,
            None => continue,
        };
        let entry = ConfigEntry::Physical(DeviceConfig {
            name,
            mac_address: Some(mac),
            mtu: None,
            subnets: vec![SubnetConfig::new(SubnetType::Dhcp)],
        });
        return NetworkConfig::from_entries(vec![entry]).ok();
    }
    None
}
