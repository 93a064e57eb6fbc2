// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::io::Read;
use std::path::PathBuf;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::{
    ConfigEntry, DeviceConfig, ErrorKind, NetfabError, NetworkConfig,
    SubnetConfig, SubnetControl, SubnetType,
};

/// KEY=VALUE lines as written by klibc ipconfig, quotes stripped.
fn parse_shell_vars(content: &str) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let value = value
                .trim_matches('\'')
                .trim_matches('"')
                .to_string();
            vars.insert(key.to_string(), value);
        }
    }
    vars
}

fn proto_to_subnet_type(proto: &str) -> Result<SubnetType, NetfabError> {
    match proto {
        "dhcp" => Ok(SubnetType::Dhcp),
        "dhcp6" => Ok(SubnetType::Dhcp6),
        "static" => Ok(SubnetType::Static),
        "none" => Ok(SubnetType::Manual),
        _ => Err(NetfabError::new(
            ErrorKind::InvalidSchema,
            format!("Unexpected value for PROTO: {proto}"),
        )),
    }
}

/// Convert one klibc lease block to a physical interface entry.
pub fn klibc_to_config_entry(
    content: &str,
    mac_addrs: &BTreeMap<String, String>,
) -> Result<(String, ConfigEntry), NetfabError> {
    let vars = parse_shell_vars(content);
    let name = vars
        .get("DEVICE")
        .or_else(|| vars.get("DEVICE6"))
        .cloned()
        .ok_or_else(|| {
            NetfabError::new(
                ErrorKind::InvalidSchema,
                "No DEVICE or DEVICE6 entry in lease data".to_string(),
            )
        })?;
    let proto = match vars
        .get("PROTO")
        .or_else(|| vars.get("IPV6PROTO"))
        .filter(|p| !p.is_empty())
    {
        Some(proto) => proto.clone(),
        // Some initramfs tools skip PROTO; a boot file implies dhcp.
        None => {
            if vars.get("filename").map(|f| !f.is_empty()).unwrap_or(false) {
                "dhcp".to_string()
            } else {
                "none".to_string()
            }
        }
    };
    let subnet_type = proto_to_subnet_type(&proto)?;

    let mut subnets = Vec::new();
    for pre in ["IPV4", "IPV6"] {
        if !vars.contains_key(&format!("{pre}ADDR")) {
            continue;
        }
        let mut subnet = SubnetConfig {
            subnet_type,
            control: SubnetControl::Manual,
            ..Default::default()
        };
        subnet.netmask = vars.get(&format!("{pre}NETMASK")).cloned();
        subnet.broadcast = vars.get(&format!("{pre}BROADCAST")).cloned();
        subnet.gateway = vars.get(&format!("{pre}GATEWAY")).cloned();
        let mut dns = Vec::new();
        for nskey in ["DNS0", "DNS1"] {
            if let Some(ns) = vars.get(&format!("{pre}{nskey}")) {
                // 0.0.0.0 and :: placeholders are not nameservers
                if !ns.is_empty()
                    && !ns.trim_matches([':', '.', '0']).is_empty()
                {
                    dns.push(ns.clone());
                }
            }
        }
        if !dns.is_empty() {
            subnet.dns_nameservers = dns;
            if let Some(search) =
                vars.get("DOMAINSEARCH").filter(|s| !s.is_empty())
            {
                subnet.dns_search =
                    search.split_whitespace().map(str::to_string).collect();
            }
        }
        subnets.push(subnet);
    }

    let device = DeviceConfig {
        mac_address: mac_addrs.get(&name).cloned(),
        name: name.clone(),
        mtu: None,
        subnets,
    };
    Ok((name, ConfigEntry::Physical(device)))
}

/// Merge a set of klibc lease files, one entry per device. A device
/// seen in both a v4 and a v6 file contributes a single entry with the
/// subnets of both.
pub fn config_from_klibc_net_cfg(
    files: &[PathBuf],
    mac_addrs: &BTreeMap<String, String>,
) -> Result<NetworkConfig, NetfabError> {
    let mut devices: Vec<(String, DeviceConfig)> = Vec::new();
    for file in files {
        let content = std::fs::read_to_string(file)?;
        let (name, entry) = klibc_to_config_entry(&content, mac_addrs)?;
        let device = match entry {
            ConfigEntry::Physical(device) => device,
            _ => continue,
        };
        match devices.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => {
                if existing.mac_address != device.mac_address {
                    return Err(NetfabError::new(
                        ErrorKind::InvalidArgument,
                        format!(
                            "Device {name} has differing mac addresses: \
                             {:?} and {:?}",
                            existing.mac_address, device.mac_address
                        ),
                    ));
                }
                existing.subnets.extend(device.subnets);
            }
            None => devices.push((name, device)),
        }
    }
    NetworkConfig::from_entries(
        devices
            .into_iter()
            .map(|(_, device)| ConfigEntry::Physical(device))
            .collect(),
    )
}

fn decode_payload(data64: &str) -> Result<NetworkConfig, NetfabError> {
    let bytes = STANDARD.decode(data64).map_err(|e| {
        NetfabError::new(
            ErrorKind::DecodeFailure,
            format!("Invalid base64 payload: {e}"),
        )
    })?;
    let text = if bytes.starts_with(&[0x1f, 0x8b]) {
        let mut decoder = flate2::read::GzDecoder::new(bytes.as_slice());
        let mut text = String::new();
        decoder.read_to_string(&mut text).map_err(|e| {
            NetfabError::new(
                ErrorKind::DecodeFailure,
                format!("Invalid gzip payload: {e}"),
            )
        })?;
        text
    } else {
        String::from_utf8(bytes).map_err(|e| {
            NetfabError::new(
                ErrorKind::DecodeFailure,
                format!("Payload is not text: {e}"),
            )
        })?
    };
    Ok(serde_yaml::from_str(&text)?)
}

fn file_gated(file: &PathBuf, has_ip: bool, has_ip6: bool) -> bool {
    let basename = match file.file_name() {
        Some(name) => name.to_string_lossy().to_string(),
        None => return false,
    };
    if basename.starts_with("net6-") {
        has_ip6
    } else if basename.starts_with("net-") {
        has_ip
    } else {
        false
    }
}

/// Network config from the kernel command line. An embedded
/// `network-config=` payload wins; otherwise `ip=`/`ip6=` tokens gate
/// which klibc lease files are consumed. `None` means the command line
/// carries no network configuration at all.
pub fn read_kernel_cmdline_config(
    cmdline: &str,
    files: &[PathBuf],
    mac_addrs: &BTreeMap<String, String>,
) -> Result<Option<NetworkConfig>, NetfabError> {
    for tok in cmdline.split_whitespace() {
        if let Some(data64) = tok.strip_prefix("network-config=") {
            return decode_payload(data64).map(Some);
        }
    }
    let has_ip = cmdline
        .split_whitespace()
        .any(|tok| tok == "ip" || tok.starts_with("ip="));
    let has_ip6 = cmdline
        .split_whitespace()
        .any(|tok| tok == "ip6" || tok.starts_with("ip6="));
    if !has_ip && !has_ip6 {
        return Ok(None);
    }
    let selected: Vec<PathBuf> = files
        .iter()
        .filter(|f| file_gated(f, has_ip, has_ip6))
        .cloned()
        .collect();
    config_from_klibc_net_cfg(&selected, mac_addrs).map(Some)
}
